//! Shared test utilities for the visionblocks test suite.
//!
//! Builds synthetic datasets on disk with small generated images, so tests
//! get an isolated tree they can mutate without shared fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! DatasetBuilder::new(tmp.path(), "waste")
//!     .image("glass", "001.jpg")
//!     .image("plastic", "009.png")
//!     .metadata(json!({"name": "Waste"}))
//!     .build();
//!
//! let catalog = Catalog::new(tmp.path());
//! assert_eq!(catalog.info("waste").unwrap().num_classes, 2);
//! ```

use image::{ImageEncoder, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

// =========================================================================
// Images
// =========================================================================

/// Deterministic image with distinct values per pixel.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255) / width.max(1)) as u8,
            ((y * 255) / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// Write a small valid JPEG with the given dimensions.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = gradient_image(width, height);
    let file = fs::File::create(path).unwrap();
    image::codecs::jpeg::JpegEncoder::new(std::io::BufWriter::new(file))
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a small valid PNG with the given dimensions.
pub fn write_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    gradient_image(width, height).save(path).unwrap();
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
}

// =========================================================================
// Datasets
// =========================================================================

/// Builder for a dataset folder under a datasets root.
pub struct DatasetBuilder {
    dir: PathBuf,
    images: Vec<(String, String)>,
    metadata: Option<String>,
    index_csv: Option<String>,
    size: (u32, u32),
}

impl DatasetBuilder {
    pub fn new(root: &Path, key: &str) -> Self {
        Self {
            dir: root.join(key),
            images: Vec::new(),
            metadata: None,
            index_csv: None,
            size: (24, 16),
        }
    }

    /// Add `images/<class>/<file>`; JPEG or PNG by extension.
    pub fn image(mut self, class: &str, file: &str) -> Self {
        self.images.push((class.to_string(), file.to_string()));
        self
    }

    /// Add `count` PNGs named `000.png`, `001.png`, … to one class.
    pub fn images(mut self, class: &str, count: usize) -> Self {
        for i in 0..count {
            self.images.push((class.to_string(), format!("{i:03}.png")));
        }
        self
    }

    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn metadata(mut self, meta: serde_json::Value) -> Self {
        self.metadata = Some(meta.to_string());
        self
    }

    pub fn metadata_raw(mut self, content: &str) -> Self {
        self.metadata = Some(content.to_string());
        self
    }

    pub fn index_csv(mut self, content: &str) -> Self {
        self.index_csv = Some(content.to_string());
        self
    }

    /// Write everything to disk and return the dataset folder.
    pub fn build(self) -> PathBuf {
        let images_dir = self.dir.join("images");
        fs::create_dir_all(&images_dir).unwrap();
        let (w, h) = self.size;
        for (class, file) in &self.images {
            let path = images_dir.join(class).join(file);
            let is_jpeg = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
            if is_jpeg {
                write_jpeg(&path, w, h);
            } else {
                write_png(&path, w, h);
            }
        }
        if let Some(meta) = &self.metadata {
            fs::write(self.dir.join("metadata.json"), meta).unwrap();
        }
        if let Some(csv) = &self.index_csv {
            fs::write(self.dir.join("index.csv"), csv).unwrap();
        }
        self.dir
    }
}

/// Relative paths of every file under `dir`, sorted, forward-slash separated.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
