//! Image I/O backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between pixel work and the
//! filesystem: decode a file into an RGB buffer and encode a buffer back to
//! disk. Everything else in
//! [`imaging`](super) is pure buffer-in, buffer-out.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use
//! [`tests::MockBackend`], which records calls and never touches the disk.

use super::params::{FormatFamily, Quality};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Failed to encode {path}: {message}")]
    Encode { path: String, message: String },
}

/// Trait for image I/O backends.
///
/// `Sync` so one backend can be shared across rayon workers during export.
pub trait ImageBackend: Sync {
    /// Decode an image and convert it to 8-bit RGB.
    fn load(&self, path: &Path) -> Result<RgbImage, BackendError>;

    /// Encode `img` to `path` with the given encoder family.
    ///
    /// `quality` only applies to JPEG; PNG is lossless.
    fn save(
        &self,
        img: &RgbImage,
        path: &Path,
        format: FormatFamily,
        quality: Quality,
    ) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching the disk.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockBackend {
        /// Image handed out by every `load`.
        pub image: RgbImage,
        /// `load` fails for paths ending with this suffix.
        pub fail_on: Option<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Load(String),
        Save {
            path: String,
            width: u32,
            height: u32,
            format: FormatFamily,
            quality: u32,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_image(RgbImage::from_pixel(8, 6, Rgb([10, 20, 30])))
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(image: RgbImage) -> Self {
            Self {
                image,
                fail_on: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(suffix: &str) -> Self {
            Self {
                fail_on: Some(suffix.to_string()),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Recorded saves, sorted by path (parallel exports record out of order).
        pub fn saves(&self) -> Vec<RecordedOp> {
            let mut saves: Vec<RecordedOp> = self
                .get_operations()
                .into_iter()
                .filter(|op| matches!(op, RecordedOp::Save { .. }))
                .collect();
            saves.sort_by_key(|op| match op {
                RecordedOp::Save { path, .. } => path.clone(),
                _ => String::new(),
            });
            saves
        }
    }

    impl ImageBackend for MockBackend {
        fn load(&self, path: &Path) -> Result<RgbImage, BackendError> {
            let path_str = path.to_string_lossy().to_string();
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Load(path_str.clone()));
            if self
                .fail_on
                .as_deref()
                .is_some_and(|suffix| path_str.ends_with(suffix))
            {
                return Err(BackendError::Decode {
                    path: path_str,
                    message: "mock decode failure".into(),
                });
            }
            Ok(self.image.clone())
        }

        fn save(
            &self,
            img: &RgbImage,
            path: &Path,
            format: FormatFamily,
            quality: Quality,
        ) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Save {
                path: path.to_string_lossy().to_string(),
                width: img.width(),
                height: img.height(),
                format,
                quality: quality.value(),
            });
            Ok(())
        }
    }

    #[test]
    fn mock_records_load() {
        let backend = MockBackend::new();
        let img = backend.load(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(img.dimensions(), (8, 6));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Load(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_load_fails_on_configured_suffix() {
        let backend = MockBackend::failing_on("bad.png");
        assert!(backend.load(Path::new("/a/good.png")).is_ok());
        assert!(matches!(
            backend.load(Path::new("/a/bad.png")),
            Err(BackendError::Decode { .. })
        ));
    }

    #[test]
    fn mock_records_save() {
        let backend = MockBackend::new();
        let img = RgbImage::new(4, 3);
        backend
            .save(&img, Path::new("/out/a.jpg"), FormatFamily::Jpeg, Quality::new(75))
            .unwrap();

        assert_eq!(
            backend.saves(),
            vec![RecordedOp::Save {
                path: "/out/a.jpg".into(),
                width: 4,
                height: 3,
                format: FormatFamily::Jpeg,
                quality: 75,
            }]
        );
    }
}
