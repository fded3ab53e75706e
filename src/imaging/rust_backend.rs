//! Pure Rust image I/O backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::ImageReader` with format guessed from content |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |

use super::backend::{BackendError, ImageBackend};
use super::params::{FormatFamily, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbImage};
use std::io::BufWriter;
use std::path::Path;

/// Extensions the catalog treats as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// True when `path` has one of [`IMAGE_EXTENSIONS`] (any case).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn encode_error(path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::Encode {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<RgbImage, BackendError> {
        let img = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| decode_error(path, e))?;
        Ok(img.to_rgb8())
    }

    fn save(
        &self,
        img: &RgbImage,
        path: &Path,
        format: FormatFamily,
        quality: Quality,
    ) -> Result<(), BackendError> {
        let file = std::fs::File::create(path).map_err(BackendError::Io)?;
        let writer = BufWriter::new(file);
        let (width, height) = img.dimensions();
        match format {
            FormatFamily::Jpeg => JpegEncoder::new_with_quality(writer, quality.value() as u8)
                .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8),
            FormatFamily::Png => PngEncoder::new(writer).write_image(
                img.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            ),
        }
        .map_err(|e| encode_error(path, e))
    }
}
