//! Per-pixel and neighbourhood filters over 8-bit RGB buffers.
//!
//! Every function takes the current buffer by reference and returns a new
//! one; nothing here touches shared state. Border handling follows the
//! usual image-processing conventions:
//!
//! | Where | Border |
//! |---|---|
//! | Gaussian blur | reflect-101 (`dcb|abcd|cba`) |
//! | `pad` reflect mode | reflect (`cba|abc|cba`) |
//! | `pad` edge mode | replicate (`aaa|abc|ccc`) |
//!
//! Resizing uses `image::imageops::resize` with the Lanczos3 filter.

use super::calculations::{
    MAX_BLUR, bounded, center_crop_rect, contain_dimensions, fit_dimensions,
    gaussian_kernel_size, letterbox_padding, preview_dimensions, scale_dimensions,
};
use super::operation::{CropParams, NormalizeMode, PadMode, PadParams, ResizeMode, ResizeParams};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Cap on the unsharp-mask amount.
pub const MAX_SHARPEN_AMOUNT: f64 = 3.0;

fn saturate(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// =============================================================================
// geometry
// =============================================================================

/// Resize per `params`; an unrecognized mode returns the image unchanged.
pub fn resize(img: &RgbImage, params: &ResizeParams) -> RgbImage {
    let source = img.dimensions();
    let target = match params.mode {
        ResizeMode::Size if params.keep => contain_dimensions(source, (params.w, params.h)),
        ResizeMode::Size => bounded((params.w, params.h)),
        ResizeMode::Fit => fit_dimensions(source, params.maxside),
        ResizeMode::Scale => scale_dimensions(source, params.pct),
        ResizeMode::Other(_) => return img.clone(),
    };
    resize_exact(img, target)
}

/// Lanczos3 resize to `(width, height)`, each side kept within `1..=MAX_SIDE`.
pub fn resize_exact(img: &RgbImage, target: (u32, u32)) -> RgbImage {
    let (width, height) = bounded(target);
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// Downscale for display so the longer side is at most `max_side`.
pub fn preview(img: &RgbImage, max_side: u32) -> RgbImage {
    match preview_dimensions(img.dimensions(), max_side) {
        Some(dims) => resize_exact(img, dims),
        None => img.clone(),
    }
}

/// Centered crop, clamped to the image bounds.
pub fn crop_center(img: &RgbImage, params: &CropParams) -> RgbImage {
    let rect = center_crop_rect(img.dimensions(), (params.w, params.h));
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Letterbox into an exact `w×h` canvas.
///
/// Sides where the image already exceeds the canvas are left as they are,
/// so the result can be larger than requested. The canvas never grows past
/// `MAX_SIDE`. An unrecognized mode returns the image unchanged.
pub fn pad(img: &RgbImage, params: &PadParams) -> RgbImage {
    let (src_w, src_h) = img.dimensions();
    let padding = letterbox_padding((src_w, src_h), (params.w, params.h));
    if padding.is_empty() || src_w == 0 || src_h == 0 {
        return img.clone();
    }
    let out_w = src_w.saturating_add(padding.left).saturating_add(padding.right);
    let out_h = src_h.saturating_add(padding.top).saturating_add(padding.bottom);

    let source_index: fn(i64, u32) -> u32 = match params.mode {
        PadMode::Constant => {
            let fill = Rgb([params.r, params.g, params.b]);
            let mut out = RgbImage::from_pixel(out_w, out_h, fill);
            imageops::replace(&mut out, img, padding.left as i64, padding.top as i64);
            return out;
        }
        PadMode::Edge => |i, n| i.clamp(0, n as i64 - 1) as u32,
        PadMode::Reflect => reflect,
        PadMode::Other(_) => return img.clone(),
    };

    RgbImage::from_fn(out_w, out_h, |x, y| {
        let sx = source_index(x as i64 - padding.left as i64, src_w);
        let sy = source_index(y as i64 - padding.top as i64, src_h);
        *img.get_pixel(sx, sy)
    })
}

/// Mirror index including the edge pixel: `cba|abc|cba`.
fn reflect(mut i: i64, n: u32) -> u32 {
    let n = n as i64;
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as u32;
        }
    }
}

/// Mirror index excluding the edge pixel: `cb|abc|ba`.
pub(crate) fn reflect_101(mut i: i64, n: u32) -> u32 {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as u32;
        }
    }
}

// =============================================================================
// intensity
// =============================================================================

/// `out = clamp(in * (1 + c/100) + 2.55 * b)` per channel.
pub fn brightness_contrast(img: &RgbImage, b: f64, c: f64) -> RgbImage {
    let alpha = 1.0 + c / 100.0;
    let beta = 2.55 * b;
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for ch in px.0.iter_mut() {
            *ch = saturate(*ch as f64 * alpha + beta);
        }
    }
    out
}

/// BT.601 luma of one pixel.
pub fn luma(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    saturate(0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64)
}

/// Single-channel luma plane.
pub fn grayscale_plane(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([luma(img.get_pixel(x, y))])
    })
}

/// Desaturate, keeping three identical channels.
pub fn to_grayscale(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let l = luma(px);
        *px = Rgb([l, l, l]);
    }
    out
}

/// Display-range normalization; an unrecognized mode returns the image unchanged.
pub fn normalize(img: &RgbImage, mode: &NormalizeMode) -> RgbImage {
    match mode {
        NormalizeMode::ZeroOne => map_channels(img, |v| {
            let unit = (v as f32 / 255.0).clamp(0.0, 1.0);
            (unit * 255.0).round() as u8
        }),
        NormalizeMode::MinusOneOne => map_channels(img, |v| {
            let signed = (v as f32 / 255.0) * 2.0 - 1.0;
            let unit = ((signed + 1.0) / 2.0).clamp(0.0, 1.0);
            (unit * 255.0).round() as u8
        }),
        NormalizeMode::Zscore => zscore(img),
        NormalizeMode::Other(_) => img.clone(),
    }
}

fn map_channels(img: &RgbImage, f: impl Fn(u8) -> u8) -> RgbImage {
    let mut out = img.clone();
    for v in out.iter_mut() {
        *v = f(*v);
    }
    out
}

/// Per-channel standardization clipped to ±2σ and stretched over 0..255.
fn zscore(img: &RgbImage) -> RgbImage {
    let count = (img.width() as f64) * (img.height() as f64);
    if count == 0.0 {
        return img.clone();
    }
    let mut stats = [(0.0f64, 1.0f64); 3];
    for (c, stat) in stats.iter_mut().enumerate() {
        let mean = img.pixels().map(|p| p.0[c] as f64).sum::<f64>() / count;
        let var = img
            .pixels()
            .map(|p| (p.0[c] as f64 - mean).powi(2))
            .sum::<f64>()
            / count;
        let std = var.sqrt();
        *stat = (mean, if std == 0.0 { 1.0 } else { std });
    }
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for (c, v) in px.0.iter_mut().enumerate() {
            let (mean, std) = stats[c];
            let z = ((*v as f64 - mean) / std).clamp(-2.0, 2.0);
            *v = saturate((z + 2.0) / 4.0 * 255.0);
        }
    }
    out
}

// =============================================================================
// blur / sharpen
// =============================================================================

/// Normalized 1-D Gaussian weights.
///
/// A non-positive `sigma` is derived from the kernel size, and the common
/// 3-tap case uses the exact binomial weights `[1/4, 1/2, 1/4]`.
pub fn gaussian_kernel(ksize: u32, sigma: f64) -> Vec<f64> {
    let ksize = ksize.max(1) as usize;
    if ksize == 1 {
        return vec![1.0];
    }
    if ksize == 3 && sigma <= 0.0 {
        return vec![0.25, 0.5, 0.25];
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (ksize as f64 - 1.0) / 2.0;
    let weights: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable Gaussian blur with reflect-101 borders.
pub fn gaussian_blur(img: &RgbImage, ksize: u32, sigma: f64) -> RgbImage {
    let kernel = gaussian_kernel(ksize, sigma);
    if kernel.len() == 1 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let radius = (kernel.len() / 2) as i64;

    // Horizontal pass into f64, vertical pass back to u8.
    let mut horizontal = vec![[0.0f64; 3]; (w as usize) * (h as usize)];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f64; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - radius, w);
                let p = img.get_pixel(sx, y).0;
                for c in 0..3 {
                    acc[c] += weight * p[c] as f64;
                }
            }
            horizontal[(y * w + x) as usize] = acc;
        }
    }

    RgbImage::from_fn(w, h, |x, y| {
        let mut acc = [0.0f64; 3];
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect_101(y as i64 + k as i64 - radius, h);
            let p = horizontal[(sy * w + x) as usize];
            for c in 0..3 {
                acc[c] += weight * p[c];
            }
        }
        Rgb([saturate(acc[0]), saturate(acc[1]), saturate(acc[2])])
    })
}

/// Gaussian blur with sigma `blur`, then unsharp mask of strength `sharp`.
///
/// Either step is skipped when its parameter is not positive. `blur` is
/// capped at `MAX_BLUR`.
pub fn blur_sharpen(img: &RgbImage, blur: f64, sharp: f64) -> RgbImage {
    let mut out = if blur > 0.0 {
        let sigma = blur.min(MAX_BLUR);
        gaussian_blur(img, gaussian_kernel_size(sigma), sigma)
    } else {
        img.clone()
    };
    if sharp > 0.0 {
        let amount = sharp.min(MAX_SHARPEN_AMOUNT);
        let blurred = gaussian_blur(&out, 3, 0.0);
        for (px, soft) in out.pixels_mut().zip(blurred.pixels()) {
            for c in 0..3 {
                px.0[c] = saturate(px.0[c] as f64 * (1.0 + amount) - soft.0[c] as f64 * amount);
            }
        }
    }
    out
}
