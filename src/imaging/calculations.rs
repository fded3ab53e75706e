//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Every output dimension is at least 1 and at most [`MAX_SIDE`].

/// Largest side any operation may produce.
pub const MAX_SIDE: u32 = 8192;

/// Largest Gaussian sigma `blur_sharpen` honours.
pub const MAX_BLUR: f64 = 256.0;

/// Guards `floor` against values like `255.99999997` that are exact in theory.
const FLOOR_EPSILON: f64 = 1e-9;

fn scaled(dim: u32, scale: f64) -> u32 {
    ((dim as f64 * scale + FLOOR_EPSILON).floor() as u32).clamp(1, MAX_SIDE)
}

/// Clamp a requested size into `1..=MAX_SIDE` on both axes.
pub fn bounded(target: (u32, u32)) -> (u32, u32) {
    (target.0.clamp(1, MAX_SIDE), target.1.clamp(1, MAX_SIDE))
}

/// Largest aspect-preserving size that fits inside `target` (contain, not cover).
///
/// ```text
/// 400x200 into 256x256 → 256x128
/// 200x400 into 256x100 →  50x100
/// ```
pub fn contain_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = bounded(target);
    if src_w == 0 || src_h == 0 {
        return (tgt_w, tgt_h);
    }
    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);
    (scaled(src_w, scale), scaled(src_h, scale))
}

/// Aspect-preserving size whose longer side equals `max_side`.
pub fn fit_dimensions(source: (u32, u32), max_side: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let max_side = max_side.clamp(1, MAX_SIDE);
    let longer = src_w.max(src_h);
    if longer == 0 {
        return (max_side, max_side);
    }
    let scale = max_side as f64 / longer as f64;
    if src_w >= src_h {
        (max_side, scaled(src_h, scale))
    } else {
        (scaled(src_w, scale), max_side)
    }
}

/// Both sides scaled by `percent` / 100, capped so the longer side stays within [`MAX_SIDE`].
pub fn scale_dimensions(source: (u32, u32), percent: f64) -> (u32, u32) {
    let longer = source.0.max(source.1).max(1);
    let scale = (percent.max(0.0) / 100.0).min(MAX_SIDE as f64 / longer as f64);
    (scaled(source.0, scale), scaled(source.1, scale))
}

/// A rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A `w×h` rectangle centered on the image center, clamped to the image.
///
/// Near the edges the crop can come out smaller than requested.
pub fn center_crop_rect(source: (u32, u32), target: (u32, u32)) -> CropRect {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = (target.0.max(1), target.1.max(1));
    let x = (src_w / 2).saturating_sub(tgt_w / 2);
    let y = (src_h / 2).saturating_sub(tgt_h / 2);
    let x_end = x.saturating_add(tgt_w).min(src_w);
    let y_end = y.saturating_add(tgt_h).min(src_h);
    CropRect {
        x,
        y,
        width: x_end.saturating_sub(x).max(1).min(src_w.max(1)),
        height: y_end.saturating_sub(y).max(1).min(src_h.max(1)),
    }
}

/// Border sizes that letterbox an image into an exact canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Padding {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// Center `source` in a `target` canvas: the extra odd pixel goes bottom/right.
///
/// Sides where the image is already larger than the canvas get no padding.
/// The canvas is capped at [`MAX_SIDE`].
pub fn letterbox_padding(source: (u32, u32), target: (u32, u32)) -> Padding {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = bounded(target);
    let extra_w = tgt_w.saturating_sub(src_w);
    let extra_h = tgt_h.saturating_sub(src_h);
    Padding {
        top: extra_h / 2,
        bottom: extra_h - extra_h / 2,
        left: extra_w / 2,
        right: extra_w - extra_w / 2,
    }
}

/// Smallest odd kernel size `>= blur * 2 + 1`, with `blur` capped at [`MAX_BLUR`].
pub fn gaussian_kernel_size(blur: f64) -> u32 {
    let raw = (blur.clamp(0.0, MAX_BLUR) * 2.0 + 1.0 - FLOOR_EPSILON).ceil() as u32;
    let k = raw.max(1);
    if k % 2 == 0 { k + 1 } else { k }
}

/// Preview size bounded by `max_side`, or `None` when already small enough.
pub fn preview_dimensions(source: (u32, u32), max_side: u32) -> Option<(u32, u32)> {
    if source.0.max(source.1) <= max_side {
        None
    } else {
        Some(fit_dimensions(source, max_side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // resize targets
    // =========================================================================

    #[test]
    fn contain_landscape_into_square() {
        assert_eq!(contain_dimensions((400, 200), (256, 256)), (256, 128));
    }

    #[test]
    fn contain_portrait_limited_by_height() {
        assert_eq!(contain_dimensions((200, 400), (256, 100)), (50, 100));
    }

    #[test]
    fn contain_upscales_small_images() {
        assert_eq!(contain_dimensions((32, 16), (64, 64)), (64, 32));
    }

    #[test]
    fn fit_longer_side_matches_exactly() {
        assert_eq!(fit_dimensions((333, 200), 256), (256, 153));
        assert_eq!(fit_dimensions((200, 333), 256), (153, 256));
        assert_eq!(fit_dimensions((100, 100), 256), (256, 256));
    }

    #[test]
    fn fit_never_collapses_to_zero() {
        assert_eq!(fit_dimensions((1000, 1), 10), (10, 1));
    }

    #[test]
    fn scale_by_percent() {
        assert_eq!(scale_dimensions((200, 100), 50.0), (100, 50));
        assert_eq!(scale_dimensions((200, 100), 100.0), (200, 100));
        assert_eq!(scale_dimensions((200, 100), 0.0), (1, 1));
    }

    #[test]
    fn oversized_targets_are_capped() {
        assert_eq!(bounded((u32::MAX, 0)), (MAX_SIDE, 1));
        assert_eq!(contain_dimensions((4, 2), (u32::MAX, u32::MAX)), (MAX_SIDE, MAX_SIDE / 2));
        assert_eq!(fit_dimensions((4, 2), u32::MAX), (MAX_SIDE, MAX_SIDE / 2));
        assert_eq!(scale_dimensions((4, 2), 1e12), (MAX_SIDE, MAX_SIDE / 2));
        assert_eq!(scale_dimensions((4, 2), f64::MAX), (MAX_SIDE, MAX_SIDE / 2));
    }

    // =========================================================================
    // crop / pad
    // =========================================================================

    #[test]
    fn crop_center_huge_request_does_not_overflow() {
        let rect = center_crop_rect((10, 6), (u32::MAX, u32::MAX));
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 10, 6));
    }

    #[test]
    fn letterbox_canvas_is_capped() {
        let p = letterbox_padding((4, 4), (u32::MAX, 4));
        assert_eq!(4 + p.left + p.right, MAX_SIDE);
        assert_eq!(p.top + p.bottom, 0);
    }

    #[test]
    fn kernel_size_is_capped() {
        assert_eq!(gaussian_kernel_size(1e9), gaussian_kernel_size(MAX_BLUR));
        assert_eq!(gaussian_kernel_size(MAX_BLUR), 2 * MAX_BLUR as u32 + 1);
    }

    #[test]
    fn crop_center_inside_image() {
        assert_eq!(
            center_crop_rect((100, 80), (50, 40)),
            CropRect {
                x: 25,
                y: 20,
                width: 50,
                height: 40
            }
        );
    }

    #[test]
    fn crop_center_clamped_to_bounds() {
        let rect = center_crop_rect((100, 80), (224, 224));
        assert_eq!((rect.x, rect.y), (0, 0));
        assert_eq!((rect.width, rect.height), (100, 80));
    }

    #[test]
    fn crop_center_odd_sizes() {
        let rect = center_crop_rect((11, 11), (3, 3));
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (4, 4, 3, 3));
    }

    #[test]
    fn letterbox_even_split() {
        assert_eq!(
            letterbox_padding((100, 50), (120, 100)),
            Padding {
                top: 25,
                bottom: 25,
                left: 10,
                right: 10
            }
        );
    }

    #[test]
    fn letterbox_odd_split_puts_extra_bottom_right() {
        let p = letterbox_padding((100, 50), (101, 53));
        assert_eq!((p.top, p.bottom, p.left, p.right), (1, 2, 0, 1));
    }

    #[test]
    fn letterbox_no_padding_when_larger() {
        assert!(letterbox_padding((300, 300), (256, 256)).is_empty());
    }

    // =========================================================================
    // kernels / previews
    // =========================================================================

    #[test]
    fn kernel_size_is_smallest_odd_at_least_target() {
        assert_eq!(gaussian_kernel_size(1.0), 3);
        assert_eq!(gaussian_kernel_size(1.2), 5);
        assert_eq!(gaussian_kernel_size(2.0), 5);
        assert_eq!(gaussian_kernel_size(0.1), 3);
        assert_eq!(gaussian_kernel_size(0.0), 1);
    }

    #[test]
    fn preview_skips_small_images() {
        assert_eq!(preview_dimensions((300, 200), 512), None);
        assert_eq!(preview_dimensions((1024, 512), 512), Some((512, 256)));
    }
}
