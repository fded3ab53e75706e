//! Edge detection on the luma plane.
//!
//! Every detector produces a binary mask (`255` = edge). The gradient
//! detectors (Sobel, Prewitt, Laplacian) stretch their response magnitude
//! over 0..255 and keep pixels at or above the threshold. Canny uses
//! `threshold` as its low hysteresis bound and `threshold + 60` as its high
//! bound, both clamped into 0..=255.

use super::filters::{grayscale_plane, reflect_101};
use super::operation::{EdgeMethod, EdgesParams};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Gap between the Canny low and high thresholds.
pub const CANNY_BAND: i32 = 60;

/// Thresholds used when the method is not recognized.
pub const FALLBACK_CANNY: (i32, i32) = (100, 160);

/// Color painted over edge pixels in overlay mode.
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const EDGE: u8 = 255;

type Kernel3 = [[f64; 3]; 3];

const SOBEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
const PREWITT_X: Kernel3 = [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]];
const PREWITT_Y: Kernel3 = [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [-1.0, -1.0, -1.0]];
const LAPLACIAN: Kernel3 = [[2.0, 0.0, 2.0], [0.0, -8.0, 0.0], [2.0, 0.0, 2.0]];

/// Run the `edges` operation: detect, then render as overlay or mask.
pub fn edges(img: &RgbImage, params: &EdgesParams) -> RgbImage {
    let mask = edge_mask(img, &params.method, params.threshold);
    render(img, &mask, params.overlay)
}

/// Binary edge mask of `img`.
pub fn edge_mask(img: &RgbImage, method: &EdgeMethod, threshold: i32) -> GrayImage {
    let gray = grayscale_plane(img);
    match method {
        EdgeMethod::Canny => canny(
            &gray,
            threshold.clamp(0, 255),
            threshold.saturating_add(CANNY_BAND).clamp(0, 255),
        ),
        EdgeMethod::Sobel => {
            let gx = correlate3(&gray, &SOBEL_X, reflect_101);
            let gy = correlate3(&gray, &SOBEL_Y, reflect_101);
            binarize(&gray, &stretch(&hypot(&gx, &gy)), threshold)
        }
        EdgeMethod::Prewitt => {
            let gx = correlate3(&gray, &PREWITT_X, reflect_101);
            let gy = correlate3(&gray, &PREWITT_Y, reflect_101);
            binarize(&gray, &stretch(&hypot(&gx, &gy)), threshold)
        }
        EdgeMethod::Laplacian => {
            let response: Vec<f64> = correlate3(&gray, &LAPLACIAN, reflect_101)
                .into_iter()
                .map(f64::abs)
                .collect();
            binarize(&gray, &stretch(&response), threshold)
        }
        EdgeMethod::Other(_) => canny(&gray, FALLBACK_CANNY.0, FALLBACK_CANNY.1),
    }
}

/// Paint edges over `img`, or draw them white on black.
pub fn render(img: &RgbImage, mask: &GrayImage, overlay: bool) -> RgbImage {
    if overlay {
        let mut out = img.clone();
        for (px, m) in out.pixels_mut().zip(mask.pixels()) {
            if m.0[0] != 0 {
                *px = OVERLAY_COLOR;
            }
        }
        out
    } else {
        RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
            let v = mask.get_pixel(x, y).0[0];
            Rgb([v, v, v])
        })
    }
}

fn replicate(i: i64, n: u32) -> u32 {
    i.clamp(0, n as i64 - 1) as u32
}

/// 3×3 correlation with the given border rule, row-major output.
fn correlate3(gray: &GrayImage, kernel: &Kernel3, border: fn(i64, u32) -> u32) -> Vec<f64> {
    let (w, h) = gray.dimensions();
    let mut out = Vec::with_capacity((w as usize) * (h as usize));
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                let sy = border(y as i64 + ky as i64 - 1, h);
                for (kx, weight) in row.iter().enumerate() {
                    if *weight == 0.0 {
                        continue;
                    }
                    let sx = border(x as i64 + kx as i64 - 1, w);
                    acc += weight * gray.get_pixel(sx, sy).0[0] as f64;
                }
            }
            out.push(acc);
        }
    }
    out
}

fn hypot(gx: &[f64], gy: &[f64]) -> Vec<f64> {
    gx.iter().zip(gy).map(|(x, y)| x.hypot(*y)).collect()
}

/// Min-max stretch to 0..255, truncating. A flat response maps to all zeros.
fn stretch(values: &[f64]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if values.is_empty() || max <= min {
        return vec![0; values.len()];
    }
    let range = max - min;
    values
        .iter()
        .map(|v| ((v - min) * 255.0 / range).clamp(0.0, 255.0) as u8)
        .collect()
}

fn binarize(gray: &GrayImage, levels: &[u8], threshold: i32) -> GrayImage {
    let w = gray.width();
    GrayImage::from_fn(w, gray.height(), |x, y| {
        let level = levels[(y * w + x) as usize] as i32;
        Luma([if level >= threshold { EDGE } else { 0 }])
    })
}

/// Canny detector: L1 Sobel gradient, non-maximum suppression, hysteresis.
///
/// Thresholds are swapped when given in the wrong order. A pixel survives
/// suppression when its magnitude exceeds `low` and is a local maximum along
/// the quantized gradient direction; it is kept when it exceeds `high` or is
/// 8-connected to a kept pixel.
pub fn canny(gray: &GrayImage, low: i32, high: i32) -> GrayImage {
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    let (w, h) = gray.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let gx = correlate3(gray, &SOBEL_X, replicate);
    let gy = correlate3(gray, &SOBEL_Y, replicate);
    let mag: Vec<f64> = gx.iter().zip(&gy).map(|(x, y)| x.abs() + y.abs()).collect();

    // Magnitude outside the image counts as zero.
    let at = |x: i64, y: i64| -> f64 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0.0
        } else {
            mag[y as usize * wu + x as usize]
        }
    };

    let tan_22_5 = std::f64::consts::SQRT_2 - 1.0;
    let tan_67_5 = std::f64::consts::SQRT_2 + 1.0;

    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Suppressed,
        Candidate,
        Strong,
    }

    let mut state = vec![State::Suppressed; wu * hu];
    let mut stack = Vec::new();

    for y in 0..hu {
        for x in 0..wu {
            let i = y * wu + x;
            let m = mag[i];
            if m <= low as f64 {
                continue;
            }
            let (ax, ay) = (gx[i].abs(), gy[i].abs());
            let (xi, yi) = (x as i64, y as i64);
            let is_peak = if ay < ax * tan_22_5 {
                m > at(xi - 1, yi) && m >= at(xi + 1, yi)
            } else if ay > ax * tan_67_5 {
                m > at(xi, yi - 1) && m >= at(xi, yi + 1)
            } else {
                let s = if (gx[i] < 0.0) != (gy[i] < 0.0) { -1 } else { 1 };
                m > at(xi - s, yi - 1) && m > at(xi + s, yi + 1)
            };
            if !is_peak {
                continue;
            }
            if m > high as f64 {
                state[i] = State::Strong;
                stack.push((x, y));
            } else {
                state[i] = State::Candidate;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * wu + nx as usize;
                if state[j] == State::Candidate {
                    state[j] = State::Strong;
                    stack.push((nx as usize, ny as usize));
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let kept = state[y as usize * wu + x as usize] == State::Strong;
        Luma([if kept { EDGE } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Black left half, white right half.
    fn step_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn edge_columns(mask: &GrayImage) -> Vec<u32> {
        let mut cols: Vec<u32> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == EDGE)
            .map(|(x, _, _)| x)
            .collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }

    fn edge_count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == EDGE).count()
    }

    #[test]
    fn canny_finds_single_line_on_step() {
        let mask = edge_mask(&step_image(10, 6), &EdgeMethod::Canny, 100);
        assert_eq!(edge_columns(&mask), vec![4]);
        assert_eq!(edge_count(&mask), 6);
    }

    #[test]
    fn canny_flat_image_has_no_edges() {
        let img = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        assert_eq!(edge_count(&edge_mask(&img, &EdgeMethod::Canny, 10)), 0);
    }

    #[test]
    fn canny_weak_step_needs_lower_threshold() {
        let img = RgbImage::from_fn(10, 6, |x, _| {
            if x < 5 { Rgb([100, 100, 100]) } else { Rgb([130, 130, 130]) }
        });
        // Gradient 120 clears low 100 but not high 160.
        assert_eq!(edge_count(&edge_mask(&img, &EdgeMethod::Canny, 100)), 0);
        assert_eq!(edge_count(&edge_mask(&img, &EdgeMethod::Canny, 50)), 6);
    }

    #[test]
    fn canny_thresholds_clamp_into_byte_range() {
        let img = step_image(10, 6);
        let high = edge_mask(&img, &EdgeMethod::Canny, 300);
        assert_eq!(high, edge_mask(&img, &EdgeMethod::Canny, 255));
        assert_eq!(high, canny(&grayscale_plane(&img), 255, 255));
        assert_eq!(edge_columns(&high), vec![4]);

        let low = edge_mask(&img, &EdgeMethod::Canny, -50);
        assert_eq!(low, canny(&grayscale_plane(&img), 0, 10));
        assert_eq!(edge_columns(&low), vec![4]);

        let flat = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        assert_eq!(edge_count(&edge_mask(&flat, &EdgeMethod::Canny, i32::MIN)), 0);
        assert_eq!(edge_count(&edge_mask(&flat, &EdgeMethod::Canny, i32::MAX)), 0);
    }

    #[test]
    fn canny_hysteresis_keeps_connected_weak_pixels() {
        let weak_only = RgbImage::from_fn(10, 6, |x, _| {
            if x < 5 { Rgb([0, 0, 0]) } else { Rgb([60, 60, 60]) }
        });
        // Gradient 240 sits between low 200 and high 260.
        assert_eq!(edge_count(&canny(&grayscale_plane(&weak_only), 200, 260)), 0);

        let joined = RgbImage::from_fn(10, 6, |x, y| {
            let bright = if y < 3 { 255 } else { 60 };
            let v = if x < 5 { 0 } else { bright };
            Rgb([v, v, v])
        });
        let mask = canny(&grayscale_plane(&joined), 200, 260);
        assert_eq!(mask.get_pixel(4, 0).0[0], EDGE);
        assert_eq!(mask.get_pixel(4, 5).0[0], EDGE);
    }

    #[test]
    fn sobel_marks_both_sides_of_step() {
        let mask = edge_mask(&step_image(10, 4), &EdgeMethod::Sobel, 100);
        assert_eq!(edge_columns(&mask), vec![4, 5]);
    }

    #[test]
    fn prewitt_marks_both_sides_of_step() {
        let mask = edge_mask(&step_image(10, 4), &EdgeMethod::Prewitt, 100);
        assert_eq!(edge_columns(&mask), vec![4, 5]);
    }

    #[test]
    fn laplacian_marks_step() {
        let mask = edge_mask(&step_image(10, 4), &EdgeMethod::Laplacian, 100);
        assert_eq!(edge_columns(&mask), vec![4, 5]);
    }

    #[test]
    fn gradient_detectors_on_flat_image_depend_on_threshold() {
        let img = RgbImage::from_pixel(6, 6, Rgb([10, 20, 30]));
        assert_eq!(edge_count(&edge_mask(&img, &EdgeMethod::Sobel, 100)), 0);
        // Flat response stretches to zero, and zero >= 0.
        assert_eq!(edge_count(&edge_mask(&img, &EdgeMethod::Sobel, 0)), 36);
    }

    #[test]
    fn unknown_method_falls_back_to_canny() {
        let img = step_image(10, 6);
        let fallback = edge_mask(&img, &EdgeMethod::Other("scharr".into()), 0);
        let canny = edge_mask(&img, &EdgeMethod::Canny, 100);
        assert_eq!(fallback, canny);
    }

    #[test]
    fn mask_rendering_is_white_on_black() {
        let img = step_image(10, 6);
        let out = edges(
            &img,
            &EdgesParams {
                method: EdgeMethod::Canny,
                threshold: 100,
                overlay: false,
            },
        );
        assert_eq!(out.dimensions(), (10, 6));
        assert_eq!(out.get_pixel(4, 0), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(8, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn overlay_paints_red_and_keeps_the_rest() {
        let img = step_image(10, 6);
        let out = edges(
            &img,
            &EdgesParams {
                method: EdgeMethod::Canny,
                threshold: 100,
                overlay: true,
            },
        );
        assert_eq!(out.get_pixel(4, 2), &OVERLAY_COLOR);
        assert_eq!(out.get_pixel(8, 2), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(0, 2), &Rgb([0, 0, 0]));
    }
}
