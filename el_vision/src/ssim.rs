//! ABOUTME: Structural similarity (SSIM) between two frames on a grayscale downscale
//! ABOUTME: Mean SSIM over 8x8 windows, used to reject lighting-flicker near duplicates

use image::{imageops::FilterType, GrayImage, RgbImage};

const WINDOW: u32 = 8;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Mean structural similarity of two RGB images
///
/// Both images are converted to grayscale and resized to a common size whose
/// longest side is at most `max_dimension` (the first image's aspect ratio
/// wins). Returns a value in [-1, 1]; identical images score 1.0 and empty
/// images score 0.0.
pub fn ssim(a: &RgbImage, b: &RgbImage, max_dimension: u32) -> f64 {
    if a.width() == 0 || a.height() == 0 || b.width() == 0 || b.height() == 0 {
        return 0.0;
    }

    let (width, height) = target_size(a.width(), a.height(), max_dimension);
    let gray_a = to_gray(a, width, height);
    let gray_b = to_gray(b, width, height);

    ssim_gray(&gray_a, &gray_b)
}

/// Mean SSIM of two equally sized grayscale images
pub fn ssim_gray(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let window_w = WINDOW.min(width);
    let window_h = WINDOW.min(height);

    let mut total = 0.0f64;
    let mut windows = 0u32;

    let mut y = 0;
    while y + window_h <= height {
        let mut x = 0;
        while x + window_w <= width {
            total += window_ssim(a, b, x, y, window_w, window_h);
            windows += 1;
            x += window_w;
        }
        y += window_h;
    }

    if windows == 0 {
        0.0
    } else {
        total / windows as f64
    }
}

fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    let n = (w * h) as f64;
    let mut sum_a = 0.0f64;
    let mut sum_b = 0.0f64;
    let mut sum_aa = 0.0f64;
    let mut sum_bb = 0.0f64;
    let mut sum_ab = 0.0f64;

    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let pa = a.get_pixel(x, y).0[0] as f64;
            let pb = b.get_pixel(x, y).0[0] as f64;
            sum_a += pa;
            sum_b += pb;
            sum_aa += pa * pa;
            sum_bb += pb * pb;
            sum_ab += pa * pb;
        }
    }

    let mean_a = sum_a / n;
    let mean_b = sum_b / n;
    let var_a = (sum_aa / n - mean_a * mean_a).max(0.0);
    let var_b = (sum_bb / n - mean_b * mean_b).max(0.0);
    let covariance = sum_ab / n - mean_a * mean_b;

    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * covariance + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);

    numerator / denominator
}

fn target_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

fn to_gray(img: &RgbImage, width: u32, height: u32) -> GrayImage {
    let gray = image::imageops::grayscale(img);
    if gray.dimensions() == (width, height) {
        gray
    } else {
        image::imageops::resize(&gray, width, height, FilterType::Triangle)
    }
}
