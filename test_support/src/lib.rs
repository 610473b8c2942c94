//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Deterministic synthetic rasters and fixtures for all crates

use image::{Rgb, RgbImage};

/// A stable ULID string for tests that need a reproducible event id
pub fn fixed_event_ulid() -> &'static str {
    "01HZX3T9M4Q8W5R2K7N6B1C0DE"
}

/// Uniform single-colour frame
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Horizontal gradient whose hue shifts with `seed`
///
/// Different seeds produce frames with clearly different colour
/// distributions and structure.
pub fn gradient_rgb(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let fx = (x * 255 / width.max(1)) as u8;
        let fy = (y * 255 / height.max(1)) as u8;
        Rgb([
            fx.wrapping_add(seed.wrapping_mul(37)),
            fy.wrapping_add(seed.wrapping_mul(91)),
            seed.wrapping_mul(53) ^ (fx / 2),
        ])
    })
}

/// Grey background with a bright square, useful for "subject moved" sequences
pub fn frame_with_block(width: u32, height: u32, block_x: u32, block_y: u32, block_size: u32) -> RgbImage {
    let mut img = solid_rgb(width, height, [64, 64, 64]);
    for y in block_y..(block_y + block_size).min(height) {
        for x in block_x..(block_x + block_size).min(width) {
            img.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    img
}

/// Checkerboard with the given cell size
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbImage {
    let cell = cell.max(1);
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([240, 240, 240])
        } else {
            Rgb([15, 15, 15])
        }
    })
}

/// Helper for creating temporary directories in tests
pub fn temp_dir_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("eventlens-test-{}-{}", name, std::process::id()))
}
