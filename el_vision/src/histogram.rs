//! ABOUTME: Normalised RGB colour histograms used as a cheap near-duplicate pre-filter
//! ABOUTME: Compares frames by histogram intersection on a 0..1 similarity scale

use image::RgbImage;

/// Upper bound on pixels visited per histogram; larger frames are strided
const MAX_SAMPLED_PIXELS: usize = 65_536;

/// Joint RGB histogram with `bins_per_channel³` bins summing to 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins_per_channel: u32,
    bins: Vec<f32>,
}

impl Histogram {
    /// Build a histogram from an RGB raster
    ///
    /// `bins_per_channel` is clamped to 1..=64. Images larger than
    /// [`MAX_SAMPLED_PIXELS`] are sampled with a fixed stride.
    pub fn from_rgb(image: &RgbImage, bins_per_channel: u32) -> Self {
        let per_channel = bins_per_channel.clamp(1, 64);
        let total_bins = (per_channel * per_channel * per_channel) as usize;
        let mut counts = vec![0u32; total_bins];

        let pixel_count = (image.width() as usize) * (image.height() as usize);
        let stride = (pixel_count / MAX_SAMPLED_PIXELS).max(1);

        let mut sampled = 0u32;
        for pixel in image.pixels().step_by(stride) {
            let [r, g, b] = pixel.0;
            let r_bin = (r as u32 * per_channel) / 256;
            let g_bin = (g as u32 * per_channel) / 256;
            let b_bin = (b as u32 * per_channel) / 256;
            let index = (r_bin * per_channel * per_channel + g_bin * per_channel + b_bin) as usize;
            counts[index] += 1;
            sampled += 1;
        }

        let bins = if sampled == 0 {
            vec![0.0; total_bins]
        } else {
            counts
                .into_iter()
                .map(|c| c as f32 / sampled as f32)
                .collect()
        };

        Self {
            bins_per_channel: per_channel,
            bins,
        }
    }

    pub fn bins_per_channel(&self) -> u32 {
        self.bins_per_channel
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Histogram intersection in [0, 1]; 1.0 means identical distributions
    pub fn similarity(&self, other: &Histogram) -> f64 {
        if self.bins.len() != other.bins.len() || self.bins.is_empty() {
            return 0.0;
        }

        let mut intersection = 0.0f64;
        let mut sum_a = 0.0f64;
        let mut sum_b = 0.0f64;

        for (a, b) in self.bins.iter().zip(other.bins.iter()) {
            intersection += (*a as f64).min(*b as f64);
            sum_a += *a as f64;
            sum_b += *b as f64;
        }

        let denominator = sum_a.min(sum_b);
        if denominator > 0.0 {
            (intersection / denominator).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// `1 - similarity`
    pub fn distance(&self, other: &Histogram) -> f64 {
        1.0 - self.similarity(other)
    }
}
