//! ABOUTME: Frame handling, similarity metrics, and content-aware frame sampling
//! ABOUTME: Reduces a decoded clip to a small, diverse, chronologically ordered frame set

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod frame;
pub mod histogram;
pub mod sampler;
pub mod source;
pub mod ssim;

pub use frame::{ClipHandle, Frame};
pub use histogram::Histogram;
pub use sampler::FrameSampler;
pub use source::{FrameSource, ImageDirFrameSource, MemoryFrameSource};

// Re-export image types for benchmarks and downstream fixtures
pub use image;

/// Default minimum gap between two consecutive selected frames
pub const DEFAULT_MIN_SPACING_MS: u64 = 500;

/// Thresholds used by the adaptive and hybrid strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Histogram similarity (0.0 to 1.0) at or above which a candidate is a near-duplicate
    pub histogram_similarity_threshold: f64,
    /// SSIM at or above which a candidate is structurally identical
    pub ssim_threshold: f64,
    /// Bins per RGB channel for the histogram pre-filter
    pub histogram_bins_per_channel: u32,
    /// Longest side of the grayscale raster SSIM is computed on
    pub ssim_max_dimension: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            histogram_similarity_threshold: 0.98,
            ssim_threshold: 0.95,
            histogram_bins_per_channel: 8,
            ssim_max_dimension: 256,
        }
    }
}

/// Policy for choosing which frames to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Evenly spaced indices, no content inspection
    #[default]
    Uniform,
    /// Diversity walk only; may return fewer than the target
    Adaptive,
    /// Diversity walk topped up with uniform picks
    Hybrid,
}

impl SamplingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Adaptive => "adaptive",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingStrategy {
    type Err = el_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "adaptive" => Ok(Self::Adaptive),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(el_core::Error::Validation(format!(
                "Unknown sampling strategy: {}",
                other
            ))),
        }
    }
}

/// Input to [`FrameSampler::sample`]
#[derive(Debug, Clone)]
pub struct SamplingRequest {
    /// Decoded candidates in capture order
    pub candidate_frames: Vec<Frame>,
    /// Desired number of frames; must be at least 1
    pub target_count: usize,
    pub strategy: SamplingStrategy,
    /// Minimum gap between consecutive selections (adaptive/hybrid only)
    pub min_spacing_ms: u64,
}

impl SamplingRequest {
    pub fn new(candidate_frames: Vec<Frame>, target_count: usize, strategy: SamplingStrategy) -> Self {
        Self {
            candidate_frames,
            target_count,
            strategy,
            min_spacing_ms: DEFAULT_MIN_SPACING_MS,
        }
    }

    pub fn with_min_spacing_ms(mut self, min_spacing_ms: u64) -> Self {
        self.min_spacing_ms = min_spacing_ms;
        self
    }
}

/// A chosen frame and its position in the candidate list
#[derive(Debug, Clone)]
pub struct SelectedFrame {
    pub original_index: usize,
    pub frame: Frame,
}

/// Output of [`FrameSampler::sample`]
#[derive(Debug, Clone)]
pub struct SamplingResult {
    /// Chronologically ordered selection; starts at index 0 when non-empty
    pub selected: Vec<SelectedFrame>,
    pub strategy_used: SamplingStrategy,
    /// True when the hybrid strategy had to top up with uniform picks
    pub fell_back_to_uniform: bool,
}

impl SamplingResult {
    pub fn empty(strategy: SamplingStrategy) -> Self {
        Self {
            selected: Vec::new(),
            strategy_used: strategy,
            fell_back_to_uniform: false,
        }
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.selected.iter().map(|s| s.original_index).collect()
    }

    /// The selected frames, cloned out in order
    pub fn frames(&self) -> Vec<Frame> {
        self.selected.iter().map(|s| s.frame.clone()).collect()
    }
}

/// Utility functions for building frame sequences
pub mod utils {
    use super::Frame;
    use image::RgbImage;
    use std::time::Duration;

    /// Wrap rasters as frames captured every `spacing_ms` starting at zero
    pub fn frames_at_interval<I>(images: I, spacing_ms: u64) -> Vec<Frame>
    where
        I: IntoIterator<Item = RgbImage>,
    {
        images
            .into_iter()
            .enumerate()
            .map(|(i, img)| Frame::new(img, Duration::from_millis(i as u64 * spacing_ms)))
            .collect()
    }
}
