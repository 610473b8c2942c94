//! ABOUTME: Content-aware frame sampler selecting a diverse, well-spread subset of a clip
//! ABOUTME: Implements uniform, adaptive (histogram + SSIM filter), and hybrid (adaptive + backfill)

use el_core::{Error, MonotonicTimer, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{
    ssim::ssim, Frame, SamplerConfig, SamplingRequest, SamplingResult, SamplingStrategy,
    SelectedFrame,
};

/// Frame sampler; stateless apart from its thresholds
#[derive(Debug, Clone, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

/// Why a candidate was passed over during the diversity walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TooSoon,
    HistogramDuplicate,
    StructuralDuplicate,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Select frames according to the request's strategy
    ///
    /// Only a `target_count` of zero is rejected; an empty candidate list
    /// yields an empty result.
    pub fn sample(&self, request: &SamplingRequest) -> Result<SamplingResult> {
        if request.target_count == 0 {
            return Err(Error::Validation(
                "target_count must be at least 1".to_string(),
            ));
        }

        let timer = MonotonicTimer::new();
        let frames = &request.candidate_frames;
        let total = frames.len();

        if total == 0 {
            debug!("No candidate frames, returning empty sampling result");
            return Ok(SamplingResult::empty(request.strategy));
        }

        if total <= request.target_count {
            debug!(
                candidates = total,
                target = request.target_count,
                "Clip shorter than target, keeping every candidate"
            );
            return Ok(build_result(frames, (0..total).collect(), request.strategy, false));
        }

        let min_spacing = Duration::from_millis(request.min_spacing_ms);

        let (indices, fell_back) = match request.strategy {
            SamplingStrategy::Uniform => (uniform_positions(total, request.target_count), false),
            SamplingStrategy::Adaptive => {
                let diverse = self.select_diverse(frames, min_spacing);
                (thin_to_target(diverse, request.target_count), false)
            }
            SamplingStrategy::Hybrid => {
                let diverse = self.select_diverse(frames, min_spacing);
                let diverse = thin_to_target(diverse, request.target_count);
                if diverse.len() < request.target_count {
                    (backfill_uniform(diverse, total, request.target_count), true)
                } else {
                    (diverse, false)
                }
            }
        };

        debug!(
            strategy = %request.strategy,
            candidates = total,
            selected = indices.len(),
            fell_back_to_uniform = fell_back,
            elapsed_ms = timer.elapsed_ms(),
            "Frame sampling completed"
        );

        Ok(build_result(frames, indices, request.strategy, fell_back))
    }

    /// Run [`FrameSampler::sample`] on the blocking thread pool
    ///
    /// Sampling is CPU bound; this keeps it off the async executor threads.
    pub async fn sample_offloaded(
        self: Arc<Self>,
        request: SamplingRequest,
    ) -> Result<SamplingResult> {
        tokio::task::spawn_blocking(move || self.sample(&request))
            .await
            .map_err(|e| Error::External(format!("Frame sampling task failed: {}", e)))?
    }

    /// Walk the candidates keeping frames that differ from the last kept one
    fn select_diverse(&self, frames: &[Frame], min_spacing: Duration) -> Vec<usize> {
        let mut selected = vec![0usize];
        let mut last = 0usize;
        let mut too_soon = 0usize;
        let mut histogram_dupes = 0usize;
        let mut structural_dupes = 0usize;

        for index in 1..frames.len() {
            match self.compare(&frames[last], &frames[index], min_spacing) {
                Ok(()) => {
                    selected.push(index);
                    last = index;
                }
                Err(Rejection::TooSoon) => too_soon += 1,
                Err(Rejection::HistogramDuplicate) => histogram_dupes += 1,
                Err(Rejection::StructuralDuplicate) => structural_dupes += 1,
            }
        }

        debug!(
            kept = selected.len(),
            too_soon, histogram_dupes, structural_dupes, "Diversity walk finished"
        );

        selected
    }

    fn compare(
        &self,
        last: &Frame,
        candidate: &Frame,
        min_spacing: Duration,
    ) -> std::result::Result<(), Rejection> {
        let gap = candidate
            .timestamp_offset()
            .saturating_sub(last.timestamp_offset());
        if gap < min_spacing {
            return Err(Rejection::TooSoon);
        }

        let bins = self.config.histogram_bins_per_channel;
        let histogram_similarity = last.histogram(bins).similarity(&candidate.histogram(bins));
        if histogram_similarity >= self.config.histogram_similarity_threshold {
            return Err(Rejection::HistogramDuplicate);
        }

        let structural = ssim(last.image(), candidate.image(), self.config.ssim_max_dimension);
        if structural >= self.config.ssim_threshold {
            return Err(Rejection::StructuralDuplicate);
        }

        Ok(())
    }
}

/// `count` evenly spaced positions in `0..len`, always including the first
/// and (when `count > 1`) the last position
pub fn uniform_positions(len: usize, count: usize) -> Vec<usize> {
    if count == 0 || len == 0 {
        return Vec::new();
    }
    if count >= len {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![0];
    }

    let span = len - 1;
    let steps = count - 1;
    (0..count).map(|i| (i * span + steps / 2) / steps).collect()
}

/// Reduce an over-full diverse selection evenly, keeping its first entry
fn thin_to_target(selected: Vec<usize>, target: usize) -> Vec<usize> {
    if selected.len() <= target {
        return selected;
    }
    uniform_positions(selected.len(), target)
        .into_iter()
        .map(|p| selected[p])
        .collect()
}

/// Top up `selected` with evenly spaced unselected indices, chronologically merged
fn backfill_uniform(selected: Vec<usize>, total: usize, target: usize) -> Vec<usize> {
    let needed = target.saturating_sub(selected.len());
    let mut is_selected = vec![false; total];
    for &index in &selected {
        is_selected[index] = true;
    }

    let pool: Vec<usize> = (0..total).filter(|i| !is_selected[*i]).collect();
    let mut merged = selected;
    merged.extend(
        uniform_positions(pool.len(), needed)
            .into_iter()
            .map(|p| pool[p]),
    );
    merged.sort_unstable();
    merged
}

fn build_result(
    frames: &[Frame],
    indices: Vec<usize>,
    strategy: SamplingStrategy,
    fell_back_to_uniform: bool,
) -> SamplingResult {
    SamplingResult {
        selected: indices
            .into_iter()
            .map(|original_index| SelectedFrame {
                original_index,
                frame: frames[original_index].clone(),
            })
            .collect(),
        strategy_used: strategy,
        fell_back_to_uniform,
    }
}
