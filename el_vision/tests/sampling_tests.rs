//! ABOUTME: Integration tests for frame sampling over synthetic clips
//! ABOUTME: Checks ordering, first-frame retention, short clips, and duplicate filtering

use el_vision::{
    utils::frames_at_interval, ClipHandle, Frame, FrameSampler, FrameSource, MemoryFrameSource,
    SamplingRequest, SamplingStrategy,
};
use std::sync::Arc;
use test_support::{checkerboard, frame_with_block, gradient_rgb, solid_rgb};

const STRATEGIES: [SamplingStrategy; 3] = [
    SamplingStrategy::Uniform,
    SamplingStrategy::Adaptive,
    SamplingStrategy::Hybrid,
];

/// A person walking left to right across a static scene
fn walking_subject_clip(count: u32) -> Vec<Frame> {
    frames_at_interval(
        (0..count).map(|i| frame_with_block(128, 64, (i * 7) % 104, 20, 24)),
        200,
    )
}

#[test]
fn test_first_frame_always_kept() {
    let sampler = FrameSampler::default();
    for len in 1..25u8 {
        let frames = frames_at_interval((0..len).map(|i| gradient_rgb(32, 32, i)), 300);
        for target in [1usize, 3, 5, 10, 20] {
            for strategy in STRATEGIES {
                let request = SamplingRequest::new(frames.clone(), target, strategy);
                let result = sampler.sample(&request).unwrap();
                assert!(!result.is_empty(), "len={} target={} {}", len, target, strategy);
                assert_eq!(result.selected[0].original_index, 0);
                assert!(result.len() <= target.max(len as usize));
            }
        }
    }
}

#[test]
fn test_short_clip_returns_all_in_order() {
    let sampler = FrameSampler::default();
    let frames = frames_at_interval((0..6).map(|i| gradient_rgb(16, 16, i)), 100);
    for strategy in STRATEGIES {
        let result = sampler
            .sample(&SamplingRequest::new(frames.clone(), 6, strategy))
            .unwrap();
        assert_eq!(result.indices(), vec![0, 1, 2, 3, 4, 5]);
    }
}

#[test]
fn test_selection_is_chronological() {
    let sampler = FrameSampler::default();
    let frames = walking_subject_clip(40);
    for strategy in STRATEGIES {
        let result = sampler
            .sample(&SamplingRequest::new(frames.clone(), 10, strategy))
            .unwrap();
        let offsets: Vec<_> = result
            .selected
            .iter()
            .map(|s| s.frame.timestamp_offset())
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]), "{}", strategy);
    }
}

#[test]
fn test_near_identical_frames_filtered() {
    let sampler = FrameSampler::default();
    // Tiny per-frame brightness wobble keeps every pair well above 0.98 similarity
    let frames = frames_at_interval(
        (0..20u8).map(|i| solid_rgb(48, 48, [100 + i % 2, 100, 100])),
        1000,
    );
    let result = sampler
        .sample(&SamplingRequest::new(frames, 10, SamplingStrategy::Adaptive))
        .unwrap();
    assert!(result.len() < 20);
    assert_eq!(result.len(), 1);
    assert!(!result.fell_back_to_uniform);
}

#[test]
fn test_hybrid_fills_target_on_partially_static_clip() {
    let sampler = FrameSampler::default();
    let mut images: Vec<_> = (0..15).map(|_| solid_rgb(48, 48, [40, 40, 40])).collect();
    images.push(checkerboard(48, 48, 4));
    images.extend((0..4).map(|_| solid_rgb(48, 48, [40, 40, 40])));
    let frames = frames_at_interval(images, 1000);

    let result = sampler
        .sample(&SamplingRequest::new(frames, 8, SamplingStrategy::Hybrid))
        .unwrap();
    let indices = result.indices();
    assert_eq!(indices.len(), 8);
    assert!(indices.contains(&15), "the one distinct frame should survive: {:?}", indices);
    assert!(result.fell_back_to_uniform);
}

#[test]
fn test_uniform_repeatable() {
    let sampler = FrameSampler::default();
    let frames = walking_subject_clip(33);
    let request = SamplingRequest::new(frames, 5, SamplingStrategy::Uniform);
    let a = sampler.sample(&request).unwrap().indices();
    let b = sampler.sample(&request).unwrap().indices();
    assert_eq!(a, b);
    assert_eq!(a, vec![0, 8, 16, 24, 32]);
}

#[tokio::test]
async fn test_source_to_sampler_offloaded() {
    let clip = ClipHandle::new("/clips/driveway.mp4");
    let source = MemoryFrameSource::new().with_clip(clip.path(), walking_subject_clip(30));

    let frames = source.extract(&clip, 0).await.unwrap();
    let sampler = Arc::new(FrameSampler::default());
    let result = sampler
        .sample_offloaded(SamplingRequest::new(frames, 10, SamplingStrategy::Hybrid))
        .await
        .unwrap();

    assert_eq!(result.len(), 10);
    assert_eq!(result.strategy_used, SamplingStrategy::Hybrid);
}
