//! ABOUTME: End-to-end tests for process_event_visuals with in-memory frames and stub providers
//! ABOUTME: Covers sampling handoff, native video, quality flags, deadlines, and cancellation

use chrono::Utc;
use el_ai::{ProviderCapabilityRegistry, StubProvider, VisionProvider};
use el_analysis::{
    AnalysisMode, AnalysisOrchestrator, EventInputs, EventVisualPipeline, OrchestratorSettings,
    QualityEvaluator, QualityVerdict, RequestSettings,
};
use el_config::Config;
use el_vision::{
    utils::frames_at_interval, ClipHandle, FrameSampler, MemoryFrameSource, SamplingStrategy,
};
use std::sync::Arc;
use std::time::Duration;
use test_support::{gradient_rgb, temp_dir_path};
use tokio_util::sync::CancellationToken;

const CLIP: &str = "/clips/front-door/event.mp4";

fn frame_source(count: u8) -> Arc<MemoryFrameSource> {
    let frames = frames_at_interval((0..count).map(|i| gradient_rgb(48, 32, i)), 1000);
    Arc::new(MemoryFrameSource::new().with_clip(CLIP, frames))
}

fn orchestrator_with(stub: StubProvider) -> Arc<AnalysisOrchestrator> {
    let settings = OrchestratorSettings::default()
        .with_provider_order(["stub"])
        .with_timeout(Duration::from_secs(5));
    Arc::new(
        AnalysisOrchestrator::new(ProviderCapabilityRegistry::with_defaults(), settings)
            .with_provider(Arc::new(stub) as Arc<dyn VisionProvider>),
    )
}

fn pipeline(source: Arc<MemoryFrameSource>, stub: StubProvider) -> EventVisualPipeline {
    EventVisualPipeline::new(source, Arc::new(FrameSampler::default()), orchestrator_with(stub))
}

fn settings(mode: AnalysisMode, target: usize) -> RequestSettings {
    RequestSettings {
        mode,
        target_frame_count: target,
        strategy: SamplingStrategy::Uniform,
        ..RequestSettings::default()
    }
}

fn event(mode: AnalysisMode, target: usize) -> EventInputs {
    EventInputs::new("Front Door", Utc::now())
        .with_clip(ClipHandle::new(CLIP))
        .with_detected_objects(vec!["person".to_string()])
        .with_settings(settings(mode, target))
}

struct PanickingEvaluator;

impl QualityEvaluator for PanickingEvaluator {
    fn evaluate(&self, _description: &str, _ai_confidence: Option<u8>) -> QualityVerdict {
        panic!("evaluator bug");
    }
}

#[tokio::test]
async fn test_process_event_samples_then_analyzes() {
    let pipeline = pipeline(frame_source(12), StubProvider::new("stub"));

    let output = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.sampling.len(), 5);
    assert_eq!(output.sampling.indices()[0], 0);
    assert!(output.analysis.success);
    assert_eq!(output.analysis.provider_used.as_deref(), Some("stub"));
    assert_eq!(output.analysis.ai_confidence, Some(80));
    assert!(!output.verdict.low_confidence);
    assert_eq!(output.verdict.vague_reason, None);
}

#[tokio::test]
async fn test_frame_offset_applied() {
    let pipeline = pipeline(frame_source(12), StubProvider::new("stub"));

    let output = pipeline
        .process_event_visuals(
            event(AnalysisMode::MultiFrame, 20).with_frame_offset_ms(8000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Frames at 8s..11s remain
    assert_eq!(output.sampling.len(), 4);
}

#[tokio::test]
async fn test_frame_source_failure_is_an_error() {
    let pipeline = pipeline(frame_source(4), StubProvider::new("stub"));
    let inputs = EventInputs::new("Garage", Utc::now())
        .with_clip(ClipHandle::new("/clips/unknown.mp4"))
        .with_settings(settings(AnalysisMode::MultiFrame, 5));

    let outcome = pipeline.process_event_visuals(inputs, &CancellationToken::new()).await;

    assert!(matches!(outcome, Err(el_core::Error::NotFound(_))));
}

#[tokio::test]
async fn test_preextracted_frames_bypass_source() {
    let pipeline = pipeline(Arc::new(MemoryFrameSource::new()), StubProvider::new("stub"));
    let frames = frames_at_interval((0..3).map(|i| gradient_rgb(48, 32, i)), 1000);
    let inputs = EventInputs::new("Porch", Utc::now())
        .with_frames(frames)
        .with_settings(settings(AnalysisMode::SingleFrame, 5));

    let output = pipeline
        .process_event_visuals(inputs, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(output.sampling.len(), 3);
    assert!(output.analysis.success);
}

#[tokio::test]
async fn test_video_native_skips_frame_extraction() {
    let dir = temp_dir_path("pipeline-video");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("event.mp4");
    std::fs::write(&path, vec![1u8; 4096]).unwrap();

    // Empty source: extraction would fail with NotFound
    let pipeline = pipeline(Arc::new(MemoryFrameSource::new()), StubProvider::new("stub"));
    let inputs = EventInputs::new("Backyard", Utc::now())
        .with_clip(ClipHandle::new(&path).with_duration(Duration::from_secs(20)))
        .with_settings(settings(AnalysisMode::VideoNative, 10));

    let output = pipeline
        .process_event_visuals(inputs, &CancellationToken::new())
        .await
        .unwrap();

    std::fs::remove_dir_all(&dir).ok();

    assert!(output.sampling.is_empty());
    assert!(output.analysis.success);
}

#[tokio::test]
async fn test_vague_description_flagged() {
    let stub = StubProvider::new("stub").with_reply("A person appears to be near the door.", Some(95));
    let pipeline = pipeline(frame_source(6), stub);

    let output = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(output.analysis.success);
    assert!(output.verdict.low_confidence);
    assert_eq!(
        output.verdict.vague_reason.as_deref(),
        Some("Contains vague phrase: 'appears to be'")
    );
}

#[tokio::test]
async fn test_evaluator_panic_leaves_result_unflagged() {
    let stub = StubProvider::new("stub").with_reply("Motion detected.", Some(10));
    let pipeline = pipeline(frame_source(6), stub).with_evaluator(Arc::new(PanickingEvaluator));

    let output = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(output.analysis.success);
    assert_eq!(output.verdict, QualityVerdict::default());
}

#[tokio::test]
async fn test_failed_analysis_is_not_judged() {
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        ProviderCapabilityRegistry::with_defaults(),
        OrchestratorSettings::default().with_provider_order(["stub"]),
    ));
    let pipeline = EventVisualPipeline::new(frame_source(6), Arc::new(FrameSampler::default()), orchestrator);

    let output = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!output.analysis.success);
    assert!(output.analysis.error.is_some());
    assert_eq!(output.verdict, QualityVerdict::default());
}

#[tokio::test]
async fn test_overall_deadline_bounds_analysis() {
    let slow = StubProvider::new("stub").with_latency(Duration::from_millis(500));
    let pipeline = pipeline(frame_source(6), slow).with_overall_deadline(Some(Duration::from_millis(100)));

    let output = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!output.analysis.success);
    assert!(output.analysis.error.unwrap().contains("deadline"));
}

#[tokio::test]
async fn test_cancelled_before_analysis() {
    let stub = StubProvider::new("stub");
    let pipeline = pipeline(frame_source(6), stub);
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline
        .process_event_visuals(event(AnalysisMode::MultiFrame, 5), &token)
        .await;

    assert!(matches!(outcome, Err(el_core::Error::Cancelled)));
}

#[tokio::test]
async fn test_from_config_runs_offline_with_stub() {
    let mut config = Config::default();
    config.analysis.provider_order = vec!["stub".to_string()];
    config.sampling.target_frame_count = 5;

    let pipeline = EventVisualPipeline::from_config(&config, frame_source(10));
    let inputs = event(AnalysisMode::MultiFrame, 5).with_settings(RequestSettings::from(&config));

    let output = pipeline
        .process_event_visuals(inputs, &CancellationToken::new())
        .await
        .unwrap();

    assert!(output.analysis.success);
    assert_eq!(output.analysis.provider_used.as_deref(), Some("stub"));
    assert_eq!(output.analysis.estimated_cost, Some(0.0));
}
