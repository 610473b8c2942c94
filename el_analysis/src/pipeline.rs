//! ABOUTME: Event visual pipeline: extract frames, sample, analyze, then judge the description
//! ABOUTME: Entry point the event handler calls once per detected event

use chrono::{DateTime, Utc};
use el_config::Config;
use el_core::{Error, Id, MonotonicTimer, Result};
use el_vision::{
    ClipHandle, Frame, FrameSampler, FrameSource, SamplingRequest, SamplingResult,
    SamplingStrategy,
};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::orchestrator::AnalysisOrchestrator;
use crate::quality::{QualityEvaluator, ResponseQualityEvaluator};
use crate::{AnalysisMode, AnalysisRequest, AnalysisResult, QualityVerdict};

/// Per-request knobs, read once when the event arrives
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub mode: AnalysisMode,
    pub target_frame_count: usize,
    pub strategy: SamplingStrategy,
    pub min_spacing_ms: u64,
    pub custom_prompt: Option<String>,
    pub include_audio_transcript: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RequestSettings {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.analysis.mode,
            target_frame_count: config.sampling.target_frame_count,
            strategy: config.sampling.strategy,
            min_spacing_ms: config.sampling.min_spacing_ms,
            custom_prompt: config.analysis.custom_prompt.clone(),
            include_audio_transcript: config.analysis.include_audio_transcript,
        }
    }
}

/// One detected event as handed to the pipeline
#[derive(Debug, Clone)]
pub struct EventInputs {
    pub event_id: Id,
    pub camera_name: String,
    pub timestamp: DateTime<Utc>,
    pub clip: Option<ClipHandle>,
    /// Already-decoded candidates; skips the frame source when set
    pub frames: Option<Vec<Frame>>,
    /// Ignore clip frames before this offset
    pub frame_offset_ms: u64,
    pub detected_objects: Vec<String>,
    pub settings: RequestSettings,
}

impl EventInputs {
    pub fn new(camera_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Id::new(),
            camera_name: camera_name.into(),
            timestamp,
            clip: None,
            frames: None,
            frame_offset_ms: 0,
            detected_objects: Vec::new(),
            settings: RequestSettings::default(),
        }
    }

    pub fn with_event_id(mut self, event_id: Id) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_clip(mut self, clip: ClipHandle) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_frame_offset_ms(mut self, offset_ms: u64) -> Self {
        self.frame_offset_ms = offset_ms;
        self
    }

    pub fn with_detected_objects(mut self, objects: Vec<String>) -> Self {
        self.detected_objects = objects;
        self
    }

    pub fn with_settings(mut self, settings: RequestSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Everything the pipeline learned about one event
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub analysis: AnalysisResult,
    pub verdict: QualityVerdict,
    #[serde(skip)]
    pub sampling: SamplingResult,
}

impl PipelineOutput {
    pub fn into_parts(self) -> (AnalysisResult, QualityVerdict, SamplingResult) {
        (self.analysis, self.verdict, self.sampling)
    }
}

/// Frame source, sampler, orchestrator, and evaluator wired together
pub struct EventVisualPipeline {
    frame_source: Arc<dyn FrameSource>,
    sampler: Arc<FrameSampler>,
    orchestrator: Arc<AnalysisOrchestrator>,
    evaluator: Arc<dyn QualityEvaluator>,
    overall_deadline: Option<Duration>,
}

impl EventVisualPipeline {
    pub fn new(
        frame_source: Arc<dyn FrameSource>,
        sampler: Arc<FrameSampler>,
        orchestrator: Arc<AnalysisOrchestrator>,
    ) -> Self {
        Self {
            frame_source,
            sampler,
            orchestrator,
            evaluator: Arc::new(ResponseQualityEvaluator::default()),
            overall_deadline: None,
        }
    }

    pub fn from_config(config: &Config, frame_source: Arc<dyn FrameSource>) -> Self {
        Self::new(
            frame_source,
            Arc::new(FrameSampler::new(config.sampling.sampler_config())),
            Arc::new(AnalysisOrchestrator::from_config(config)),
        )
        .with_evaluator(Arc::new(ResponseQualityEvaluator::new(&config.quality)))
        .with_overall_deadline(config.analysis.overall_deadline())
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn QualityEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Bound sampling plus the whole provider chain
    pub fn with_overall_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.overall_deadline = deadline;
        self
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    /// Turn one event's clip or frames into a judged description
    ///
    /// Frame source failures, an invalid sampling request, and cancellation
    /// come back as errors. Provider failures do not: they show up as
    /// `analysis.success == false`.
    pub async fn process_event_visuals(
        &self,
        inputs: EventInputs,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        let span = info_span!(
            "process_event_visuals",
            event_id = %inputs.event_id,
            camera = %inputs.camera_name,
            mode = %inputs.settings.mode,
        );
        self.run(inputs, cancel).instrument(span).await
    }

    async fn run(&self, inputs: EventInputs, cancel: &CancellationToken) -> Result<PipelineOutput> {
        let timer = MonotonicTimer::new();
        let EventInputs {
            event_id,
            camera_name,
            timestamp,
            clip,
            frames,
            frame_offset_ms,
            detected_objects,
            settings,
        } = inputs;

        let sampling = if settings.mode == AnalysisMode::VideoNative {
            debug!("Native video mode, skipping frame extraction");
            SamplingResult::empty(settings.strategy)
        } else {
            let candidates = match (frames, &clip) {
                (Some(frames), _) => frames,
                (None, Some(clip)) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        extracted = self.frame_source.extract(clip, frame_offset_ms) => extracted?,
                    }
                }
                (None, None) => Vec::new(),
            };

            let request = SamplingRequest::new(candidates, settings.target_frame_count, settings.strategy)
                .with_min_spacing_ms(settings.min_spacing_ms);
            Arc::clone(&self.sampler).sample_offloaded(request).await?
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut request = AnalysisRequest::new(settings.mode, camera_name, timestamp)
            .with_event_id(event_id)
            .with_detected_objects(detected_objects)
            .with_custom_prompt(settings.custom_prompt)
            .with_audio_transcript(settings.include_audio_transcript);
        if settings.mode != AnalysisMode::VideoNative {
            request = request.with_frames(sampling.frames());
        }
        if let Some(clip) = clip {
            request = request.with_clip(clip);
        }

        let analysis = match self.overall_deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(timer.elapsed());
                match tokio::time::timeout(remaining, self.orchestrator.analyze_cancellable(request, cancel)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(deadline_ms = deadline.as_millis() as u64, "Event analysis hit overall deadline");
                        AnalysisResult::failure(
                            format!("Analysis exceeded overall deadline of {}ms", deadline.as_millis()),
                            Vec::new(),
                        )
                    }
                }
            }
            None => self.orchestrator.analyze_cancellable(request, cancel).await?,
        };

        let verdict = self.judge(&analysis);

        info!(
            success = analysis.success,
            provider = analysis.provider_used.as_deref().unwrap_or("none"),
            frames = sampling.len(),
            low_confidence = verdict.low_confidence,
            elapsed_ms = timer.elapsed_ms(),
            "Event visual analysis finished"
        );

        Ok(PipelineOutput {
            analysis,
            verdict,
            sampling,
        })
    }

    /// Run the evaluator, treating a panic as "not flagged"
    fn judge(&self, analysis: &AnalysisResult) -> QualityVerdict {
        let Some(description) = analysis.description.as_deref().filter(|_| analysis.success) else {
            return QualityVerdict::default();
        };

        let evaluator = &self.evaluator;
        match std::panic::catch_unwind(AssertUnwindSafe(|| {
            evaluator.evaluate(description, analysis.ai_confidence)
        })) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!("Quality evaluation panicked, leaving description unflagged");
                QualityVerdict::default()
            }
        }
    }
}
