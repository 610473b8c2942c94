//! ABOUTME: Event visual-analysis orchestration, quality evaluation, and pipeline entry point
//! ABOUTME: Request, result, and verdict value types shared by the orchestrator and pipeline

use chrono::{DateTime, Utc};
use el_core::Id;
use el_vision::{ClipHandle, Frame};
use serde::{Deserialize, Serialize};

pub mod orchestrator;
pub mod pipeline;
pub mod quality;

pub use el_ai::AnalysisMode;
pub use orchestrator::{AnalysisOrchestrator, OrchestratorSettings, TranscriptSource};
pub use pipeline::{EventInputs, EventVisualPipeline, PipelineOutput, RequestSettings};
pub use quality::{QualityEvaluator, ResponseQualityEvaluator};

/// Everything the orchestrator needs for one event
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub event_id: Id,
    pub mode: AnalysisMode,
    /// Sampled frames, chronological
    pub frames: Option<Vec<Frame>>,
    pub clip: Option<ClipHandle>,
    pub camera_name: String,
    pub timestamp: DateTime<Utc>,
    pub detected_objects: Vec<String>,
    pub custom_prompt: Option<String>,
    pub include_audio_transcript: bool,
}

impl AnalysisRequest {
    pub fn new(mode: AnalysisMode, camera_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Id::new(),
            mode,
            frames: None,
            clip: None,
            camera_name: camera_name.into(),
            timestamp,
            detected_objects: Vec::new(),
            custom_prompt: None,
            include_audio_transcript: false,
        }
    }

    pub fn with_event_id(mut self, event_id: Id) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_clip(mut self, clip: ClipHandle) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn with_detected_objects(mut self, objects: Vec<String>) -> Self {
        self.detected_objects = objects;
        self
    }

    pub fn with_custom_prompt(mut self, prompt: Option<String>) -> Self {
        self.custom_prompt = prompt;
        self
    }

    pub fn with_audio_transcript(mut self, include: bool) -> Self {
        self.include_audio_transcript = include;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.as_ref().map_or(0, Vec::len)
    }
}

/// How one provider attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    /// Not attempted because the provider cannot serve the mode
    Skipped,
}

/// One step of the fallback chain walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Outcome of one orchestrated analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub description: Option<String>,
    /// Provider-reported confidence, 0-100
    pub ai_confidence: Option<u8>,
    pub provider_used: Option<String>,
    pub tokens_used: Option<u32>,
    pub estimated_cost: Option<f64>,
    pub error: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

impl AnalysisResult {
    pub fn failure(error: impl Into<String>, attempts: Vec<ProviderAttempt>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            attempts,
            ..Default::default()
        }
    }

    /// Number of providers actually called
    pub fn providers_called(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome != AttemptOutcome::Skipped)
            .count()
    }
}

/// Post-hoc judgement of a description
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub low_confidence: bool,
    pub vague_reason: Option<String>,
}
