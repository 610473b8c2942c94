//! ABOUTME: Capability-aware provider fallback chain for event analysis
//! ABOUTME: Tries providers in configured order until one returns a description

use async_trait::async_trait;
use el_ai::{
    build_prompt, AnalysisMode, CostTracker, EncodedImage, PromptContext, ProviderCapability,
    ProviderCapabilityRegistry, ProviderError, ProviderResponse, RateTableCostTracker,
    VideoPayload, VisionProvider,
};
use el_config::AnalysisSettings;
use el_core::{Error, MonotonicTimer};
use el_vision::{ClipHandle, Frame};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{AnalysisRequest, AnalysisResult, AttemptOutcome, ProviderAttempt};

/// Produces a speech transcript for a clip's audio track
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// `Ok(None)` when the clip has no usable speech
    async fn transcribe(&self, clip: &ClipHandle) -> el_core::Result<Option<String>>;
}

/// Chain order, per-mode timeouts, and image encoding knobs
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub provider_order: Vec<String>,
    pub single_frame_timeout: Duration,
    pub multi_frame_timeout: Duration,
    pub video_timeout: Duration,
    pub jpeg_quality: u8,
    pub max_image_dimension: u32,
}

impl OrchestratorSettings {
    pub fn timeout_for(&self, mode: AnalysisMode) -> Duration {
        match mode {
            AnalysisMode::SingleFrame => self.single_frame_timeout,
            AnalysisMode::MultiFrame => self.multi_frame_timeout,
            AnalysisMode::VideoNative => self.video_timeout,
        }
    }

    /// Same timeout for every mode
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.single_frame_timeout = timeout;
        self.multi_frame_timeout = timeout;
        self.video_timeout = timeout;
        self
    }

    pub fn with_provider_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provider_order = order.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&AnalysisSettings::default())
    }
}

impl From<&AnalysisSettings> for OrchestratorSettings {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            provider_order: settings.provider_order.clone(),
            single_frame_timeout: settings.timeout_for(AnalysisMode::SingleFrame),
            multi_frame_timeout: settings.timeout_for(AnalysisMode::MultiFrame),
            video_timeout: settings.timeout_for(AnalysisMode::VideoNative),
            jpeg_quality: settings.jpeg_quality,
            max_image_dimension: settings.max_image_dimension,
        }
    }
}

/// Payload shared by every provider in one chain walk
enum Prepared {
    Images(Vec<EncodedImage>),
    Video(ClipHandle),
}

/// Walks the provider chain for one request at a time
///
/// Providers are tried strictly in order, skipping those whose capability
/// record does not support the request's mode. The first success wins;
/// every failure (error, timeout, over-limit clip, missing adapter) moves
/// on to the next provider.
pub struct AnalysisOrchestrator {
    registry: ProviderCapabilityRegistry,
    settings: OrchestratorSettings,
    providers: HashMap<String, Arc<dyn VisionProvider>>,
    cost_tracker: Arc<dyn CostTracker>,
    transcripts: Option<Arc<dyn TranscriptSource>>,
}

impl AnalysisOrchestrator {
    pub fn new(registry: ProviderCapabilityRegistry, settings: OrchestratorSettings) -> Self {
        Self {
            registry,
            settings,
            providers: HashMap::new(),
            cost_tracker: Arc::new(RateTableCostTracker::with_defaults()),
            transcripts: None,
        }
    }

    /// Orchestrator with adapters and rates built from loaded configuration
    pub fn from_config(config: &el_config::Config) -> Self {
        let providers = el_ai::create_providers(&config.analysis.provider_order, &config.providers);
        Self::new(
            config.analysis.capability_registry(),
            OrchestratorSettings::from(&config.analysis),
        )
        .with_providers(providers)
        .with_cost_tracker(Arc::new(config.costs.tracker()))
    }

    /// Register an adapter under its own name
    pub fn with_provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn with_providers<I>(self, providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn VisionProvider>>,
    {
        providers.into_iter().fold(self, Self::with_provider)
    }

    pub fn with_cost_tracker(mut self, cost_tracker: Arc<dyn CostTracker>) -> Self {
        self.cost_tracker = cost_tracker;
        self
    }

    pub fn with_transcript_source(mut self, source: Arc<dyn TranscriptSource>) -> Self {
        self.transcripts = Some(source);
        self
    }

    pub fn registry(&self) -> &ProviderCapabilityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Names of registered adapters
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Analyze using the configured registry and chain order
    ///
    /// Never fails: exhausting the chain yields `success == false` with the
    /// last provider error.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        match self.run(request, &self.registry, &self.settings.provider_order, None).await {
            Ok(result) => result,
            // Unreachable without a token
            Err(e) => AnalysisResult::failure(e.to_string(), Vec::new()),
        }
    }

    /// Analyze with an explicit registry and chain order for this call
    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        registry: &ProviderCapabilityRegistry,
        provider_order: &[String],
    ) -> AnalysisResult {
        match self.run(request, registry, provider_order, None).await {
            Ok(result) => result,
            Err(e) => AnalysisResult::failure(e.to_string(), Vec::new()),
        }
    }

    /// Like [`analyze`](Self::analyze), abandoning the in-flight call when
    /// `cancel` fires
    ///
    /// Cancellation is the only error; provider failures still come back
    /// inside the result.
    pub async fn analyze_cancellable(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> el_core::Result<AnalysisResult> {
        self.run(request, &self.registry, &self.settings.provider_order, Some(cancel))
            .await
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        registry: &ProviderCapabilityRegistry,
        order: &[String],
        cancel: Option<&CancellationToken>,
    ) -> el_core::Result<AnalysisResult> {
        let span = info_span!(
            "analyze_event",
            event_id = %request.event_id,
            camera = %request.camera_name,
            mode = %request.mode,
        );
        self.walk_chain(request, registry, order, cancel)
            .instrument(span)
            .await
    }

    async fn walk_chain(
        &self,
        request: AnalysisRequest,
        registry: &ProviderCapabilityRegistry,
        order: &[String],
        cancel: Option<&CancellationToken>,
    ) -> el_core::Result<AnalysisResult> {
        let mode = request.mode;

        // A provider is tried at most once per walk
        let mut seen = HashSet::new();
        let unique: Vec<String> = order
            .iter()
            .filter(|name| {
                let first = seen.insert(name.as_str());
                if !first {
                    debug!(provider = %name, "Provider listed twice in chain, ignoring repeat");
                }
                first
            })
            .cloned()
            .collect();

        let chain = registry.capable_of(mode, &unique);
        let mut attempts: Vec<ProviderAttempt> = unique
            .iter()
            .filter(|name| !chain.contains(&name.as_str()))
            .map(|name| {
                let reason = match registry.get(name) {
                    Some(_) => format!("does not support {}", mode),
                    None => "no capability record".to_string(),
                };
                debug!(provider = %name, reason = %reason, "Skipping provider");
                skipped(name, reason)
            })
            .collect();

        if chain.is_empty() {
            let error = format!("No configured provider supports {} analysis", mode);
            warn!(error = %error, "No capable provider, nothing called");
            return Ok(AnalysisResult::failure(error, attempts));
        }

        let prepared = match until_cancelled(cancel, self.prepare(&request)).await? {
            Ok(prepared) => prepared,
            Err(message) => {
                warn!(error = %message, "Analysis inputs unusable, no provider called");
                return Ok(AnalysisResult::failure(message, attempts));
            }
        };

        // Fetched on the first real call, then reused
        let mut transcript: Option<Option<String>> = None;
        let mut video: Option<VideoPayload> = None;
        let mut last_error: Option<String> = None;

        for name in chain {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(Error::Cancelled);
            }

            let timer = MonotonicTimer::new();
            let outcome = match (registry.get(name), self.providers.get(name)) {
                (Some(capability), Some(provider)) => {
                    if transcript.is_none() {
                        transcript = Some(self.transcript_for(&request, cancel).await?);
                    }
                    self.attempt(
                        capability,
                        &**provider,
                        &request,
                        &prepared,
                        transcript.as_ref().and_then(Option::as_deref),
                        &mut video,
                        cancel,
                    )
                    .await?
                }
                _ => Err(ProviderError::NotConfigured(format!(
                    "no adapter registered for {}",
                    name
                ))),
            };

            match outcome {
                Ok(response) => {
                    let elapsed_ms = timer.elapsed_ms();
                    let estimated_cost = response
                        .tokens_used
                        .and_then(|tokens| self.cost_tracker.estimate(name, tokens));

                    info!(
                        provider = %name,
                        elapsed_ms,
                        tokens = ?response.tokens_used,
                        confidence = ?response.confidence,
                        "Provider produced description"
                    );

                    attempts.push(ProviderAttempt {
                        provider: name.to_string(),
                        outcome: AttemptOutcome::Success,
                        error: None,
                        elapsed_ms,
                    });

                    return Ok(AnalysisResult {
                        success: true,
                        description: Some(response.description),
                        ai_confidence: response.confidence,
                        provider_used: Some(name.to_string()),
                        tokens_used: response.tokens_used,
                        estimated_cost,
                        error: None,
                        attempts,
                    });
                }
                Err(e) => {
                    let elapsed_ms = timer.elapsed_ms();
                    warn!(
                        provider = %name,
                        kind = e.kind(),
                        error = %e,
                        elapsed_ms,
                        "Provider failed, trying next"
                    );
                    let message = format!("{}: {}", name, e);
                    attempts.push(ProviderAttempt {
                        provider: name.to_string(),
                        outcome: AttemptOutcome::Failure,
                        error: Some(message.clone()),
                        elapsed_ms,
                    });
                    last_error = Some(message);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| format!("No configured provider supports {} analysis", mode));
        warn!(error = %error, attempts = attempts.len(), "Provider chain exhausted");
        Ok(AnalysisResult::failure(error, attempts))
    }

    /// One provider call, bounded by the mode timeout
    ///
    /// The outer `Err` is cancellation; the inner result is the provider's.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        capability: &ProviderCapability,
        provider: &dyn VisionProvider,
        request: &AnalysisRequest,
        prepared: &Prepared,
        transcript: Option<&str>,
        video: &mut Option<VideoPayload>,
        cancel: Option<&CancellationToken>,
    ) -> el_core::Result<Result<ProviderResponse, ProviderError>> {
        let name = capability.name.as_str();

        let timeout = self.settings.timeout_for(request.mode);
        let mut ctx = PromptContext::new(request.mode, &request.camera_name, request.timestamp);
        ctx.detected_objects = &request.detected_objects;
        ctx.custom_prompt = request.custom_prompt.as_deref();
        if request.mode != AnalysisMode::SingleFrame {
            ctx.transcript = transcript;
        }

        let call = async {
            match prepared {
                Prepared::Images(images) => {
                    if request.mode == AnalysisMode::SingleFrame {
                        let Some(first) = images.first() else {
                            return Err(ProviderError::InvalidInput("no frames".to_string()));
                        };
                        ctx.frame_count = 1;
                        let prompt = build_prompt(&ctx);
                        debug!(provider = name, "Calling single-frame analysis");
                        provider.analyze_single(first, &prompt).await
                    } else {
                        let capped = cap_frames(images, capability.max_frames);
                        if capped.is_empty() {
                            return Err(ProviderError::InvalidInput(format!(
                                "{} accepts no frames (max_frames is {})",
                                name, capability.max_frames
                            )));
                        }
                        ctx.frame_count = capped.len();
                        let prompt = build_prompt(&ctx);
                        debug!(provider = name, frames = capped.len(), "Calling multi-frame analysis");
                        provider.analyze_multi(&capped, &prompt).await
                    }
                }
                Prepared::Video(clip) => {
                    capability.check_clip(clip.duration, clip.size_mb())
                        .map_err(ProviderError::InvalidInput)?;

                    if video.is_none() {
                        *video = Some(VideoPayload::load(clip).await?);
                    }
                    let Some(payload) = video.as_ref() else {
                        return Err(ProviderError::InvalidInput("clip not loaded".to_string()));
                    };
                    capability
                        .check_clip(payload.duration, Some(payload.size_mb()))
                        .map_err(ProviderError::InvalidInput)?;

                    let prompt = build_prompt(&ctx);
                    debug!(provider = name, bytes = payload.data.len(), "Calling native video analysis");
                    provider.analyze_video(payload, &prompt).await
                }
            }
        };

        let Ok(result) = until_cancelled(cancel, tokio::time::timeout(timeout, call)).await else {
            info!(provider = name, "Analysis cancelled mid-call");
            return Err(Error::Cancelled);
        };

        Ok(result.unwrap_or(Err(ProviderError::Timeout(timeout))))
    }

    /// Validate inputs and encode frames once for the whole chain
    async fn prepare(&self, request: &AnalysisRequest) -> Result<Prepared, String> {
        match request.mode {
            AnalysisMode::VideoNative => request
                .clip
                .clone()
                .map(Prepared::Video)
                .ok_or_else(|| "No clip available for video_native analysis".to_string()),
            mode => {
                let frames: Vec<Frame> = match &request.frames {
                    Some(frames) if !frames.is_empty() => {
                        if mode == AnalysisMode::SingleFrame {
                            frames[..1].to_vec()
                        } else {
                            frames.clone()
                        }
                    }
                    _ => return Err(format!("No frames available for {} analysis", mode)),
                };

                let quality = self.settings.jpeg_quality;
                let max_dimension = self.settings.max_image_dimension;
                let images = tokio::task::spawn_blocking(move || {
                    frames
                        .iter()
                        .map(|f| EncodedImage::from_frame(f, quality, max_dimension))
                        .collect::<el_core::Result<Vec<_>>>()
                })
                .await
                .map_err(|e| format!("Frame encoding task failed: {}", e))?
                .map_err(|e| format!("Failed to encode frames: {}", e))?;

                debug!(frames = images.len(), "Encoded frames for upload");
                Ok(Prepared::Images(images))
            }
        }
    }

    /// Transcript for modes that carry audio
    ///
    /// Bounded by the mode timeout; a slow or failing source means no
    /// transcript. Only cancellation is an error.
    async fn transcript_for(
        &self,
        request: &AnalysisRequest,
        cancel: Option<&CancellationToken>,
    ) -> el_core::Result<Option<String>> {
        if !request.include_audio_transcript || request.mode == AnalysisMode::SingleFrame {
            return Ok(None);
        }
        let (Some(clip), Some(source)) = (
            request.clip.as_ref().filter(|c| c.has_audio),
            self.transcripts.as_ref(),
        ) else {
            return Ok(None);
        };

        let timeout = self.settings.timeout_for(request.mode);
        match until_cancelled(cancel, tokio::time::timeout(timeout, source.transcribe(clip))).await? {
            Ok(Ok(transcript)) => Ok(transcript.filter(|t| !t.trim().is_empty())),
            Ok(Err(e)) => {
                warn!(error = %e, "Transcript extraction failed, continuing without audio");
                Ok(None)
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Transcript extraction timed out, continuing without audio"
                );
                Ok(None)
            }
        }
    }
}

/// Await `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> el_core::Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

fn skipped(provider: &str, reason: String) -> ProviderAttempt {
    ProviderAttempt {
        provider: provider.to_string(),
        outcome: AttemptOutcome::Skipped,
        error: Some(reason),
        elapsed_ms: 0,
    }
}

/// Positions kept when `len` frames must fit in `max`: the earliest
/// `max - 1` plus the final frame, or just the first frame when `max` is 1
pub fn capped_positions(len: usize, max: usize) -> Vec<usize> {
    if max == 0 || len == 0 {
        return Vec::new();
    }
    if len <= max {
        return (0..len).collect();
    }
    if max == 1 {
        return vec![0];
    }
    (0..max - 1).chain(std::iter::once(len - 1)).collect()
}

fn cap_frames(images: &[EncodedImage], max: usize) -> Vec<EncodedImage> {
    capped_positions(images.len(), max)
        .into_iter()
        .map(|i| images[i].clone())
        .collect()
}
