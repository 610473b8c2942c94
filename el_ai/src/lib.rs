//! ABOUTME: Vision provider abstraction with capability registry, adapters, and cost tracking
//! ABOUTME: Defines the VisionProvider trait every AI backend implements

use async_trait::async_trait;
use bytes::Bytes;
use el_vision::{ClipHandle, Frame};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod capability;
pub mod cost;
pub mod error;
pub mod prompt;
pub mod response;
pub mod stub;

#[cfg(feature = "ai_online")]
pub mod claude;
#[cfg(feature = "ai_online")]
pub mod gemini;
#[cfg(feature = "ai_online")]
mod http;
#[cfg(feature = "ai_online")]
pub mod openai;

pub use capability::{ProviderCapability, ProviderCapabilityRegistry};
pub use cost::{CostTracker, RateTableCostTracker};
pub use error::{ProviderError, Result};
pub use prompt::{build_prompt, PromptContext};
pub use response::{parse_reply, ParsedReply};
pub use stub::StubProvider;

#[cfg(feature = "ai_online")]
pub use claude::ClaudeProvider;
#[cfg(feature = "ai_online")]
pub use gemini::GeminiProvider;
#[cfg(feature = "ai_online")]
pub use openai::OpenAiProvider;

/// How an event is presented to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Only the first frame
    SingleFrame,
    /// The sampled frame sequence
    #[default]
    MultiFrame,
    /// The clip itself, uploaded to a video-capable provider
    VideoNative,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleFrame => "single_frame",
            Self::MultiFrame => "multi_frame",
            Self::VideoNative => "video_native",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = el_core::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_frame" | "single" => Ok(Self::SingleFrame),
            "multi_frame" | "multi" => Ok(Self::MultiFrame),
            "video_native" | "video" => Ok(Self::VideoNative),
            other => Err(el_core::Error::Validation(format!(
                "Unknown analysis mode: {}",
                other
            ))),
        }
    }
}

/// A frame encoded for upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Bytes,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub fn jpeg(data: Bytes) -> Self {
        Self {
            data,
            mime_type: "image/jpeg",
        }
    }

    /// JPEG-encode a frame, downscaling to `max_dimension`
    pub fn from_frame(frame: &Frame, quality: u8, max_dimension: u32) -> el_core::Result<Self> {
        Ok(Self::jpeg(frame.encode_jpeg(quality, max_dimension)?))
    }
}

/// A clip loaded for native video analysis
#[derive(Debug, Clone)]
pub struct VideoPayload {
    pub data: Bytes,
    pub mime_type: String,
    pub duration: Option<Duration>,
}

impl VideoPayload {
    /// Read the clip file from disk
    pub async fn load(clip: &ClipHandle) -> Result<Self> {
        let data = tokio::fs::read(clip.path()).await?;
        debug!(clip = %clip.path().display(), bytes = data.len(), "Loaded clip for upload");
        Ok(Self {
            data: Bytes::from(data),
            mime_type: clip.mime_type.clone(),
            duration: clip.duration,
        })
    }

    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / (1024.0 * 1024.0)
    }
}

/// What a provider returned for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub description: String,
    /// Self-reported confidence, 0-100
    pub confidence: Option<u8>,
    pub tokens_used: Option<u32>,
    /// Model that produced the reply, when the API reports it
    pub model: Option<String>,
}

impl ProviderResponse {
    /// Build a response from raw model text plus reported usage
    pub fn from_reply_text(text: &str, tokens_used: Option<u32>, model: Option<String>) -> Result<Self> {
        let parsed = parse_reply(text)?;
        Ok(Self {
            description: parsed.description,
            confidence: parsed.confidence,
            tokens_used,
            model,
        })
    }
}

/// Connection settings for one provider
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint, e.g. for a proxy
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// A vision AI backend
///
/// Methods a provider cannot serve keep their default, which reports
/// [`ProviderError::Unsupported`]. The capability registry decides which
/// methods the orchestrator calls; the defaults are a backstop.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Registry key, e.g. "openai"
    fn name(&self) -> &str;

    /// Describe a single image
    async fn analyze_single(&self, image: &EncodedImage, prompt: &str) -> Result<ProviderResponse>;

    /// Describe a chronological image sequence
    async fn analyze_multi(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        let _ = (images, prompt);
        Err(ProviderError::Unsupported {
            provider: self.name().to_string(),
            method: "analyze_multi",
        })
    }

    /// Describe an uploaded clip
    async fn analyze_video(&self, video: &VideoPayload, prompt: &str) -> Result<ProviderResponse> {
        let _ = (video, prompt);
        Err(ProviderError::Unsupported {
            provider: self.name().to_string(),
            method: "analyze_video",
        })
    }

    /// Cheap readiness check; no network round trip
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Create the adapter for a named provider
///
/// Without the `ai_online` feature every name resolves to a stub so the
/// pipeline still runs offline.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn VisionProvider>> {
    #[cfg(feature = "ai_online")]
    {
        let provider: Arc<dyn VisionProvider> = match name {
            "openai" => Arc::new(OpenAiProvider::openai(config)?),
            "grok" => Arc::new(OpenAiProvider::grok(config)?),
            "claude" => Arc::new(ClaudeProvider::new(config)?),
            "gemini" => Arc::new(GeminiProvider::new(config)?),
            "stub" => Arc::new(StubProvider::new("stub")),
            other => {
                return Err(ProviderError::NotConfigured(format!(
                    "no adapter named {}",
                    other
                )))
            }
        };
        info!(provider = name, "Created vision provider");
        Ok(provider)
    }

    #[cfg(not(feature = "ai_online"))]
    {
        let _ = config;
        warn!(
            provider = name,
            "Online providers not compiled in (ai_online feature disabled), using stub"
        );
        Ok(Arc::new(StubProvider::new(name)))
    }
}

/// Create adapters for every name in `order` that has settings
///
/// Providers that fail to initialise are logged and left out; the
/// orchestrator treats them as not configured.
pub fn create_providers<'a, I>(order: I, configs: &std::collections::HashMap<String, ProviderConfig>) -> Vec<Arc<dyn VisionProvider>>
where
    I: IntoIterator<Item = &'a String>,
{
    let empty = ProviderConfig::default();
    order
        .into_iter()
        .filter_map(|name| {
            let config = configs.get(name).unwrap_or(&empty);
            match create_provider(name, config) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!(provider = %name, error = %e, "Skipping provider");
                    None
                }
            }
        })
        .collect()
}
