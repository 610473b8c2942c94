//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles sampling, analysis, quality, provider, and cost settings from env and files

use config::{Config as ConfigBuilder, Environment, File};
use el_ai::{AnalysisMode, ProviderCapability, ProviderCapabilityRegistry, ProviderConfig, RateTableCostTracker};
use el_core::{Error, Result};
use el_vision::{SamplerConfig, SamplingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Frame counts the settings UI offers
pub const ALLOWED_FRAME_COUNTS: [usize; 4] = [5, 10, 15, 20];

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub sampling: SamplingSettings,
    #[validate(nested)]
    pub analysis: AnalysisSettings,
    #[validate(nested)]
    pub quality: QualityConfig,
    /// Connection settings keyed by provider name
    pub providers: HashMap<String, ProviderConfig>,
    #[validate(nested)]
    pub costs: CostsConfig,
}

/// Frame sampling settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SamplingSettings {
    #[validate(custom(function = "validate_frame_count"))]
    pub target_frame_count: usize,
    pub strategy: SamplingStrategy,
    #[validate(range(max = 60000))]
    pub min_spacing_ms: u64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub histogram_similarity_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub ssim_threshold: f64,
    #[validate(range(min = 1, max = 64))]
    pub histogram_bins_per_channel: u32,
    #[validate(range(min = 8, max = 4096))]
    pub ssim_max_dimension: u32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        let sampler = SamplerConfig::default();
        Self {
            target_frame_count: 10,
            strategy: SamplingStrategy::Uniform,
            min_spacing_ms: el_vision::DEFAULT_MIN_SPACING_MS,
            histogram_similarity_threshold: sampler.histogram_similarity_threshold,
            ssim_threshold: sampler.ssim_threshold,
            histogram_bins_per_channel: sampler.histogram_bins_per_channel,
            ssim_max_dimension: sampler.ssim_max_dimension,
        }
    }
}

impl SamplingSettings {
    /// Thresholds in the shape the sampler takes
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            histogram_similarity_threshold: self.histogram_similarity_threshold,
            ssim_threshold: self.ssim_threshold,
            histogram_bins_per_channel: self.histogram_bins_per_channel,
            ssim_max_dimension: self.ssim_max_dimension,
        }
    }
}

fn validate_frame_count(count: usize) -> std::result::Result<(), ValidationError> {
    if ALLOWED_FRAME_COUNTS.contains(&count) {
        Ok(())
    } else {
        let mut err = ValidationError::new("frame_count");
        err.message = Some(format!("target_frame_count must be one of {:?}", ALLOWED_FRAME_COUNTS).into());
        Err(err)
    }
}

/// Provider routing and request shaping
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct AnalysisSettings {
    pub mode: AnalysisMode,
    /// Fallback chain, tried first to last
    #[validate(length(min = 1), custom(function = "validate_provider_order"))]
    pub provider_order: Vec<String>,
    #[validate(range(min = 1, max = 300))]
    pub single_frame_timeout_secs: u64,
    #[validate(range(min = 1, max = 300))]
    pub multi_frame_timeout_secs: u64,
    #[validate(range(min = 1, max = 900))]
    pub video_timeout_secs: u64,
    /// Hard deadline for a whole chain walk
    pub overall_deadline_secs: Option<u64>,
    pub include_audio_transcript: bool,
    #[validate(length(max = 2000))]
    pub custom_prompt: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub jpeg_quality: u8,
    #[validate(range(min = 64, max = 4096))]
    pub max_image_dimension: u32,
    /// Replace built-in capability records by provider name
    #[validate(custom(function = "validate_capability_overrides"))]
    pub capability_overrides: Vec<ProviderCapability>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::MultiFrame,
            provider_order: ["openai", "grok", "claude", "gemini"]
                .into_iter()
                .map(String::from)
                .collect(),
            single_frame_timeout_secs: 5,
            multi_frame_timeout_secs: 10,
            video_timeout_secs: 30,
            overall_deadline_secs: None,
            include_audio_transcript: false,
            custom_prompt: None,
            jpeg_quality: 85,
            max_image_dimension: 1024,
            capability_overrides: Vec::new(),
        }
    }
}

impl AnalysisSettings {
    /// Per-call timeout for a mode
    pub fn timeout_for(&self, mode: AnalysisMode) -> Duration {
        Duration::from_secs(match mode {
            AnalysisMode::SingleFrame => self.single_frame_timeout_secs,
            AnalysisMode::MultiFrame => self.multi_frame_timeout_secs,
            AnalysisMode::VideoNative => self.video_timeout_secs,
        })
    }

    pub fn overall_deadline(&self) -> Option<Duration> {
        self.overall_deadline_secs.map(Duration::from_secs)
    }

    /// Built-in capability table with the configured overrides applied
    pub fn capability_registry(&self) -> ProviderCapabilityRegistry {
        self.capability_overrides
            .iter()
            .cloned()
            .fold(ProviderCapabilityRegistry::with_defaults(), |registry, capability| {
                registry.with_capability(capability)
            })
    }
}

/// Vagueness heuristics for returned descriptions
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct QualityConfig {
    /// Reported confidence below this is low confidence
    #[validate(range(max = 100))]
    pub confidence_threshold: u8,
    #[validate(range(min = 1, max = 200))]
    pub min_word_count: usize,
    /// Hedging phrases, matched case-insensitively on word boundaries
    pub vague_phrases: Vec<String>,
    /// Whole-description templates, matched case-insensitively
    pub generic_templates: Vec<String>,
    /// Words that make "motion detected" specific when they follow it
    pub concrete_subjects: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            confidence_threshold: 50,
            min_word_count: 10,
            vague_phrases: strings(&[
                "appears to be",
                "possibly",
                "unclear",
                "cannot determine",
                "can't determine",
                "unable to determine",
                "might be",
                "could be",
                "seems like",
                "seems to be",
                "hard to tell",
                "something",
            ]),
            generic_templates: strings(&[
                "activity detected.",
                "movement observed.",
                "something moved.",
                "motion detected.",
                "person detected.",
            ]),
            concrete_subjects: strings(&[
                "person", "people", "man", "woman", "child", "children", "vehicle", "car",
                "truck", "van", "bicycle", "cyclist", "dog", "cat", "animal", "package",
                "courier", "delivery",
            ]),
        }
    }
}

/// Cost accounting rates
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct CostsConfig {
    /// USD per 1K tokens by provider, layered over the built-in table
    #[validate(custom(function = "validate_rates"))]
    pub rates_per_1k: HashMap<String, f64>,
}

impl CostsConfig {
    pub fn tracker(&self) -> RateTableCostTracker {
        self.rates_per_1k
            .iter()
            .fold(RateTableCostTracker::with_defaults(), |tracker, (name, rate)| {
                tracker.with_rate(name.clone(), *rate)
            })
    }
}

#[allow(clippy::ptr_arg)]
fn validate_provider_order(order: &Vec<String>) -> std::result::Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    match order.iter().find(|name| !seen.insert(name.as_str())) {
        None => Ok(()),
        Some(name) => {
            let mut err = ValidationError::new("duplicate_provider");
            err.message = Some(format!("provider_order lists {} more than once", name).into());
            Err(err)
        }
    }
}

#[allow(clippy::ptr_arg)]
fn validate_capability_overrides(
    overrides: &Vec<ProviderCapability>,
) -> std::result::Result<(), ValidationError> {
    match overrides.iter().find_map(|c| c.validate().err()) {
        None => Ok(()),
        Some(message) => {
            let mut err = ValidationError::new("capability");
            err.message = Some(message.into());
            Err(err)
        }
    }
}

fn validate_rates(rates: &HashMap<String, f64>) -> std::result::Result<(), ValidationError> {
    if rates.values().all(|r| r.is_finite() && *r >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("negative_rate"))
    }
}

impl Config {
    /// Load configuration from defaults, an optional `eventlens.{toml,yaml,json}`
    /// in the working directory, and `EVENTLENS_*` environment variables
    pub fn load() -> Result<Self> {
        Self::build(Some(File::with_name("eventlens").required(false)))
    }

    /// Like [`Config::load`] but reading the given file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("Config file {}", path.display())));
        }
        Self::build(Some(File::from(path).required(true)))
    }

    fn build<S>(file: Option<S>) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let sampling = SamplingSettings::default();
        let analysis = AnalysisSettings::default();
        let quality = QualityConfig::default();

        let mut builder = ConfigBuilder::builder()
            .set_default("sampling.target_frame_count", sampling.target_frame_count as i64)?
            .set_default("sampling.strategy", sampling.strategy.as_str())?
            .set_default("sampling.min_spacing_ms", sampling.min_spacing_ms as i64)?
            .set_default(
                "sampling.histogram_similarity_threshold",
                sampling.histogram_similarity_threshold,
            )?
            .set_default("sampling.ssim_threshold", sampling.ssim_threshold)?
            .set_default(
                "sampling.histogram_bins_per_channel",
                sampling.histogram_bins_per_channel as i64,
            )?
            .set_default("sampling.ssim_max_dimension", sampling.ssim_max_dimension as i64)?
            .set_default("analysis.mode", analysis.mode.as_str())?
            .set_default(
                "analysis.single_frame_timeout_secs",
                analysis.single_frame_timeout_secs as i64,
            )?
            .set_default(
                "analysis.multi_frame_timeout_secs",
                analysis.multi_frame_timeout_secs as i64,
            )?
            .set_default("analysis.video_timeout_secs", analysis.video_timeout_secs as i64)?
            .set_default(
                "analysis.include_audio_transcript",
                analysis.include_audio_transcript,
            )?
            .set_default("analysis.jpeg_quality", analysis.jpeg_quality as i64)?
            .set_default("analysis.max_image_dimension", analysis.max_image_dimension as i64)?
            .set_default("quality.confidence_threshold", quality.confidence_threshold as i64)?
            .set_default("quality.min_word_count", quality.min_word_count as i64)?;

        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        // Environment variables have the highest priority:
        // EVENTLENS_SAMPLING__TARGET_FRAME_COUNT=15
        builder = builder.add_source(
            Environment::with_prefix("EVENTLENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("analysis.provider_order"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }

    /// Settings for one provider, empty when none were given
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}
