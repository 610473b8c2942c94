//! ABOUTME: Per-provider capability records and the read-only registry built at startup
//! ABOUTME: Answers which analysis modes a provider supports and whether a clip fits its limits

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::AnalysisMode;

/// What a single provider can do and the limits it imposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapability {
    pub name: String,
    pub supports_single_frame: bool,
    pub supports_multi_frame: bool,
    pub supports_native_video: bool,
    /// Maximum images accepted in one multi-frame request
    pub max_frames: usize,
    pub max_video_duration_s: Option<u64>,
    pub max_video_size_mb: Option<f64>,
}

impl ProviderCapability {
    /// Image-only provider accepting up to `max_frames` frames
    pub fn images_only(name: impl Into<String>, max_frames: usize) -> Self {
        Self {
            name: name.into(),
            supports_single_frame: true,
            supports_multi_frame: true,
            supports_native_video: false,
            max_frames,
            max_video_duration_s: None,
            max_video_size_mb: None,
        }
    }

    pub fn with_native_video(mut self, max_duration_s: u64, max_size_mb: f64) -> Self {
        self.supports_native_video = true;
        self.max_video_duration_s = Some(max_duration_s);
        self.max_video_size_mb = Some(max_size_mb);
        self
    }

    pub fn supports(&self, mode: AnalysisMode) -> bool {
        match mode {
            AnalysisMode::SingleFrame => self.supports_single_frame,
            AnalysisMode::MultiFrame => self.supports_multi_frame,
            AnalysisMode::VideoNative => self.supports_native_video,
        }
    }

    /// Reject records that could never be called
    pub fn validate(&self) -> Result<(), String> {
        if (self.supports_single_frame || self.supports_multi_frame) && self.max_frames == 0 {
            return Err(format!(
                "{} accepts image analysis but max_frames is 0",
                self.name
            ));
        }
        Ok(())
    }

    /// Check a clip against this provider's video limits
    ///
    /// Unknown duration or size passes; the provider will reject it if needed.
    pub fn check_clip(&self, duration: Option<Duration>, size_mb: Option<f64>) -> Result<(), String> {
        if let (Some(limit), Some(duration)) = (self.max_video_duration_s, duration) {
            if duration.as_secs_f64() > limit as f64 {
                return Err(format!(
                    "clip is {:.1}s, {} accepts at most {}s",
                    duration.as_secs_f64(),
                    self.name,
                    limit
                ));
            }
        }
        if let (Some(limit), Some(size_mb)) = (self.max_video_size_mb, size_mb) {
            if size_mb > limit {
                return Err(format!(
                    "clip is {:.1}MB, {} accepts at most {}MB",
                    size_mb, self.name, limit
                ));
            }
        }
        Ok(())
    }
}

/// Capability table keyed by provider name
#[derive(Debug, Clone, Default)]
pub struct ProviderCapabilityRegistry {
    capabilities: HashMap<String, ProviderCapability>,
}

impl ProviderCapabilityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in provider table
    pub fn with_defaults() -> Self {
        Self::new()
            .with_capability(ProviderCapability::images_only("openai", 10))
            .with_capability(ProviderCapability::images_only("grok", 10))
            .with_capability(ProviderCapability::images_only("claude", 20))
            .with_capability(ProviderCapability::images_only("gemini", 16).with_native_video(60, 20.0))
            .with_capability(ProviderCapability::images_only("stub", 20).with_native_video(300, 100.0))
    }

    /// Add or replace a record
    pub fn with_capability(mut self, capability: ProviderCapability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: ProviderCapability) {
        self.capabilities.insert(capability.name.clone(), capability);
    }

    pub fn get(&self, name: &str) -> Option<&ProviderCapability> {
        self.capabilities.get(name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Providers from `order` that support `mode`, keeping the given order
    pub fn capable_of<'a>(&self, mode: AnalysisMode, order: &'a [String]) -> Vec<&'a str> {
        order
            .iter()
            .filter(|name| self.get(name).is_some_and(|c| c.supports(mode)))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_default_table() {
        let registry = ProviderCapabilityRegistry::with_defaults();

        let openai = registry.get("openai").unwrap();
        assert!(openai.supports(AnalysisMode::MultiFrame));
        assert!(!openai.supports(AnalysisMode::VideoNative));
        assert_eq!(openai.max_frames, 10);

        let claude = registry.get("claude").unwrap();
        assert_eq!(claude.max_frames, 20);

        let gemini = registry.get("gemini").unwrap();
        assert!(gemini.supports(AnalysisMode::VideoNative));
        assert_eq!(gemini.max_video_duration_s, Some(60));
        assert_eq!(gemini.max_video_size_mb, Some(20.0));

        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_capable_of_preserves_order() {
        let registry = ProviderCapabilityRegistry::with_defaults();
        let chain = order(&["claude", "gemini", "missing", "openai"]);

        assert_eq!(
            registry.capable_of(AnalysisMode::MultiFrame, &chain),
            vec!["claude", "gemini", "openai"]
        );
        assert_eq!(registry.capable_of(AnalysisMode::VideoNative, &chain), vec!["gemini"]);
    }

    #[test]
    fn test_override_replaces_record() {
        let registry = ProviderCapabilityRegistry::with_defaults()
            .with_capability(ProviderCapability::images_only("openai", 4));
        assert_eq!(registry.get("openai").unwrap().max_frames, 4);
    }

    #[test]
    fn test_validate_rejects_zero_frame_limit() {
        assert!(ProviderCapability::images_only("claude", 1).validate().is_ok());

        let err = ProviderCapability::images_only("claude", 0).validate().unwrap_err();
        assert!(err.contains("max_frames"));

        // Video-only records never send frames
        let mut video_only = ProviderCapability::images_only("clipper", 0).with_native_video(60, 20.0);
        video_only.supports_single_frame = false;
        video_only.supports_multi_frame = false;
        assert!(video_only.validate().is_ok());
    }

    #[test]
    fn test_clip_limits() {
        let gemini = ProviderCapability::images_only("gemini", 16).with_native_video(60, 20.0);

        assert!(gemini.check_clip(Some(Duration::from_secs(30)), Some(5.0)).is_ok());
        assert!(gemini.check_clip(None, None).is_ok());

        let too_long = gemini.check_clip(Some(Duration::from_secs(90)), Some(5.0));
        assert!(too_long.unwrap_err().contains("at most 60s"));

        let too_big = gemini.check_clip(Some(Duration::from_secs(10)), Some(25.0));
        assert!(too_big.unwrap_err().contains("at most 20MB"));
    }
}
