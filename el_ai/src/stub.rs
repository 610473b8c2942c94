//! ABOUTME: Stub vision provider that returns canned descriptions for testing
//! ABOUTME: No network calls, deterministic responses for CI/development

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::{EncodedImage, ProviderResponse, Result, VideoPayload, VisionProvider};

/// Offline provider supporting every analysis method
pub struct StubProvider {
    name: String,
    latency: Duration,
    fixed_reply: Option<(String, Option<u8>)>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl StubProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(provider = %name, "Creating stub vision provider");
        Self {
            name,
            latency: Duration::ZERO,
            fixed_reply: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Simulate network latency on every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Always answer with this description and confidence
    pub fn with_reply(mut self, description: impl Into<String>, confidence: Option<u8>) -> Self {
        self.fixed_reply = Some((description.into(), confidence));
        self
    }

    /// Number of analyze calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt from the most recent call
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }

    /// Deterministic description picked from the payload size
    fn canned_description(units: usize, total_bytes: usize) -> &'static str {
        match total_bytes % 4 {
            0 => "A person in a dark jacket walked up the driveway, stopped at the front door, and left a package on the step.",
            1 => "A silver sedan pulled into the driveway, parked beside the garage, and the driver walked toward the house.",
            2 => "A dog ran across the front lawn from the sidewalk and disappeared behind the hedge near the gate.",
            _ if units > 1 => "A cyclist rode along the sidewalk past the mailbox and continued out of view to the left.",
            _ => "A person standing at the front door rang the doorbell while holding a clipboard.",
        }
    }

    async fn respond(&self, units: usize, total_bytes: usize, prompt: &str) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (description, confidence) = match &self.fixed_reply {
            Some((description, confidence)) => (description.clone(), *confidence),
            None => (Self::canned_description(units, total_bytes).to_string(), Some(80)),
        };

        debug!(provider = %self.name, units, "Stub provider responding");

        Ok(ProviderResponse {
            // Rough figure in the same ballpark as a real vision call
            tokens_used: Some((prompt.len() / 4 + units * 85) as u32),
            description,
            confidence,
            model: Some("stub".to_string()),
        })
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new("stub")
    }
}

#[async_trait]
impl VisionProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze_single(&self, image: &EncodedImage, prompt: &str) -> Result<ProviderResponse> {
        self.respond(1, image.data.len(), prompt).await
    }

    async fn analyze_multi(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        let total = images.iter().map(|i| i.data.len()).sum();
        self.respond(images.len(), total, prompt).await
    }

    async fn analyze_video(&self, video: &VideoPayload, prompt: &str) -> Result<ProviderResponse> {
        self.respond(1, video.data.len(), prompt).await
    }
}
