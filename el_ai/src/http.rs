//! ABOUTME: Shared HTTP plumbing for the online provider adapters
//! ABOUTME: Client construction, JSON round trips with status mapping, and base64 helpers

use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{EncodedImage, ProviderConfig, ProviderError, Result};

/// Longest error body kept on an HTTP failure
const MAX_ERROR_BODY: usize = 512;

/// Build the HTTP client; request deadlines are applied by the caller
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("eventlens/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))
}

/// The configured API key, or `NotConfigured`
pub(crate) fn require_api_key<'a>(provider: &str, config: &'a ProviderConfig) -> Result<&'a str> {
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::NotConfigured(format!("{} API key not configured", provider)))
}

/// Send a request and decode a JSON body, mapping failures by status
pub(crate) async fn send_json<T>(provider: &str, request: RequestBuilder) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let mut body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(provider, status = status.as_u16(), "Provider returned error status");
        return Err(ProviderError::from_status(status.as_u16(), body));
    }

    let text = response.text().await?;
    debug!(provider, bytes = text.len(), "Provider response received");
    serde_json::from_str::<T>(&text).map_err(|e| {
        ProviderError::MalformedResponse(format!("Failed to parse {} response: {}", provider, e))
    })
}

pub(crate) fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// `data:` URL for an encoded image
pub(crate) fn data_url(image: &EncodedImage) -> String {
    format!("data:{};base64,{}", image.mime_type, base64_encode(&image.data))
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
