//! ABOUTME: Provider-level error type covering transport, auth, throttling, and parsing failures
//! ABOUTME: Every variant is a non-fatal provider failure that advances the fallback chain

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors a single vision provider call can produce
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} does not support {method}")]
    Unsupported {
        provider: String,
        method: &'static str,
    },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching variant
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited(body),
            _ => Self::Http { status, body },
        }
    }

    /// Whether retrying the same provider later could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short machine-friendly label for logs and attempt records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "unsupported",
            Self::Timeout(_) => "timeout",
            Self::Authentication(_) => "authentication",
            Self::RateLimited(_) => "rate_limited",
            Self::Http { .. } => "http",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NotConfigured(_) => "not_configured",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<el_core::Error> for ProviderError {
    fn from(err: el_core::Error) -> Self {
        match err {
            el_core::Error::Io(e) => Self::Io(e),
            el_core::Error::Timeout(ms) => Self::Timeout(Duration::from_millis(ms)),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

#[cfg(feature = "ai_online")]
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ProviderError::from_status(401, "bad key"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "forbidden"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(502, "bad gateway"),
            ProviderError::Http { status: 502, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ProviderError::from_status(503, "").is_retryable());
        assert!(!ProviderError::from_status(400, "").is_retryable());
        assert!(!ProviderError::Authentication("nope".to_string()).is_retryable());
        assert!(!ProviderError::MalformedResponse("{".to_string()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ProviderError::Unsupported {
            provider: "openai".to_string(),
            method: "analyze_video",
        };
        assert_eq!(err.to_string(), "openai does not support analyze_video");
        assert_eq!(err.kind(), "unsupported");
    }

    #[test]
    fn test_core_error_conversion() {
        let err: ProviderError = el_core::Error::Validation("bad frame".to_string()).into();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }
}
