//! ABOUTME: Shared error type for the event analysis workspace
//! ABOUTME: Provider-level failures live in el_ai; this covers everything that crosses crates

/// Core error type for eventlens
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External error: {0}")]
    External(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Whether this error came from cancellation rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::Validation("target_count must be >= 1".to_string()).to_string(),
            "Validation error: target_count must be >= 1"
        );
        assert_eq!(Error::Timeout(1500).to_string(), "Timed out after 1500 ms");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::NotFound("clip".to_string()).is_cancelled());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing clip");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
