//! ABOUTME: Core types, errors, IDs, and tracing utilities
//! ABOUTME: Foundation crate used by all other eventlens components

pub mod error;
pub mod id;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use id::Id;
pub use time::MonotonicTimer;

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::fixed_event_ulid;

    #[test]
    fn test_cross_crate_usage() {
        let id: Id = fixed_event_ulid().parse().unwrap();
        assert_eq!(id.to_string(), fixed_event_ulid());
    }
}
