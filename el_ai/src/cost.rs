//! ABOUTME: Cost estimation for provider calls, used for accounting and logs only
//! ABOUTME: The rate-table tracker prices tokens with a blended per-1K rate per provider

use std::collections::HashMap;

/// Estimates the monetary cost of a provider call
pub trait CostTracker: Send + Sync {
    /// Estimated USD cost, or `None` when the provider has no known rate
    fn estimate(&self, provider: &str, tokens_used: u32) -> Option<f64>;
}

/// Blended USD price per 1,000 tokens, keyed by provider name
#[derive(Debug, Clone, Default)]
pub struct RateTableCostTracker {
    rates_per_1k: HashMap<String, f64>,
}

impl RateTableCostTracker {
    pub fn new(rates_per_1k: HashMap<String, f64>) -> Self {
        Self { rates_per_1k }
    }

    /// Rough list prices for the default models of each built-in provider
    pub fn with_defaults() -> Self {
        let rates = [
            ("openai", 0.0006),
            ("grok", 0.002),
            ("claude", 0.003),
            ("gemini", 0.0002),
            ("stub", 0.0),
        ];
        Self::new(
            rates
                .into_iter()
                .map(|(name, rate)| (name.to_string(), rate))
                .collect(),
        )
    }

    pub fn with_rate(mut self, provider: impl Into<String>, rate_per_1k: f64) -> Self {
        self.rates_per_1k.insert(provider.into(), rate_per_1k);
        self
    }

    pub fn rate(&self, provider: &str) -> Option<f64> {
        self.rates_per_1k.get(provider).copied()
    }
}

impl CostTracker for RateTableCostTracker {
    fn estimate(&self, provider: &str, tokens_used: u32) -> Option<f64> {
        self.rate(provider)
            .map(|rate| tokens_used as f64 / 1000.0 * rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_known_provider() {
        let tracker = RateTableCostTracker::default().with_rate("openai", 0.5);
        let cost = tracker.estimate("openai", 2500).unwrap();
        assert!((cost - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_provider() {
        let tracker = RateTableCostTracker::with_defaults();
        assert_eq!(tracker.estimate("mystery", 1000), None);
        assert_eq!(tracker.estimate("stub", 1000), Some(0.0));
    }

    #[test]
    fn test_override_default_rate() {
        let tracker = RateTableCostTracker::with_defaults().with_rate("claude", 0.01);
        assert_eq!(tracker.rate("claude"), Some(0.01));
    }
}
