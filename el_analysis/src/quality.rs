//! ABOUTME: Heuristic quality checks for AI-generated event descriptions
//! ABOUTME: Flags low provider confidence and vague or generic wording, first matching rule wins

use el_config::QualityConfig;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::QualityVerdict;

/// Judges whether a description is trustworthy enough to show as-is
pub trait QualityEvaluator: Send + Sync {
    fn evaluate(&self, description: &str, ai_confidence: Option<u8>) -> QualityVerdict;
}

/// Words skipped when looking for the subject after "motion detected"
const FILLER_WORDS: &[&str] = &[
    "of", "by", "from", "near", "at", "on", "in", "a", "an", "the", "some", "two", "three",
];

/// Rule-based evaluator built from [`QualityConfig`]
#[derive(Debug, Clone)]
pub struct ResponseQualityEvaluator {
    confidence_threshold: u8,
    min_word_count: usize,
    phrases: Vec<(String, Regex)>,
    motion_detected: Option<Regex>,
    templates: Vec<String>,
    concrete_subjects: HashSet<String>,
}

impl ResponseQualityEvaluator {
    pub fn new(config: &QualityConfig) -> Self {
        let phrases = config
            .vague_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .filter_map(|phrase| match phrase_regex(&phrase) {
                Ok(re) => Some((phrase, re)),
                Err(e) => {
                    warn!(phrase = %phrase, error = %e, "Skipping vague phrase that does not compile");
                    None
                }
            })
            .collect();

        // Captures whatever follows up to the end of the sentence
        let motion_detected = Regex::new(r"(?i)\bmotion detected\b([^.!?]*)").ok();

        Self {
            confidence_threshold: config.confidence_threshold,
            min_word_count: config.min_word_count,
            phrases,
            motion_detected,
            templates: config.generic_templates.iter().map(|t| normalize(t)).collect(),
            concrete_subjects: config
                .concrete_subjects
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
        }
    }

    /// Reason the description reads as vague, if any
    ///
    /// Rules run in order: configured phrases, bare "motion detected",
    /// generic templates, then the minimum word count.
    pub fn vague_reason(&self, description: &str) -> Option<String> {
        if let Some((phrase, _)) = self.phrases.iter().find(|(_, re)| re.is_match(description)) {
            return Some(format!("Contains vague phrase: '{}'", phrase));
        }

        if self.has_bare_motion_detected(description) {
            return Some("Contains vague phrase: 'motion detected'".to_string());
        }

        let normalized = normalize(description);
        if self.templates.iter().any(|t| *t == normalized) {
            return Some(format!("Generic template response: '{}'", description.trim()));
        }

        let words = description.split_whitespace().count();
        if words < self.min_word_count {
            return Some(format!(
                "Too short: {} words, expected at least {}",
                words, self.min_word_count
            ));
        }

        None
    }

    /// "motion detected" not followed by something concrete
    fn has_bare_motion_detected(&self, description: &str) -> bool {
        let Some(re) = &self.motion_detected else {
            return false;
        };

        re.captures_iter(description).any(|caps| {
            let rest = caps.get(1).map_or("", |m| m.as_str());
            let subject = rest
                .split(|c: char| !c.is_alphanumeric() && c != '\'')
                .map(str::to_lowercase)
                .find(|word| !word.is_empty() && !FILLER_WORDS.contains(&word.as_str()));

            match subject {
                Some(word) => !self.is_concrete(&word),
                None => true,
            }
        })
    }

    fn is_concrete(&self, word: &str) -> bool {
        self.concrete_subjects.contains(word)
            || word
                .strip_suffix('s')
                .is_some_and(|singular| self.concrete_subjects.contains(singular))
    }
}

impl Default for ResponseQualityEvaluator {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}

impl QualityEvaluator for ResponseQualityEvaluator {
    fn evaluate(&self, description: &str, ai_confidence: Option<u8>) -> QualityVerdict {
        let below_threshold = ai_confidence.is_some_and(|c| c < self.confidence_threshold);
        let vague_reason = self.vague_reason(description);

        debug!(
            ?ai_confidence,
            below_threshold,
            vague = vague_reason.is_some(),
            "Evaluated description quality"
        );

        QualityVerdict {
            low_confidence: below_threshold || vague_reason.is_some(),
            vague_reason,
        }
    }
}

fn phrase_regex(phrase: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
