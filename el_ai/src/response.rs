//! ABOUTME: Parses model replies into a description and optional confidence
//! ABOUTME: Accepts fenced or bare JSON and falls back to treating the reply as plain text

use serde::Deserialize;
use serde_json::Value;

use crate::{ProviderError, Result};

/// Description and confidence pulled out of a model reply
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub description: String,
    pub confidence: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct JsonReply {
    description: Option<String>,
    confidence: Option<Value>,
}

/// Parse the text a provider returned
///
/// An empty description, whether from JSON or plain text, is a
/// [`ProviderError::MalformedResponse`].
pub fn parse_reply(text: &str) -> Result<ParsedReply> {
    let body = strip_code_fence(text.trim());

    if let Some(reply) = parse_json_object(body) {
        let description = reply
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        if description.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "reply JSON has no description".to_string(),
            ));
        }
        return Ok(ParsedReply {
            description,
            confidence: reply.confidence.as_ref().and_then(confidence_from_value),
        });
    }

    let description = body.trim();
    if description.is_empty() {
        return Err(ProviderError::MalformedResponse("empty reply".to_string()));
    }

    Ok(ParsedReply {
        description: description.to_string(),
        confidence: None,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json_object(text: &str) -> Option<JsonReply> {
    if let Ok(reply) = serde_json::from_str::<JsonReply>(text) {
        return Some(reply);
    }
    // Models sometimes wrap the object in prose
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<JsonReply>(&text[start..=end]).ok()
}

fn confidence_from_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    // A 0-1 fraction is rescaled to a percentage
    let scaled = if raw > 0.0 && raw < 1.0 { raw * 100.0 } else { raw };
    Some(scaled.round().clamp(0.0, 100.0) as u8)
}
