//! ABOUTME: Builds the analysis prompt sent to every vision provider
//! ABOUTME: Built-in narrative instructions come first; operator text is only ever appended

use chrono::{DateTime, Utc};

use crate::AnalysisMode;

const MULTI_FRAME_INSTRUCTIONS: &str = "You are reviewing footage from a home security camera. \
The attached images are frames from a single event, in chronological order. \
Treat them as a sequence and describe what happened from the first frame to the last: \
who or what appeared, what they did, and where they went. \
Use specific action verbs (walked, carried, parked, delivered, opened) and mention \
clothing, vehicles, animals, or objects that identify the subject. \
Do not describe each frame separately and do not speculate beyond what is visible.";

const SINGLE_FRAME_INSTRUCTIONS: &str = "You are reviewing a still image from a home security camera. \
Describe who or what is in the scene and what they are doing. \
Use specific action verbs and mention clothing, vehicles, animals, or objects that identify the subject. \
Do not speculate beyond what is visible.";

const VIDEO_INSTRUCTIONS: &str = "You are reviewing a video clip from a home security camera. \
Describe what happened over the course of the clip: who or what appeared, what they did, \
and where they went. Use specific action verbs and mention clothing, vehicles, animals, \
or objects that identify the subject. Do not speculate beyond what is visible.";

const RESPONSE_FORMAT: &str = "Reply with a single JSON object and nothing else: \
{\"description\": \"<one to three sentences>\", \"confidence\": <integer 0-100>}. \
The confidence is how certain you are that the description is accurate.";

/// Everything the prompt needs to know about one event
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub mode: AnalysisMode,
    pub frame_count: usize,
    pub camera_name: &'a str,
    pub timestamp: DateTime<Utc>,
    pub detected_objects: &'a [String],
    pub transcript: Option<&'a str>,
    pub custom_prompt: Option<&'a str>,
}

impl<'a> PromptContext<'a> {
    pub fn new(mode: AnalysisMode, camera_name: &'a str, timestamp: DateTime<Utc>) -> Self {
        Self {
            mode,
            frame_count: 0,
            camera_name,
            timestamp,
            detected_objects: &[],
            transcript: None,
            custom_prompt: None,
        }
    }
}

/// The fixed instruction block for a mode
pub fn base_instructions(mode: AnalysisMode) -> &'static str {
    match mode {
        AnalysisMode::SingleFrame => SINGLE_FRAME_INSTRUCTIONS,
        AnalysisMode::MultiFrame => MULTI_FRAME_INSTRUCTIONS,
        AnalysisMode::VideoNative => VIDEO_INSTRUCTIONS,
    }
}

/// Assemble the full prompt text
///
/// Order: instructions, audio transcript, event context, reply format, then
/// any operator-supplied text. Blank custom prompts are ignored.
pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let mut sections: Vec<String> = vec![base_instructions(ctx.mode).to_string()];

    if let Some(transcript) = ctx.transcript.map(str::trim).filter(|t| !t.is_empty()) {
        sections.push(format!(
            "Audio transcript from the clip (may be incomplete):\n\"{}\"",
            transcript
        ));
    }

    let mut context = format!(
        "Camera: {}\nTime: {}",
        ctx.camera_name,
        ctx.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if ctx.mode == AnalysisMode::MultiFrame && ctx.frame_count > 0 {
        context.push_str(&format!("\nFrames: {}", ctx.frame_count));
    }
    if !ctx.detected_objects.is_empty() {
        context.push_str(&format!(
            "\nObjects reported by the camera: {}",
            ctx.detected_objects.join(", ")
        ));
    }
    sections.push(context);

    sections.push(RESPONSE_FORMAT.to_string());

    if let Some(custom) = ctx.custom_prompt.map(str::trim).filter(|c| !c.is_empty()) {
        sections.push(format!("Additional instructions:\n{}", custom));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 18, 5, 9).unwrap()
    }

    #[test]
    fn test_custom_prompt_appended_after_instructions() {
        let mut ctx = PromptContext::new(AnalysisMode::MultiFrame, "Front Door", ts());
        ctx.custom_prompt = Some("Ignore mail carriers");
        let prompt = build_prompt(&ctx);

        let builtin = prompt.find("chronological order").unwrap();
        let custom = prompt.find("Ignore mail carriers").unwrap();
        assert!(builtin < custom);
        assert!(prompt.ends_with("Ignore mail carriers"));
    }

    #[test]
    fn test_context_lines() {
        let objects = vec!["person".to_string(), "package".to_string()];
        let mut ctx = PromptContext::new(AnalysisMode::MultiFrame, "Driveway", ts());
        ctx.frame_count = 8;
        ctx.detected_objects = &objects;
        let prompt = build_prompt(&ctx);

        assert!(prompt.contains("Camera: Driveway"));
        assert!(prompt.contains("Time: 2026-03-14 18:05:09 UTC"));
        assert!(prompt.contains("Frames: 8"));
        assert!(prompt.contains("Objects reported by the camera: person, package"));
        assert!(prompt.contains("\"confidence\""));
    }

    #[test]
    fn test_transcript_precedes_context() {
        let mut ctx = PromptContext::new(AnalysisMode::VideoNative, "Backyard", ts());
        ctx.transcript = Some("  hello, anyone home?  ");
        let prompt = build_prompt(&ctx);

        let transcript = prompt.find("\"hello, anyone home?\"").unwrap();
        let camera = prompt.find("Camera: Backyard").unwrap();
        assert!(transcript < camera);
        assert!(prompt.starts_with(VIDEO_INSTRUCTIONS));
    }

    #[test]
    fn test_blank_optional_sections_skipped() {
        let mut ctx = PromptContext::new(AnalysisMode::SingleFrame, "Garage", ts());
        ctx.transcript = Some("   ");
        ctx.custom_prompt = Some("");
        let prompt = build_prompt(&ctx);

        assert!(!prompt.contains("Audio transcript"));
        assert!(!prompt.contains("Additional instructions"));
        assert!(!prompt.contains("Frames:"));
        assert!(prompt.starts_with(SINGLE_FRAME_INSTRUCTIONS));
    }
}
