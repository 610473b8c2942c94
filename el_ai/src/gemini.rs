//! ABOUTME: Google Gemini generateContent adapter with image and native video support
//! ABOUTME: Frames and clips are sent as inline base64 data parts after the prompt

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{base64_encode, build_client, endpoint, require_api_key, send_json};
use crate::{
    EncodedImage, ProviderConfig, ProviderError, ProviderResponse, Result, VideoPayload,
    VisionProvider,
};

const BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Google Gemini adapter
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.base_url.clone().unwrap_or_else(|| BASE_URL.to_string());
        let model = config.model.clone().unwrap_or_else(|| MODEL.to_string());
        debug!(base_url = %base_url, model = %model, "Created Gemini provider");

        Ok(Self {
            client: build_client()?,
            config: config.clone(),
            base_url,
            model,
        })
    }

    async fn generate(&self, media: Vec<InlineData>, prompt: &str) -> Result<ProviderResponse> {
        let api_key = require_api_key("gemini", &self.config)?;

        let mut parts = Vec::with_capacity(media.len() + 1);
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
        parts.extend(media.into_iter().map(|inline_data| Part::Inline { inline_data }));

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: self.config.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
        };

        let url = endpoint(
            &self.base_url,
            &format!("/v1beta/models/{}:generateContent", self.model),
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&body);

        let response: GenerateResponse = send_json("gemini", request).await?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ProviderError::MalformedResponse("no candidates in reply".to_string()))?;

        ProviderResponse::from_reply_text(
            &text,
            response.usage_metadata.and_then(|u| u.total_token_count),
            response.model_version.or_else(|| Some(self.model.clone())),
        )
    }

    fn image_part(image: &EncodedImage) -> InlineData {
        InlineData {
            mime_type: image.mime_type.to_string(),
            data: base64_encode(&image.data),
        }
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze_single(&self, image: &EncodedImage, prompt: &str) -> Result<ProviderResponse> {
        self.generate(vec![Self::image_part(image)], prompt).await
    }

    async fn analyze_multi(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        if images.is_empty() {
            return Err(ProviderError::InvalidInput("no frames to analyze".to_string()));
        }
        self.generate(images.iter().map(Self::image_part).collect(), prompt)
            .await
    }

    async fn analyze_video(&self, video: &VideoPayload, prompt: &str) -> Result<ProviderResponse> {
        if video.data.is_empty() {
            return Err(ProviderError::InvalidInput("clip is empty".to_string()));
        }
        debug!(
            bytes = video.data.len(),
            mime_type = %video.mime_type,
            "Uploading clip inline to Gemini"
        );
        let part = InlineData {
            mime_type: video.mime_type.clone(),
            data: base64_encode(&video.data),
        };
        self.generate(vec![part], prompt).await
    }

    async fn health_check(&self) -> Result<()> {
        require_api_key("gemini", &self.config).map(|_| ())
    }
}
