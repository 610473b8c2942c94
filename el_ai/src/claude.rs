//! ABOUTME: Anthropic Messages API adapter for single and multi-frame analysis
//! ABOUTME: Frames are sent as base64 image blocks ahead of the text prompt

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{base64_encode, build_client, endpoint, require_api_key, send_json};
use crate::{EncodedImage, ProviderConfig, ProviderError, ProviderResponse, Result, VisionProvider};

const BASE_URL: &str = "https://api.anthropic.com";
const MODEL: &str = "claude-3-5-sonnet-latest";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Anthropic Claude adapter
pub struct ClaudeProvider {
    client: Client,
    config: ProviderConfig,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ClaudeProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.base_url.clone().unwrap_or_else(|| BASE_URL.to_string());
        let model = config.model.clone().unwrap_or_else(|| MODEL.to_string());
        debug!(base_url = %base_url, model = %model, "Created Claude provider");

        Ok(Self {
            client: build_client()?,
            config: config.clone(),
            base_url,
            model,
        })
    }

    async fn send(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        let api_key = require_api_key("claude", &self.config)?;

        let mut content: Vec<ContentBlock> = images
            .iter()
            .map(|image| ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: image.mime_type,
                    data: base64_encode(&image.data),
                },
            })
            .collect();
        content.push(ContentBlock::Text {
            text: prompt.to_string(),
        });

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.config.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: 0.2,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        debug!(images = images.len(), "Sending Claude messages request");

        let request = self
            .client
            .post(endpoint(&self.base_url, "/v1/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response: MessagesResponse = send_json("claude", request).await?;
        let text: String = response
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        ProviderResponse::from_reply_text(
            &text,
            response.usage.map(|u| u.input_tokens + u.output_tokens),
            response.model.or_else(|| Some(self.model.clone())),
        )
    }
}

#[async_trait]
impl VisionProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn analyze_single(&self, image: &EncodedImage, prompt: &str) -> Result<ProviderResponse> {
        self.send(std::slice::from_ref(image), prompt).await
    }

    async fn analyze_multi(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        if images.is_empty() {
            return Err(ProviderError::InvalidInput("no frames to analyze".to_string()));
        }
        self.send(images, prompt).await
    }

    async fn health_check(&self) -> Result<()> {
        require_api_key("claude", &self.config).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image() -> EncodedImage {
        EncodedImage::jpeg(Bytes::from_static(b"jpeg-bytes"))
    }

    #[tokio::test]
    async fn test_messages_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "anthropic-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-3-5-sonnet-20241022",
                "content": [{"type": "text", "text": "```json\n{\"description\": \"A woman unlocked the side gate and walked into the yard.\", \"confidence\": 78}\n```"}],
                "usage": {"input_tokens": 1200, "output_tokens": 35}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProviderConfig::with_api_key("anthropic-key").base_url(server.uri());
        let provider = ClaudeProvider::new(&config).unwrap();
        let response = provider.analyze_multi(&[image(), image()], "prompt").await.unwrap();

        assert_eq!(
            response.description,
            "A woman unlocked the side gate and walked into the yard."
        );
        assert_eq!(response.confidence, Some(78));
        assert_eq!(response.tokens_used, Some(1235));

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[2]["type"], "text");
    }

    #[tokio::test]
    async fn test_forbidden_is_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let config = ProviderConfig::with_api_key("k").base_url(server.uri());
        let provider = ClaudeProvider::new(&config).unwrap();
        assert!(matches!(
            provider.analyze_single(&image(), "p").await,
            Err(ProviderError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let config = ProviderConfig::with_api_key("k").base_url(server.uri());
        let provider = ClaudeProvider::new(&config).unwrap();
        let err = provider.analyze_single(&image(), "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 529, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_text_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [],
                "usage": {"input_tokens": 10, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig::with_api_key("k").base_url(server.uri());
        let provider = ClaudeProvider::new(&config).unwrap();
        assert!(matches!(
            provider.analyze_single(&image(), "p").await,
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
