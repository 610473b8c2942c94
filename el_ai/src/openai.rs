//! ABOUTME: OpenAI chat-completions vision adapter, also used for xAI Grok's compatible API
//! ABOUTME: Sends frames as base64 data URLs and reads the reply and token usage

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, data_url, endpoint, require_api_key, send_json};
use crate::{EncodedImage, ProviderConfig, ProviderError, ProviderResponse, Result, VisionProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const GROK_BASE_URL: &str = "https://api.x.ai/v1";
const GROK_MODEL: &str = "grok-2-vision-1212";
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Adapter for any OpenAI-compatible chat-completions endpoint
pub struct OpenAiProvider {
    name: &'static str,
    client: Client,
    config: ProviderConfig,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContent {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

impl OpenAiProvider {
    /// OpenAI proper
    pub fn openai(config: &ProviderConfig) -> Result<Self> {
        Self::compatible("openai", config, OPENAI_BASE_URL, OPENAI_MODEL)
    }

    /// xAI Grok through its OpenAI-compatible endpoint
    pub fn grok(config: &ProviderConfig) -> Result<Self> {
        Self::compatible("grok", config, GROK_BASE_URL, GROK_MODEL)
    }

    fn compatible(
        name: &'static str,
        config: &ProviderConfig,
        default_base_url: &str,
        default_model: &str,
    ) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_string());

        debug!(provider = name, base_url = %base_url, model = %model, "Created chat-completions provider");

        Ok(Self {
            name,
            client: build_client()?,
            config: config.clone(),
            base_url,
            model,
        })
    }

    async fn complete(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        let api_key = require_api_key(self.name, &self.config)?;

        let mut content = Vec::with_capacity(images.len() + 1);
        content.push(ChatContent::Text {
            text: prompt.to_string(),
        });
        content.extend(images.iter().map(|image| ChatContent::ImageUrl {
            image_url: ImageUrl {
                url: data_url(image),
                detail: if images.len() > 1 { "low" } else { "auto" },
            },
        }));

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.config.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: 0.2,
        };

        debug!(provider = self.name, images = images.len(), "Sending chat-completions request");

        let request = self
            .client
            .post(endpoint(&self.base_url, "/chat/completions"))
            .bearer_auth(api_key)
            .json(&body);

        let response: ChatResponse = send_json(self.name, request).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in reply".to_string()))?;

        ProviderResponse::from_reply_text(
            &text,
            response.usage.map(|u| u.total_tokens),
            response.model.or_else(|| Some(self.model.clone())),
        )
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn analyze_single(&self, image: &EncodedImage, prompt: &str) -> Result<ProviderResponse> {
        self.complete(std::slice::from_ref(image), prompt).await
    }

    async fn analyze_multi(&self, images: &[EncodedImage], prompt: &str) -> Result<ProviderResponse> {
        if images.is_empty() {
            return Err(ProviderError::InvalidInput("no frames to analyze".to_string()));
        }
        self.complete(images, prompt).await
    }

    async fn health_check(&self) -> Result<()> {
        require_api_key(self.name, &self.config).map(|_| ())
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
        EncodedImage::jpeg(Bytes::from_static(b"fake_jpeg_data"))
    }

    fn config_for(server: &MockServer) -> ProviderConfig {
        ProviderConfig::with_api_key("test-key").base_url(server.uri())
    }

    fn reply(content: &str) -> serde_json::Value {
        json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 40, "total_tokens": 940}
        })
    }

    #[tokio::test]
    async fn test_multi_frame_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                r#"{"description": "A courier walked up and left a package at the door.", "confidence": 87}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::openai(&config_for(&server)).unwrap();
        let response = provider
            .analyze_multi(&[image(), image(), image()], "describe")
            .await
            .unwrap();

        assert_eq!(response.description, "A courier walked up and left a package at the door.");
        assert_eq!(response.confidence, Some(87));
        assert_eq!(response.tokens_used, Some(940));
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024"));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("A person waved.")))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::openai(&config_for(&server)).unwrap();
        provider.analyze_multi(&[image(), image()], "the prompt").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "the prompt");
        assert_eq!(content[1]["type"], "image_url");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::openai(&config_for(&server)).unwrap();
        let err = provider.analyze_single(&image(), "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(ref body) if body == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::openai(&config_for(&server)).unwrap();
        let err = provider.analyze_single(&image(), "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::openai(&config_for(&server)).unwrap();
        let err = provider.analyze_single(&image(), "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("x")))
            .expect(0)
            .mount(&server)
            .await;

        let config = ProviderConfig::default().base_url(server.uri());
        let provider = OpenAiProvider::openai(&config).unwrap();
        assert!(matches!(
            provider.analyze_single(&image(), "p").await,
            Err(ProviderError::NotConfigured(_))
        ));
        assert!(provider.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_grok_defaults() {
        let provider = OpenAiProvider::grok(&ProviderConfig::with_api_key("xai-key")).unwrap();
        assert_eq!(provider.name(), "grok");
        assert_eq!(provider.base_url, "https://api.x.ai/v1");
        assert_eq!(provider.model, "grok-2-vision-1212");
        assert!(provider.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_no_video_support() {
        let provider = OpenAiProvider::openai(&ProviderConfig::with_api_key("k")).unwrap();
        let video = crate::VideoPayload {
            data: Bytes::from_static(b"mp4"),
            mime_type: "video/mp4".to_string(),
            duration: None,
        };
        assert!(matches!(
            provider.analyze_video(&video, "p").await,
            Err(ProviderError::Unsupported { .. })
        ));
    }
}
