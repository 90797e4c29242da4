//! Minimal client for the OpenAI-compatible image and chat endpoints.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServiceError;

const USER_AGENT: &str = concat!("campaign-assets/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u8,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// One chat-completion call: a system prompt and a user prompt.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the model for a single JSON object.
    pub json_mode: bool,
}

impl OpenAiClient {
    pub fn new(api_key: Option<&str>, api_base: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ServiceError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Generate one image and return its encoded bytes.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        size: &str,
        quality: &str,
    ) -> Result<Vec<u8>, ServiceError> {
        let request = ImageGenerationRequest {
            model,
            prompt,
            size,
            quality,
            n: 1,
            response_format: "b64_json",
        };
        let response = self
            .http
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: ImageGenerationResponse = check_status(response).await?.json().await?;

        let image = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Malformed("image response has no data".to_string()))?;

        match (image.b64_json, image.url) {
            (Some(b64), _) => base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .map_err(|e| ServiceError::Malformed(format!("invalid base64 image: {e}"))),
            (None, Some(url)) => {
                debug!(%url, "downloading generated image");
                let response = self.http.get(&url).send().await?;
                Ok(check_status(response).await?.bytes().await?.to_vec())
            }
            (None, None) => Err(ServiceError::Malformed("image response has neither b64_json nor url".to_string())),
        }
    }

    /// Run a chat completion and return the first choice's content.
    pub async fn chat(&self, model: &str, request: ChatRequest<'_>) -> Result<String, ServiceError> {
        let body = ChatCompletionRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatCompletionResponse = check_status(response).await?.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| ServiceError::Malformed("chat response has no content".to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Http {
        status: status.as_u16(),
        body,
    })
}
