use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::openai::{ChatRequest, OpenAiClient};
use crate::retry::RetryPolicy;

/// Chat-style language model. Implementations own the model choice.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<String, ServiceError>;
}

pub struct OpenAiChatModel {
    client: Arc<OpenAiClient>,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiChatModel {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            client,
            model: model.into(),
            retry: RetryPolicy::with_max_retries(max_retries),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<String, ServiceError> {
        let (client, model) = (self.client.as_ref(), self.model.as_str());
        self.retry
            .run("chat_completion", move |_| client.chat(model, request))
            .await
    }
}
