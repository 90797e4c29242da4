//! External service integrations for the asset pipeline: the image
//! generation and language-model clients, with the rate limiting and retry
//! policy that guard them, plus the pre-flight validator and localizer built
//! on top.

pub mod error;
pub mod generator;
pub mod llm;
pub mod localizer;
pub mod openai;
pub mod preflight;
pub mod rate_limit;
pub mod retry;

pub use error::ServiceError;
pub use generator::{build_hero_prompt, cost_per_image, GeneratedHero, ImageGenerator, OpenAiImageGenerator};
pub use llm::{LanguageModel, OpenAiChatModel};
pub use localizer::{LlmTranslator, Localizer, Translator};
pub use openai::{ChatRequest, OpenAiClient};
pub use preflight::{build_validator, BriefValidator, DisabledValidator, LlmBriefValidator};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
