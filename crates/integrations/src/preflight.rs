//! Pre-flight brief validation, run once per campaign before anything is
//! generated. The language-model validator fails closed: if the service
//! cannot give a verdict the brief is treated as rejected.

use std::sync::Arc;

use async_trait::async_trait;
use campaign_core::config::GovernanceConfig;
use campaign_core::{CampaignBrief, ValidationResult};
use tracing::{info, warn};

use crate::llm::LanguageModel;
use crate::openai::ChatRequest;

const SYSTEM_PROMPT: &str =
    "You are an advertising compliance expert. Validate campaign briefs for image generation.";

#[async_trait]
pub trait BriefValidator: Send + Sync {
    async fn validate(&self, brief: &CampaignBrief) -> ValidationResult;
}

/// Used when language-model validation is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledValidator;

#[async_trait]
impl BriefValidator for DisabledValidator {
    async fn validate(&self, _brief: &CampaignBrief) -> ValidationResult {
        ValidationResult {
            warnings: vec!["LLM validation disabled".to_string()],
            ..ValidationResult::pass()
        }
    }
}

pub struct LlmBriefValidator {
    llm: Arc<dyn LanguageModel>,
    prohibited_categories: Vec<String>,
    blocking: bool,
}

impl LlmBriefValidator {
    pub fn new(llm: Arc<dyn LanguageModel>, governance: &GovernanceConfig) -> Self {
        Self {
            llm,
            prohibited_categories: governance.prohibited_categories.clone(),
            blocking: governance.validation_blocking,
        }
    }

    /// Interpret the model's JSON verdict. In blocking mode any reported
    /// error fails the result regardless of the model's own `passed` flag.
    fn interpret(&self, raw: &str) -> ValidationResult {
        match serde_json::from_str::<ValidationResult>(raw) {
            Ok(mut result) => {
                if self.blocking && !result.errors.is_empty() {
                    result.passed = false;
                }
                result
            }
            Err(e) => ValidationResult::fail(format!("LLM validation failed: unparseable verdict ({e})")),
        }
    }
}

#[async_trait]
impl BriefValidator for LlmBriefValidator {
    async fn validate(&self, brief: &CampaignBrief) -> ValidationResult {
        let prompt = build_validation_prompt(brief, &self.prohibited_categories);
        let request = ChatRequest {
            system: SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.1,
            max_tokens: None,
            json_mode: true,
        };

        let result = match self.llm.chat(request).await {
            Ok(raw) => self.interpret(&raw),
            Err(e) => {
                warn!(campaign_id = brief.campaign_id(), error = %e, "pre-flight validation service failed");
                ValidationResult::fail(format!("LLM validation failed: {e}"))
            }
        };
        info!(
            campaign_id = brief.campaign_id(),
            passed = result.passed,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "pre-flight validation complete"
        );
        result
    }
}

/// Build the validator for the configured governance settings.
pub fn build_validator(governance: &GovernanceConfig, llm: Option<Arc<dyn LanguageModel>>) -> Arc<dyn BriefValidator> {
    match llm {
        Some(llm) if governance.llm_validation_enabled => Arc::new(LlmBriefValidator::new(llm, governance)),
        _ => Arc::new(DisabledValidator),
    }
}

pub fn build_validation_prompt(brief: &CampaignBrief, prohibited_categories: &[String]) -> String {
    let products = brief
        .products()
        .iter()
        .map(|p| {
            format!(
                "- {}: {}\n  Setting: {}\n  Mood: {}\n  Style: {}",
                p.name, p.description, p.creative_brief.setting, p.creative_brief.mood, p.brand_style.visual_style
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Validate this advertising campaign brief for image generation quality:\n\n\
         Campaign: {campaign}\n\
         Message: {message}\n\
         Target Audience: {audience}\n\
         Region: {region}\n\n\
         Products ({count}):\n{products}\n\n\
         Validate for:\n\
         1. Brand alignment - Does message match professional brand voice?\n\
         2. Prohibited content - Check for: {prohibited}\n\
         3. Completeness - Are all required fields present and clear?\n\
         4. Image generation quality - Will this produce good commercial imagery?\n\n\
         Respond in JSON:\n\
         {{\"passed\": true/false, \"errors\": [], \"warnings\": [], \"suggestions\": []}}\n\n\
         Errors = blocking issues that prevent generation. Warnings = proceed with caution. Suggestions = improvements.",
        campaign = brief.campaign_id(),
        message = brief.campaign_message(),
        audience = brief.target_audience(),
        region = brief.region(),
        count = brief.products().len(),
        prohibited = prohibited_categories.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    struct CannedModel(Result<&'static str, u16>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn chat(&self, request: ChatRequest<'_>) -> Result<String, ServiceError> {
            assert!(request.json_mode);
            match self.0 {
                Ok(body) => Ok(body.to_string()),
                Err(status) => Err(ServiceError::Http {
                    status,
                    body: "nope".to_string(),
                }),
            }
        }
    }

    fn brief() -> CampaignBrief {
        CampaignBrief::from_json(
            r##"{
                "campaign_id": "spring_sale",
                "region": "EU",
                "target_audience": "Families",
                "campaign_message": "Spring into savings",
                "products": [{
                    "id": "kettle",
                    "name": "Kettle",
                    "description": "A fast electric kettle",
                    "category": "home",
                    "creative_brief": {"setting": "kitchen", "mood": "warm", "key_visual_elements": ["steam"]},
                    "brand_style": {"color_palette": ["#FFAA00"], "visual_style": "cozy"}
                }]
            }"##,
        )
        .unwrap()
    }

    fn validator(model: CannedModel, blocking: bool) -> LlmBriefValidator {
        let governance = GovernanceConfig {
            validation_blocking: blocking,
            ..GovernanceConfig::default()
        };
        LlmBriefValidator::new(Arc::new(model), &governance)
    }

    #[tokio::test]
    async fn test_clean_verdict_passes() {
        let v = validator(
            CannedModel(Ok(r#"{"passed": true, "errors": [], "warnings": ["short message"], "suggestions": ["add urgency"]}"#)),
            true,
        );
        let result = v.validate(&brief()).await;
        assert!(result.passed);
        assert_eq!(result.warnings, vec!["short message"]);
        assert_eq!(result.suggestions, vec!["add urgency"]);
    }

    #[tokio::test]
    async fn test_blocking_mode_fails_on_errors() {
        let body = r#"{"passed": true, "errors": ["mentions violence"]}"#;
        assert!(!validator(CannedModel(Ok(body)), true).validate(&brief()).await.passed);
        assert!(validator(CannedModel(Ok(body)), false).validate(&brief()).await.passed);
    }

    #[tokio::test]
    async fn test_service_failure_fails_closed() {
        let result = validator(CannedModel(Err(503)), false).validate(&brief()).await;
        assert!(!result.passed);
        assert!(result.errors[0].starts_with("LLM validation failed"));

        let result = validator(CannedModel(Ok("not json")), false).validate(&brief()).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_disabled_validator_passes_with_warning() {
        let governance = GovernanceConfig {
            llm_validation_enabled: false,
            ..GovernanceConfig::default()
        };
        let v = build_validator(&governance, Some(Arc::new(CannedModel(Err(500)))));
        let result = v.validate(&brief()).await;
        assert!(result.passed);
        assert_eq!(result.warnings, vec!["LLM validation disabled"]);
    }

    #[test]
    fn test_prompt_lists_categories_and_products() {
        let prompt = build_validation_prompt(&brief(), &["violence".to_string(), "hate speech".to_string()]);
        assert!(prompt.contains("Check for: violence, hate speech"));
        assert!(prompt.contains("- Kettle: A fast electric kettle"));
        assert!(prompt.contains("Products (1):"));
    }
}
