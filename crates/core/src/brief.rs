//! Campaign brief data model.
//!
//! A [`CampaignBrief`] can only be obtained through validation, either from a
//! [`BriefSpec`] (the wire schema) or directly from JSON, so every brief the
//! pipeline sees satisfies the schema constraints.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};

const MESSAGE_MIN_CHARS: usize = 5;
const MESSAGE_MAX_CHARS: usize = 200;
const MAX_PRODUCTS: usize = 10;
const NAME_MAX_CHARS: usize = 100;
const DESCRIPTION_MIN_CHARS: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 500;
const MAX_BRAND_COLORS: usize = 5;

/// Creative direction for hero generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeBrief {
    pub setting: String,
    pub mood: String,
    pub key_visual_elements: Vec<String>,
}

/// Brand styling guidelines for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandStyle {
    pub color_palette: Vec<String>,
    pub visual_style: String,
    #[serde(default = "default_photography_style")]
    pub photography_style: String,
}

fn default_photography_style() -> String {
    "Commercial product photography".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub creative_brief: CreativeBrief,
    pub brand_style: BrandStyle,
}

/// Unvalidated brief as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefSpec {
    pub campaign_id: String,
    pub region: String,
    pub target_audience: String,
    pub campaign_message: String,
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
    pub products: Vec<Product>,
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string()]
}

/// A validated, immutable campaign brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BriefSpec", into = "BriefSpec")]
pub struct CampaignBrief {
    campaign_id: String,
    region: String,
    target_audience: String,
    campaign_message: String,
    locales: Vec<String>,
    products: Vec<Product>,
}

impl CampaignBrief {
    pub fn from_json(json: &str) -> CampaignResult<Self> {
        let spec: BriefSpec = serde_json::from_str(json)
            .map_err(|e| CampaignError::Validation(format!("invalid brief JSON: {e}")))?;
        Self::try_from(spec)
    }

    pub fn from_file(path: &Path) -> CampaignResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn target_audience(&self) -> &str {
        &self.target_audience
    }

    pub fn campaign_message(&self) -> &str {
        &self.campaign_message
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

impl TryFrom<BriefSpec> for CampaignBrief {
    type Error = CampaignError;

    fn try_from(spec: BriefSpec) -> Result<Self, Self::Error> {
        validate_token("campaign_id", &spec.campaign_id)?;
        require_non_empty("region", &spec.region)?;
        require_non_empty("target_audience", &spec.target_audience)?;

        let message_len = spec.campaign_message.chars().count();
        if !(MESSAGE_MIN_CHARS..=MESSAGE_MAX_CHARS).contains(&message_len) {
            return Err(CampaignError::Validation(format!(
                "campaign_message must be {MESSAGE_MIN_CHARS}-{MESSAGE_MAX_CHARS} characters, got {message_len}"
            )));
        }

        if spec.locales.is_empty() {
            return Err(CampaignError::Validation(
                "at least one locale is required".to_string(),
            ));
        }
        let mut seen_locales = HashSet::new();
        for locale in &spec.locales {
            require_non_empty("locale", locale)?;
            if !seen_locales.insert(locale.as_str()) {
                return Err(CampaignError::Validation(format!(
                    "duplicate locale '{locale}'"
                )));
            }
        }

        if spec.products.is_empty() || spec.products.len() > MAX_PRODUCTS {
            return Err(CampaignError::Validation(format!(
                "a brief needs 1-{MAX_PRODUCTS} products, got {}",
                spec.products.len()
            )));
        }
        let mut seen_products = HashSet::new();
        for product in &spec.products {
            validate_product(product)?;
            if !seen_products.insert(product.id.as_str()) {
                return Err(CampaignError::Validation(format!(
                    "duplicate product id '{}'",
                    product.id
                )));
            }
        }

        Ok(Self {
            campaign_id: spec.campaign_id,
            region: spec.region,
            target_audience: spec.target_audience,
            campaign_message: spec.campaign_message,
            locales: spec.locales,
            products: spec.products,
        })
    }
}

impl From<CampaignBrief> for BriefSpec {
    fn from(brief: CampaignBrief) -> Self {
        Self {
            campaign_id: brief.campaign_id,
            region: brief.region,
            target_audience: brief.target_audience,
            campaign_message: brief.campaign_message,
            locales: brief.locales,
            products: brief.products,
        }
    }
}

fn validate_product(product: &Product) -> CampaignResult<()> {
    validate_token("product id", &product.id)?;

    let name_len = product.name.chars().count();
    if name_len == 0 || name_len > NAME_MAX_CHARS {
        return Err(CampaignError::Validation(format!(
            "product '{}': name must be 1-{NAME_MAX_CHARS} characters",
            product.id
        )));
    }

    let description_len = product.description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
        return Err(CampaignError::Validation(format!(
            "product '{}': description must be {DESCRIPTION_MIN_CHARS}-{DESCRIPTION_MAX_CHARS} characters, got {description_len}",
            product.id
        )));
    }

    if product.creative_brief.key_visual_elements.is_empty() {
        return Err(CampaignError::Validation(format!(
            "product '{}': at least one key visual element is required",
            product.id
        )));
    }

    let palette = &product.brand_style.color_palette;
    if palette.is_empty() || palette.len() > MAX_BRAND_COLORS {
        return Err(CampaignError::Validation(format!(
            "product '{}': color palette needs 1-{MAX_BRAND_COLORS} colors, got {}",
            product.id,
            palette.len()
        )));
    }
    if let Some(bad) = palette.iter().find(|c| !is_hex_color(c)) {
        return Err(CampaignError::Validation(format!(
            "product '{}': '{bad}' is not a hex color",
            product.id
        )));
    }

    Ok(())
}

/// Identifiers must match `^[a-z0-9_]+$` so they are safe as path segments.
fn validate_token(field: &str, value: &str) -> CampaignResult<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CampaignError::Validation(format!(
            "{field} '{value}' must match ^[a-z0-9_]+$"
        )))
    }
}

fn require_non_empty(field: &str, value: &str) -> CampaignResult<()> {
    if value.trim().is_empty() {
        Err(CampaignError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
