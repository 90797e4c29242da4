//! Hero image generation: prompt construction, pricing and the service trait
//! the resolver calls through.

use std::sync::Arc;

use async_trait::async_trait;
use campaign_core::config::{GeneratorConfig, HeroImageConfig};
use campaign_core::{CampaignBrief, Product};
use image::DynamicImage;
use tracing::info;

use crate::error::ServiceError;
use crate::openai::OpenAiClient;
use crate::retry::RetryPolicy;

const DESCRIPTION_LIMIT: usize = 180;

/// A freshly generated hero and what it cost.
#[derive(Debug, Clone)]
pub struct GeneratedHero {
    pub image: DynamicImage,
    pub cost: f64,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_hero(&self, product: &Product, brief: &CampaignBrief) -> Result<GeneratedHero, ServiceError>;
}

/// Price of one generated image for a quality tier. Unknown tiers are billed
/// at the `hd` rate.
pub fn cost_per_image(quality: &str) -> f64 {
    match quality {
        "standard" => 0.04,
        _ => 0.08,
    }
}

/// Photoreal product prompt composed for safe center crops to every
/// supported aspect ratio.
pub fn build_hero_prompt(product: &Product, brief: &CampaignBrief) -> String {
    let creative = &product.creative_brief;
    let setting = creative.setting.to_lowercase();
    let mood = creative.mood.to_lowercase();

    let lighting = if setting.contains("studio") || setting.contains("minimal") {
        "professional studio lighting with softbox, subtle rim light, minimal shadows, f/2.8"
    } else if setting.contains("natural") || setting.contains("eco") {
        "natural window light at golden hour, soft ambient fill, organic shadows, f/4"
    } else if mood.contains("dramatic") || mood.contains("bold") {
        "dramatic side lighting with Profoto strobes, depth and dimension, f/2.8"
    } else {
        "natural diffused daylight through large windows, soft shadows, f/3.5"
    };

    let description: String = product.description.chars().take(DESCRIPTION_LIMIT).collect();
    let elements = first_n(&creative.key_visual_elements, 3);
    let colors = first_n(&product.brand_style.color_palette, 3);

    format!(
        "PHOTOREALISTIC PRODUCT PHOTOGRAPHY - Commercial advertising shoot\n\
         \n\
         SUBJECT: {name}\n\
         {description}\n\
         \n\
         CAMERA SETUP:\n\
         - Professional full-frame camera, 85mm prime lens for natural perspective\n\
         - {lighting}\n\
         - {photography}\n\
         \n\
         COMPOSITION (CRITICAL):\n\
         - Product perfectly centered in frame, occupying 60-70% of image\n\
         - Generous negative space on all sides for safe cropping to 1:1, 9:16, and 16:9\n\
         - Clean, uncluttered {setting}\n\
         - Include: {elements}\n\
         \n\
         STYLING & MOOD:\n\
         - {mood} atmosphere\n\
         - Brand colors: {colors}\n\
         - Visual style: {style}\n\
         - Target: {audience}\n\
         \n\
         REALISM DIRECTIVES:\n\
         - Natural depth of field, authentic textures and materials\n\
         - No CGI appearance, no oversaturation, no generic stock photo look",
        name = product.name,
        photography = product.brand_style.photography_style,
        setting = creative.setting,
        mood = creative.mood,
        style = product.brand_style.visual_style,
        audience = brief.target_audience(),
    )
}

fn first_n(items: &[String], n: usize) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// DALL-E style generator over [`OpenAiClient`].
pub struct OpenAiImageGenerator {
    client: Arc<OpenAiClient>,
    model: String,
    size: String,
    quality: String,
    retry: RetryPolicy,
}

impl OpenAiImageGenerator {
    pub fn new(client: Arc<OpenAiClient>, generator: &GeneratorConfig, hero: &HeroImageConfig) -> Self {
        Self {
            client,
            model: generator.model.clone(),
            size: hero.size.clone(),
            quality: hero.quality.clone(),
            retry: RetryPolicy::with_max_retries(generator.max_retries),
        }
    }

    fn api_quality(&self) -> &str {
        if self.quality == "hd" {
            "hd"
        } else {
            "standard"
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate_hero(&self, product: &Product, brief: &CampaignBrief) -> Result<GeneratedHero, ServiceError> {
        let prompt = build_hero_prompt(product, brief);
        let (client, prompt_ref) = (self.client.as_ref(), prompt.as_str());
        let (model, size, quality) = (self.model.as_str(), self.size.as_str(), self.api_quality());
        let bytes = self
            .retry
            .run("image_generation", move |_| client.generate_image(model, prompt_ref, size, quality))
            .await?;

        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| ServiceError::Malformed(format!("image decode task failed: {e}")))?
            .map_err(|e| ServiceError::Malformed(format!("undecodable image payload: {e}")))?;

        let cost = cost_per_image(&self.quality);
        metrics::counter!("generator.images").increment(1);
        info!(product_id = %product.id, model = %self.model, cost, "hero generated");
        Ok(GeneratedHero { image, cost })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(setting: &str, mood: &str) -> CampaignBrief {
        let json = serde_json::json!({
            "campaign_id": "summer_launch",
            "region": "US",
            "target_audience": "Young professionals 25-35",
            "campaign_message": "Stay fresh all summer",
            "products": [{
                "id": "cold_brew",
                "name": "Cold Brew",
                "description": "A smooth cold brew coffee ".repeat(10),
                "category": "beverage",
                "creative_brief": {
                    "setting": setting,
                    "mood": mood,
                    "key_visual_elements": ["ice", "glass", "beans", "mint"]
                },
                "brand_style": {
                    "color_palette": ["#112233", "#445566", "#778899", "#AABBCC"],
                    "visual_style": "clean modern"
                }
            }]
        });
        CampaignBrief::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_cost_table() {
        assert_eq!(cost_per_image("standard"), 0.04);
        assert_eq!(cost_per_image("hd"), 0.08);
        assert_eq!(cost_per_image("ultra"), 0.08);
    }

    #[test]
    fn test_prompt_lighting_keywords() {
        let cases = [
            ("Minimal studio", "calm", "softbox"),
            ("Natural kitchen", "calm", "golden hour"),
            ("City street", "Bold and energetic", "Profoto"),
            ("City street", "calm", "diffused daylight"),
        ];
        for (setting, mood, expected) in cases {
            let b = brief(setting, mood);
            let prompt = build_hero_prompt(&b.products()[0], &b);
            assert!(prompt.contains(expected), "{setting}/{mood} should use {expected}");
        }
    }

    #[test]
    fn test_prompt_truncates_and_limits_lists() {
        let b = brief("studio", "calm");
        let product = &b.products()[0];
        let prompt = build_hero_prompt(product, &b);

        let truncated: String = product.description.chars().take(180).collect();
        assert!(prompt.contains(&truncated));
        assert!(!prompt.contains(&product.description));
        assert!(prompt.contains("Include: ice, glass, beans\n"));
        assert!(prompt.contains("Brand colors: #112233, #445566, #778899\n"));
        assert!(prompt.contains("Target: Young professionals 25-35"));
        assert!(prompt.contains("1:1, 9:16, and 16:9"));
    }
}
