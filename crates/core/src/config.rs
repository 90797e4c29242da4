use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CampaignError, CampaignResult};
use crate::types::AspectRatio;

/// Root application configuration. Loaded once at startup from an optional
/// config file and environment variables with the prefix `CAMPAIGN_ASSETS__`,
/// then passed by reference to every component constructor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub hero_image: HeroImageConfig,
    #[serde(default)]
    pub aspect_ratio_processing: AspectRatioConfig,
    #[serde(default)]
    pub text_overlay: TextOverlayConfig,
    #[serde(default)]
    pub brand: BrandConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub scalability: ScalabilityConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub post_processing: PostProcessingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub logs: LogsConfig,
}

// ─── Generator ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Maximum generation calls per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_generator_model() -> String {
    "dall-e-3".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit() -> u32 {
    45
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_generator_model(),
            max_retries: default_max_retries(),
            rate_limit: default_rate_limit(),
            api_key: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ─── Hero image ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct HeroImageConfig {
    #[serde(default = "default_hero_size")]
    pub size: String,
    #[serde(default = "default_hero_quality")]
    pub quality: String,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_hero_size() -> String {
    "1024x1024".to_string()
}

fn default_hero_quality() -> String {
    "hd".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HeroImageConfig {
    fn default() -> Self {
        Self {
            size: default_hero_size(),
            quality: default_hero_quality(),
            cache_enabled: true,
        }
    }
}

// ─── Aspect ratio processing ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AspectRatioConfig {
    #[serde(default = "default_crop_strategy")]
    pub crop_strategy: String,
    /// Encoder quality hint, kept for lossy output formats.
    #[serde(default = "default_output_quality")]
    pub quality: u8,
    #[serde(default = "default_square_size")]
    pub square: Dimensions,
    #[serde(default = "default_portrait_size")]
    pub portrait: Dimensions,
    #[serde(default = "default_landscape_size")]
    pub landscape: Dimensions,
}

fn default_crop_strategy() -> String {
    "center".to_string()
}

fn default_output_quality() -> u8 {
    95
}

fn default_square_size() -> Dimensions {
    Dimensions::new(1080, 1080)
}

fn default_portrait_size() -> Dimensions {
    Dimensions::new(1080, 1920)
}

fn default_landscape_size() -> Dimensions {
    Dimensions::new(1920, 1080)
}

impl Default for AspectRatioConfig {
    fn default() -> Self {
        Self {
            crop_strategy: default_crop_strategy(),
            quality: default_output_quality(),
            square: default_square_size(),
            portrait: default_portrait_size(),
            landscape: default_landscape_size(),
        }
    }
}

impl AspectRatioConfig {
    pub fn target_size(&self, ratio: AspectRatio) -> Dimensions {
        match ratio {
            AspectRatio::Square => self.square,
            AspectRatio::Vertical => self.portrait,
            AspectRatio::Horizontal => self.landscape,
        }
    }
}

// ─── Text overlay ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TextOverlayConfig {
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,
}

fn default_font() -> String {
    "assets/brand/Helvetica-Bold.ttf".to_string()
}

fn default_font_size() -> u32 {
    48
}

fn default_text_color() -> String {
    "#FFFFFF".to_string()
}

fn default_outline_color() -> String {
    "#000000".to_string()
}

fn default_outline_width() -> u32 {
    2
}

impl Default for TextOverlayConfig {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: default_font_size(),
            color: default_text_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
        }
    }
}

// ─── Brand ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandConfig {
    #[serde(default)]
    pub logo_position: LogoPosition,
    #[serde(default = "default_logo_opacity")]
    pub logo_opacity: f32,
    #[serde(default = "default_logo_scale")]
    pub logo_scale: f32,
    #[serde(default)]
    pub brand_colors: Vec<String>,
    /// Global brand logo checked by the compliance engine.
    #[serde(default = "default_logo_path")]
    pub logo_path: PathBuf,
    /// Root of campaign-scoped brand assets (`{assets_root}/{campaign_id}/logo.png`).
    #[serde(default = "default_brand_assets_root")]
    pub assets_root: PathBuf,
}

fn default_logo_opacity() -> f32 {
    0.9
}

fn default_logo_scale() -> f32 {
    0.1
}

fn default_logo_path() -> PathBuf {
    PathBuf::from("assets/brand/logo.png")
}

fn default_brand_assets_root() -> PathBuf {
    PathBuf::from("assets/brand")
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            logo_position: LogoPosition::default(),
            logo_opacity: default_logo_opacity(),
            logo_scale: default_logo_scale(),
            brand_colors: Vec::new(),
            logo_path: default_logo_path(),
            assets_root: default_brand_assets_root(),
        }
    }
}

// ─── Governance ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub prohibited_terms: Vec<String>,
    #[serde(default = "default_prohibited_categories")]
    pub prohibited_categories: Vec<String>,
    #[serde(default = "default_true")]
    pub legal_check_enabled: bool,
    #[serde(default = "default_true")]
    pub brand_check_enabled: bool,
    #[serde(default)]
    pub content_safety_enabled: bool,
    #[serde(default = "default_min_resolution")]
    pub min_resolution: u32,
    #[serde(default = "default_true")]
    pub llm_validation_enabled: bool,
    #[serde(default = "default_llm_validation_model")]
    pub llm_validation_model: String,
    #[serde(default = "default_true")]
    pub validation_blocking: bool,
}

fn default_prohibited_categories() -> Vec<String> {
    vec![
        "violence".to_string(),
        "hate speech".to_string(),
        "sexual content".to_string(),
    ]
}

fn default_min_resolution() -> u32 {
    1024
}

fn default_llm_validation_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            prohibited_terms: Vec::new(),
            prohibited_categories: default_prohibited_categories(),
            legal_check_enabled: true,
            brand_check_enabled: true,
            content_safety_enabled: false,
            min_resolution: default_min_resolution(),
            llm_validation_enabled: true,
            llm_validation_model: default_llm_validation_model(),
            validation_blocking: true,
        }
    }
}

// ─── Scalability / campaign / localization ──────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ScalabilityConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    3
}

impl Default for ScalabilityConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios: Vec<AspectRatio>,
}

fn default_aspect_ratios() -> Vec<AspectRatio> {
    AspectRatio::ALL.to_vec()
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            aspect_ratios: default_aspect_ratios(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_translation_model")]
    pub translation_model: String,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_translation_model() -> String {
    "gpt-4o".to_string()
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_locale: default_locale(),
            translation_model: default_translation_model(),
        }
    }
}

// ─── Post-processing ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PostProcessingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Effect strength in `[0, 1]`; 0 leaves images untouched.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Seed for the film-grain noise so output is reproducible.
    #[serde(default = "default_noise_seed")]
    pub seed: u64,
}

fn default_intensity() -> f32 {
    0.3
}

fn default_noise_seed() -> u64 {
    0x5EED_F11A
}

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: default_intensity(),
            seed: default_noise_seed(),
        }
    }
}

// ─── Storage / paths ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    Local,
    S3,
    AzureBlob,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    #[serde(default = "default_cache_base")]
    pub cache_base: PathBuf,
    #[serde(default = "default_output_base")]
    pub output_base: PathBuf,
}

fn default_cache_base() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_output_base() -> PathBuf {
    PathBuf::from("./output")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            cache_base: default_cache_base(),
            output_base: default_output_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_input_folder")]
    pub input_folder: PathBuf,
}

fn default_input_folder() -> PathBuf {
    PathBuf::from("./assets/input")
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            input_folder: default_input_folder(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file (format picked from the
    /// extension) overlaid with `CAMPAIGN_ASSETS__`-prefixed environment
    /// variables, e.g. `CAMPAIGN_ASSETS__SCALABILITY__MAX_WORKERS=6`.
    pub fn load(path: Option<&Path>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_ASSETS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("governance.prohibited_terms")
                .with_list_parse_key("governance.prohibited_categories")
                .with_list_parse_key("brand.brand_colors")
                .with_list_parse_key("campaign.aspect_ratios"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.scalability.max_workers == 0 {
            return Err(CampaignError::Config(
                "scalability.max_workers must be at least 1".to_string(),
            ));
        }
        if self.generator.rate_limit == 0 {
            return Err(CampaignError::Config(
                "generator.rate_limit must be at least 1 call per minute".to_string(),
            ));
        }
        if self.campaign.aspect_ratios.is_empty() {
            return Err(CampaignError::Config(
                "campaign.aspect_ratios must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.post_processing.intensity) {
            return Err(CampaignError::Config(format!(
                "post_processing.intensity must be within [0, 1], got {}",
                self.post_processing.intensity
            )));
        }
        if !(0.0..=1.0).contains(&self.brand.logo_opacity) {
            return Err(CampaignError::Config(format!(
                "brand.logo_opacity must be within [0, 1], got {}",
                self.brand.logo_opacity
            )));
        }
        if !(self.brand.logo_scale > 0.0 && self.brand.logo_scale <= 1.0) {
            return Err(CampaignError::Config(format!(
                "brand.logo_scale must be within (0, 1], got {}",
                self.brand.logo_scale
            )));
        }
        if self.aspect_ratio_processing.crop_strategy != "center" {
            return Err(CampaignError::Config(format!(
                "unsupported crop strategy '{}'",
                self.aspect_ratio_processing.crop_strategy
            )));
        }
        for ratio in AspectRatio::ALL {
            let size = self.aspect_ratio_processing.target_size(ratio);
            if size.width == 0 || size.height == 0 {
                return Err(CampaignError::Config(format!(
                    "target size for {ratio} must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scalability.max_workers, 3);
        assert_eq!(config.generator.rate_limit, 45);
        assert_eq!(config.campaign.aspect_ratios, AspectRatio::ALL.to_vec());
        assert_eq!(
            config.aspect_ratio_processing.target_size(AspectRatio::Vertical),
            Dimensions::new(1080, 1920)
        );
        assert_eq!(config.brand.logo_position, LogoPosition::BottomRight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "generator:\n  rate_limit: 10\nscalability:\n  max_workers: 5\ncampaign:\n  aspect_ratios: [\"1:1\", \"16:9\"]\ngovernance:\n  prohibited_terms: [\"miracle\"]\nbrand:\n  logo_position: top_left\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.generator.rate_limit, 10);
        assert_eq!(config.scalability.max_workers, 5);
        assert_eq!(
            config.campaign.aspect_ratios,
            vec![AspectRatio::Square, AspectRatio::Horizontal]
        );
        assert_eq!(config.governance.prohibited_terms, vec!["miracle".to_string()]);
        assert_eq!(config.brand.logo_position, LogoPosition::TopLeft);
        // Untouched sections keep their defaults.
        assert_eq!(config.text_overlay.font_size, 48);
    }

    #[test]
    fn test_bundled_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/campaign-assets.yaml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.governance.prohibited_terms.len(), 3);
        assert_eq!(config.campaign.aspect_ratios, AspectRatio::ALL.to_vec());
        assert_eq!(config.storage.backend, StorageBackendKind::Local);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scalability.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.post_processing.intensity = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.aspect_ratio_processing.crop_strategy = "smart".to_string();
        assert!(config.validate().is_err());
    }
}
