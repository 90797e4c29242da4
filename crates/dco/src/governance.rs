//! Local, deterministic compliance checks run against every composed asset.

use std::path::PathBuf;

use campaign_core::config::{BrandConfig, GovernanceConfig};
use campaign_core::ComplianceResult;
use image::DynamicImage;
use tracing::debug;

/// Maximum long-side/short-side ratio before an asset is flagged.
const MAX_ASPECT: f64 = 3.0;
/// Pixel standard deviation below which an image counts as monochrome.
const MONOCHROME_STD_DEV: f64 = 10.0;

pub struct ComplianceChecker {
    prohibited_terms: Vec<String>,
    legal_check_enabled: bool,
    brand_check_enabled: bool,
    content_safety_enabled: bool,
    min_resolution: u32,
    logo_path: PathBuf,
    brand_colors: Vec<String>,
}

impl ComplianceChecker {
    pub fn new(governance: &GovernanceConfig, brand: &BrandConfig) -> Self {
        let mut prohibited_terms: Vec<String> = governance
            .prohibited_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        prohibited_terms.sort();
        prohibited_terms.dedup();

        Self {
            prohibited_terms,
            legal_check_enabled: governance.legal_check_enabled,
            brand_check_enabled: governance.brand_check_enabled,
            content_safety_enabled: governance.content_safety_enabled,
            min_resolution: governance.min_resolution,
            logo_path: brand.logo_path.clone(),
            brand_colors: brand.brand_colors.clone(),
        }
    }

    /// Run every enabled check against a composed asset and the (localized)
    /// message drawn on it.
    pub fn check_asset(&self, image: &DynamicImage, message: &str) -> ComplianceResult {
        let mut result = ComplianceResult::new();

        if self.legal_check_enabled {
            self.check_legal_terms(message, &mut result);
        }
        if self.brand_check_enabled {
            self.check_brand_presence(&mut result);
            self.check_image_quality(image, &mut result);
        }
        if self.content_safety_enabled {
            // No moderation backend yet; the check always passes.
            result.add_pass("Content safety check (placeholder)");
        }

        metrics::counter!("compliance.checked").increment(1);
        if !result.passed {
            metrics::counter!("compliance.failed").increment(1);
        }
        debug!(passed = result.passed, errors = result.errors.len(), warnings = result.warnings.len(), "asset checked");
        result
    }

    /// Flag images whose pixels barely vary when brand colors are configured.
    /// Not part of `check_asset`; callers opt in.
    pub fn check_color_compliance(&self, image: &DynamicImage) -> ComplianceResult {
        let mut result = ComplianceResult::new();
        if !self.brand_check_enabled {
            return result;
        }
        if self.brand_colors.is_empty() {
            result.add_pass("No brand colors configured");
            return result;
        }

        if pixel_std_dev(image) < MONOCHROME_STD_DEV {
            result.add_error("Image appears monochrome - brand colors not evident");
        } else {
            result.add_pass("Color variance acceptable");
        }
        result
    }

    fn check_legal_terms(&self, message: &str, result: &mut ComplianceResult) {
        let lower = message.to_lowercase();
        let found: Vec<&str> = self
            .prohibited_terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .map(String::as_str)
            .collect();

        if found.is_empty() {
            result.add_pass("Legal terms check");
        } else {
            result.add_error(format!("Prohibited terms found: {}", found.join(", ")));
        }
    }

    fn check_brand_presence(&self, result: &mut ComplianceResult) {
        if self.logo_path.exists() {
            result.add_pass("Brand logo available");
        } else {
            result.add_warning("Brand logo not found - may affect brand compliance");
        }
    }

    fn check_image_quality(&self, image: &DynamicImage, result: &mut ComplianceResult) {
        let (w, h) = (image.width(), image.height());
        let short = w.min(h);
        if short < self.min_resolution {
            result.add_error(format!(
                "Image resolution {w}x{h} below minimum {}px",
                self.min_resolution
            ));
        } else {
            result.add_pass(format!("Resolution check ({w}x{h})"));
        }

        if short > 0 {
            let aspect = f64::from(w.max(h)) / f64::from(short);
            if aspect > MAX_ASPECT {
                result.add_warning(format!("Unusual aspect ratio: {aspect:.2}:1"));
            }
        }
    }
}

/// Standard deviation over every RGB channel value.
fn pixel_std_dev(image: &DynamicImage) -> f64 {
    let rgb = image.to_rgb8();
    let values = rgb.as_raw();
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checker(terms: &[&str], min_resolution: u32) -> ComplianceChecker {
        let governance = GovernanceConfig {
            prohibited_terms: terms.iter().map(|t| t.to_string()).collect(),
            min_resolution,
            ..GovernanceConfig::default()
        };
        let brand = BrandConfig {
            logo_path: PathBuf::from("does/not/exist/logo.png"),
            brand_colors: vec!["#FF6B35".to_string()],
            ..BrandConfig::default()
        };
        ComplianceChecker::new(&governance, &brand)
    }

    fn flat(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])))
    }

    #[test]
    fn test_prohibited_term_fails_case_insensitively() {
        let result = checker(&["Guaranteed", "cure"], 10).check_asset(&flat(20, 20), "GUARANTEED results!");
        assert!(!result.passed);
        assert_eq!(result.errors, vec!["Prohibited terms found: guaranteed".to_string()]);
    }

    #[test]
    fn test_clean_message_passes_with_logo_warning() {
        let result = checker(&["cure"], 10).check_asset(&flat(20, 20), "Fresh summer deals");
        assert!(result.passed);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.checks_performed.contains(&"PASS: Legal terms check".to_string()));
    }

    #[test]
    fn test_low_resolution_is_an_error() {
        let result = checker(&[], 1024).check_asset(&flat(1080, 600), "Fresh summer deals");
        assert!(!result.passed);
        assert!(result.errors[0].contains("1080x600"));
    }

    #[test]
    fn test_extreme_aspect_is_a_warning() {
        let result = checker(&[], 10).check_asset(&flat(400, 100), "Fresh summer deals");
        assert!(result.passed);
        assert!(result.warnings.iter().any(|w| w.starts_with("Unusual aspect ratio: 4.00")));
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let governance = GovernanceConfig {
            prohibited_terms: vec!["cure".to_string()],
            legal_check_enabled: false,
            brand_check_enabled: false,
            content_safety_enabled: true,
            ..GovernanceConfig::default()
        };
        let c = ComplianceChecker::new(&governance, &BrandConfig::default());
        let result = c.check_asset(&flat(10, 10), "miracle cure");
        assert!(result.passed);
        assert_eq!(result.checks_performed, vec!["PASS: Content safety check (placeholder)".to_string()]);
    }

    #[test]
    fn test_color_compliance_flags_monochrome() {
        let c = checker(&[], 10);
        assert!(!c.check_color_compliance(&flat(8, 8)).passed);

        let striped = DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, _| {
            if x % 2 == 0 { Rgb([255, 107, 53]) } else { Rgb([0, 0, 0]) }
        }));
        assert!(c.check_color_compliance(&striped).passed);
    }

    #[test]
    fn test_color_compliance_follows_brand_check_switch() {
        let governance = GovernanceConfig {
            brand_check_enabled: false,
            ..GovernanceConfig::default()
        };
        let brand = BrandConfig {
            brand_colors: vec!["#FF6B35".to_string()],
            ..BrandConfig::default()
        };
        let c = ComplianceChecker::new(&governance, &brand);
        let result = c.check_color_compliance(&flat(8, 8));
        assert!(result.passed);
        assert!(result.checks_performed.is_empty());
    }

    #[test]
    fn test_check_asset_ignores_color_variance() {
        let result = checker(&[], 10).check_asset(&flat(64, 64), "Fresh summer deals");
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    }
}
