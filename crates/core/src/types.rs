use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CampaignError;

/// Supported social-media aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "16:9")]
    Horizontal,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Square,
        AspectRatio::Vertical,
        AspectRatio::Horizontal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Horizontal => "16:9",
        }
    }

    /// Filesystem-safe token used in output file names (`1x1`, `9x16`, `16x9`).
    pub fn file_token(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1x1",
            AspectRatio::Vertical => "9x16",
            AspectRatio::Horizontal => "16x9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1:1" | "1x1" => Ok(AspectRatio::Square),
            "9:16" | "9x16" => Ok(AspectRatio::Vertical),
            "16:9" | "16x9" => Ok(AspectRatio::Horizontal),
            other => Err(CampaignError::Validation(format!(
                "unsupported aspect ratio '{other}'"
            ))),
        }
    }
}

/// Where a hero image came from during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroProvenance {
    UserProvided,
    CacheHit,
    Generated,
}

impl HeroProvenance {
    /// Whether the hero was obtained without a paid generation call.
    pub fn is_reused(&self) -> bool {
        !matches!(self, HeroProvenance::Generated)
    }
}

/// Result of the pre-flight brief validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default = "default_passed")]
    pub passed: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

fn default_passed() -> bool {
    true
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    /// A failed result carrying a single error.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// Outcome of the compliance checks run against one composed asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub passed: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub checks_performed: Vec<String>,
}

impl Default for ComplianceResult {
    fn default() -> Self {
        Self {
            passed: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            checks_performed: Vec::new(),
        }
    }
}

impl ComplianceResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.checks_performed.push(format!("WARNING: {message}"));
        self.warnings.push(message);
    }

    /// Record an error. Any error fails the whole result.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.checks_performed.push(format!("ERROR: {message}"));
        self.errors.push(message);
        self.passed = false;
    }

    pub fn add_pass(&mut self, check: impl AsRef<str>) {
        self.checks_performed
            .push(format!("PASS: {}", check.as_ref()));
    }
}

/// Metadata for one composed, persisted deliverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub product_id: String,
    pub aspect_ratio: AspectRatio,
    pub locale: String,
    pub file_path: String,
    /// Composition itself is free; generation cost is tracked per hero.
    pub generation_cost: f64,
    pub hero_provenance: HeroProvenance,
    pub compliance: ComplianceResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_tokens() {
        assert_eq!(AspectRatio::Square.file_token(), "1x1");
        assert_eq!(AspectRatio::Vertical.file_token(), "9x16");
        assert_eq!(AspectRatio::Horizontal.file_token(), "16x9");
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Horizontal);
        assert_eq!("9x16".parse::<AspectRatio>().unwrap(), AspectRatio::Vertical);
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_ratio_serde_uses_colon_form() {
        let json = serde_json::to_string(&AspectRatio::Vertical).unwrap();
        assert_eq!(json, "\"9:16\"");
        let parsed: Vec<AspectRatio> = serde_json::from_str(r#"["1:1","16:9"]"#).unwrap();
        assert_eq!(parsed, vec![AspectRatio::Square, AspectRatio::Horizontal]);
    }

    #[test]
    fn test_compliance_error_fails_result() {
        let mut result = ComplianceResult::new();
        result.add_pass("Legal terms check");
        result.add_warning("Brand logo not found");
        assert!(result.passed);

        result.add_error("Prohibited terms found: miracle");
        assert!(!result.passed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.checks_performed.len(), 3);
        assert!(result.checks_performed[2].starts_with("ERROR:"));
    }

    #[test]
    fn test_validation_result_defaults_when_fields_missing() {
        let parsed: ValidationResult = serde_json::from_str(r#"{"errors": ["bad"]}"#).unwrap();
        assert!(parsed.passed);
        assert_eq!(parsed.errors, vec!["bad".to_string()]);
        assert!(parsed.suggestions.is_empty());
    }
}
