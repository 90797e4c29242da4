pub mod brief;
pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use brief::{BrandStyle, BriefSpec, CampaignBrief, CreativeBrief, Product};
pub use config::AppConfig;
pub use error::{CampaignError, CampaignResult};
pub use report::{ComplianceSummary, ExecutionContext, ExecutionReport};
pub use types::{AspectRatio, ComplianceResult, GeneratedAsset, HeroProvenance, ValidationResult};
