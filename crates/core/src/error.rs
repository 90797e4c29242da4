use thiserror::Error;

pub type CampaignResult<T> = Result<T, CampaignError>;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Brief validation error: {0}")]
    Validation(String),

    #[error("Campaign pre-flight validation failed: {}", .errors.join("; "))]
    PreflightRejected { errors: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External service error: {0}")]
    Service(String),

    #[error("Image processing error: {0}")]
    Imaging(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CampaignError {
    /// Errors that stop a run outright. Everything else degrades into the
    /// run's error list.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CampaignError::Config(_)
                | CampaignError::Validation(_)
                | CampaignError::PreflightRejected { .. }
        )
    }
}

impl From<config::ConfigError> for CampaignError {
    fn from(err: config::ConfigError) -> Self {
        CampaignError::Config(err.to_string())
    }
}
