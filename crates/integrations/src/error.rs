use campaign_core::CampaignError;
use thiserror::Error;

/// Failure talking to an external generation or language-model service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ServiceError>,
    },
}

impl ServiceError {
    /// Rate limiting, server errors and connection/timeout failures are worth
    /// another attempt; everything else fails immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            ServiceError::Transport(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ServiceError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

impl From<ServiceError> for CampaignError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingApiKey => CampaignError::Config(err.to_string()),
            other => CampaignError::Service(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ServiceError {
        ServiceError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(http(429).is_transient());
        assert!(http(500).is_transient());
        assert!(http(503).is_transient());
        assert!(ServiceError::Transport("timed out".into()).is_transient());

        assert!(!http(400).is_transient());
        assert!(!http(401).is_transient());
        assert!(!ServiceError::Malformed("no data".into()).is_transient());
        assert!(!ServiceError::MissingApiKey.is_transient());
    }

    #[test]
    fn test_missing_key_is_a_config_error() {
        let err: CampaignError = ServiceError::MissingApiKey.into();
        assert!(err.is_fatal());
        let err: CampaignError = http(500).into();
        assert!(!err.is_fatal());
    }
}
