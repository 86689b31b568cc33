use thiserror::Error;

/// Why a single lifecycle step failed.
///
/// Every variant collapses into a failed probe; none of them abort the owning
/// worker or the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("expected HTTP {expected}, got HTTP {actual}")]
    UnexpectedStatus { expected: u16, actual: u16 },

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("key missing from read response")]
    MissingKey,

    #[error("expected value '{expected}', got '{actual}'")]
    ValueMismatch { expected: String, actual: String },

    #[error("key still present after delete (HTTP {status})")]
    StillPresent { status: u16 },
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        ProbeError::Transport(error.to_string())
    }
}

/// Configuration could not be loaded or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Load(Box::new(error))
    }
}

/// Errors that stop a run before or after the workers execute.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("latency histogram error: {0}")]
    Histogram(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::UnexpectedStatus { expected: 200, actual: 500 };
        assert_eq!(err.to_string(), "expected HTTP 200, got HTTP 500");

        let err = ProbeError::ValueMismatch {
            expected: "a".to_string(),
            actual: "b".to_string(),
        };
        assert_eq!(err.to_string(), "expected value 'a', got 'b'");
    }

    #[test]
    fn test_config_error_wraps_invalid() {
        let err: HarnessError = ConfigError::Invalid("base_url is empty".to_string()).into();
        assert_eq!(err.to_string(), "invalid configuration: base_url is empty");
    }
}
