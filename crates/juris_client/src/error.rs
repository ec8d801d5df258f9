//! Error types shared by the streaming client, the orchestrator and config loading.

/// Failure of one streaming attempt against `/ask/`.
///
/// Only `Interrupted` is eligible for the wait-and-retry path; `Unexpected`
/// is surfaced to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Malformed event or transport failure while the response body was being read.
    #[error("stream interrupted: {0}")]
    Interrupted(String),
    /// Anything else: the request could not be sent, or the service refused it.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl StreamError {
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Config load/save/validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
