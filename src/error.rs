use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

const TRY_AGAIN_LATER: &str = "Something went wrong. Please try again later.";

/// Errors surfaced by the registry, resolver, dispatcher and account services
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("VCS alias `{0}` already exists")]
    AliasConflict(String),

    #[error("`{0}` is a system VCS and cannot be deleted")]
    ProtectedAlias(String),

    #[error("Not connected to CircleCI. Use `/circleci connect <token>` first.")]
    NotConnected,

    #[error("store {operation} failed for key `{key}`: {message}")]
    Store {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("gave up updating key `{key}` after {attempts} compare-and-set attempts")]
    RetryExhausted { key: String, attempts: u32 },

    #[error("stored value under key `{key}` could not be decoded: {message}")]
    CorruptData { key: String, message: String },

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl BridgeError {
    pub fn store(operation: &'static str, key: &str, err: anyhow::Error) -> Self {
        Self::Store {
            operation,
            key: key.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub fn corrupt(key: &str, err: serde_json::Error) -> Self {
        Self::CorruptData {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    /// Failures a caller may retry later; compare-and-set exhaustion counts as a store failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::RetryExhausted { .. })
    }

    /// Text shown to the invoking chat user. Storage internals never leak here.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::AliasConflict(_)
            | Self::ProtectedAlias(_)
            | Self::NotConnected => self.to_string(),
            Self::Store { .. }
            | Self::RetryExhausted { .. }
            | Self::CorruptData { .. }
            | Self::Upstream(_) => TRY_AGAIN_LATER.to_string(),
        }
    }
}
