use thiserror::Error;

/// Result type for duelq operations
pub type Result<T> = std::result::Result<T, DuelError>;

/// Main error type for the learning engine and the decision service
#[derive(Error, Debug)]
pub enum DuelError {
    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Sampling asked for more transitions than the replay buffer holds
    #[error("Insufficient replay data: requested {requested} transitions, only {available} stored")]
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Invalid action
    #[error("Invalid action {action}: must be less than {n_actions}")]
    InvalidAction {
        action: usize,
        n_actions: usize,
    },

    /// Numerical computation errors
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Training error
    #[error("Training error: {0}")]
    Training(String),

    /// Payload that is neither a sentinel nor a valid step message
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Another connection currently owns the agent's episode
    #[error("Agent is busy with session {owner}")]
    SessionBusy {
        owner: u64,
    },

    /// The agent service thread is gone
    #[error("Agent service unavailable")]
    AgentUnavailable,

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for DuelError {
    fn from(err: config::ConfigError) -> Self {
        DuelError::Config(err.to_string())
    }
}

// Helper functions for common error patterns
impl DuelError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DuelError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DuelError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the peer's input rather than by the engine
    pub fn is_client_error(&self) -> bool {
        matches!(self, DuelError::MalformedMessage(_) | DuelError::SessionBusy { .. })
    }
}
