//! Error types for AuthorScope

/// Result type alias using AuthorScope's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for AuthorScope operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request input is missing, duplicated, or undecodable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Request text is empty after trimming whitespace
    #[error("invalid input: empty text")]
    EmptyInput,

    /// Pretrained artifacts missing or incompatible at startup
    #[error("load failure: {0}")]
    Load(String),

    /// Feature extraction or scoring failed
    #[error("inference failure: {0}")]
    Inference(String),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new load failure
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Create a new inference failure
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::EmptyInput)
    }
}
