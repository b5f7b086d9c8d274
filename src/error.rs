//! Error types for the Teams sender

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Users file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read users file {path}: {reason}")]
    FileUnreadable { path: String, reason: String },

    #[error("Users file is empty: {0}")]
    EmptyInput(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Graph API error: {0}")]
    GraphError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors that stop the run before or instead of the recipient loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound(_)
                | Error::FileUnreadable { .. }
                | Error::EmptyInput(_)
                | Error::AuthenticationFailed(_)
                | Error::ConfigError(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::GraphError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
