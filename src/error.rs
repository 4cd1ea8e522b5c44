use thiserror::Error;

use crate::api::ApiError;

/// Main error type for sociograph
#[derive(Error, Debug)]
pub enum SociographError {
    /// Remote API failure that was not absorbed by the batch fetcher
    #[error("Remote API error: {0}")]
    RemoteApi(#[from] ApiError),

    /// Geocoding provider failure
    #[error("Geocoding error: {0}")]
    Geocode(String),

    /// Persisted document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted document decoded but violates referential integrity
    #[error("Invalid document: {0}")]
    Document(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type using SociographError
pub type Result<T> = std::result::Result<T, SociographError>;
