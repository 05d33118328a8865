//! Error types for the recall_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recall_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A card, review log or configuration record is missing a field
    /// or holds a value of the wrong shape
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A card's fields are inconsistent with its learning state
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Rating outside Again/Hard/Good/Easy
    #[error("Invalid rating: {0}")]
    InvalidRating(String),
}
