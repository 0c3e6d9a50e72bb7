//! Error types for tessera controlled lists.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using tessera's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for controlled-list operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Controlled list not found
    #[error("List not found: {0}")]
    ListNotFound(uuid::Uuid),

    /// List item not found
    #[error("List item not found: {0}")]
    ListItemNotFound(uuid::Uuid),

    /// Graph node not found
    #[error("Node not found: {0}")]
    NodeNotFound(uuid::Uuid),

    /// Node configuration does not describe a usable reference field
    #[error("Graph validation error: {0}")]
    GraphValidation(String),

    /// Deleting this value would leave the item without a preferred label
    #[error("At least one preferred label is required for list item {0}")]
    MissingPrefLabel(uuid::Uuid),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Structured validation report returned to editors when a submitted
/// value fails parsing or semantic checks. Distinct from [`Error`]:
/// issues describe the value, errors describe the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub title: String,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: "ERROR".to_string(),
            message: message.into(),
            title: title.into(),
        }
    }
}
