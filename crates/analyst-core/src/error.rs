//! Core domain errors.

use thiserror::Error;

/// Core domain errors for the analyst agent.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The request envelope carries no content block.
    #[error("Task has no content")]
    MissingContent,

    /// The first part of the request is not a text part.
    #[error("Expected a text part, found {0}")]
    ExpectedText(&'static str),

    /// A wire part had neither variant populated.
    #[error("Part carries no data")]
    EmptyPart,

    /// Input is not valid JSON.
    #[error("Input is not a valid JSON string: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("'{0}' field is required in the input JSON")]
    MissingField(&'static str),

    /// Unsupported dataset format tag.
    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
