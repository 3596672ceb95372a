//! Analysis errors.

use thiserror::Error;

/// Errors raised while parsing a dataset or running a routine on it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// CSV input could not be parsed.
    #[error("Failed to parse CSV data: {0}")]
    Csv(#[from] csv::Error),

    /// JSON input could not be parsed.
    #[error("Failed to parse JSON data: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON input was not an array of row objects.
    #[error("JSON data must be an array of row objects")]
    NotRecords,

    /// A routine needs a parameter that was not given.
    #[error("'{task}' task requires a '{param}' parameter")]
    MissingParameter {
        task: &'static str,
        param: &'static str,
    },

    /// A parameter had an unusable value.
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter { param: &'static str, reason: String },

    /// Column referenced by a parameter does not exist.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column exists but is not numeric.
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    /// Column holds an infinite value, which cannot be placed on a chart axis.
    #[error("Column '{0}' contains non-finite values")]
    NonFinite(String),

    /// Unsupported chart kind.
    #[error("Unsupported plot type: {0}")]
    UnsupportedPlotType(String),

    /// Chart drawing or PNG encoding failed.
    #[error("Failed to render chart: {0}")]
    Render(String),
}
