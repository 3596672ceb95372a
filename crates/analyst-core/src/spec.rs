//! Task specification carried in the text part of a request.
//!
//! Two request shapes are accepted:
//!
//! - direct: `{"data": "...", "data_format": "csv", "tasks": [...]}`
//! - wrapped: `{"input": "<the direct shape, JSON-encoded as a string>"}`
//!
//! The wrapped shape is unwrapped exactly one level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CoreError;

/// Key holding the nested specification in the wrapped shape.
const WRAPPED_KEY: &str = "input";

/// Encoding of the dataset string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Rectangular table with a header row.
    #[default]
    Csv,
    /// Array of row objects.
    Json,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for DataFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared sub-task: a `type` tag plus handler-specific parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubTaskDescriptor {
    params: Map<String, Value>,
}

impl SubTaskDescriptor {
    /// Wrap a JSON object.
    pub fn new(params: Map<String, Value>) -> Self {
        Self { params }
    }

    /// The `type` tag, if present and a string.
    pub fn task_type(&self) -> Option<&str> {
        self.params.get("type").and_then(Value::as_str)
    }

    /// All keys of the descriptor, `type` included.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// A string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Decoded task specification.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Raw dataset string.
    pub data: String,

    /// Encoding of `data`.
    pub data_format: DataFormat,

    /// Ordered sub-tasks, never empty.
    pub tasks: Vec<SubTaskDescriptor>,
}

impl TaskSpec {
    /// Decode a specification from the text of a request part.
    ///
    /// Tries the wrapped shape first, then the direct shape.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)?;

        match value {
            Value::Object(mut object) => match object.remove(WRAPPED_KEY) {
                Some(Value::String(inner)) => {
                    let nested: Value = serde_json::from_str(&inner)?;
                    Self::from_value(nested)
                }
                Some(_) => Err(CoreError::InvalidInput(format!(
                    "'{WRAPPED_KEY}' must hold a JSON-encoded string"
                ))),
                None => Self::from_object(object),
            },
            _ => Err(CoreError::InvalidInput(
                "task specification must be a JSON object".to_string(),
            )),
        }
    }

    fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(object) => Self::from_object(object),
            _ => Err(CoreError::InvalidInput(
                "task specification must be a JSON object".to_string(),
            )),
        }
    }

    fn from_object(mut object: Map<String, Value>) -> Result<Self, CoreError> {
        let data = match object.remove("data") {
            Some(Value::String(data)) if !data.is_empty() => data,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(CoreError::MissingField("data"))
            }
            Some(_) => {
                return Err(CoreError::InvalidInput(
                    "'data' must be a string".to_string(),
                ))
            }
        };

        let data_format = match object.remove("data_format") {
            None | Some(Value::Null) => DataFormat::default(),
            Some(Value::String(format)) => format.parse()?,
            Some(other) => return Err(CoreError::UnsupportedFormat(other.to_string())),
        };

        let tasks = match object.remove("tasks") {
            Some(Value::Array(tasks)) if !tasks.is_empty() => tasks,
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                return Err(CoreError::MissingField("tasks"))
            }
            Some(_) => {
                return Err(CoreError::InvalidInput(
                    "'tasks' must be an array".to_string(),
                ))
            }
        };

        let tasks = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| match task {
                Value::Object(params) => Ok(SubTaskDescriptor::new(params)),
                _ => Err(CoreError::InvalidInput(format!(
                    "task #{index} must be a JSON object"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            data,
            data_format,
            tasks,
        })
    }
}
