//! Task envelope, content and part types.

use serde::{Deserialize, Serialize};

use crate::{CoreError, TaskId};

/// Mime type of rendered charts.
pub const MIME_PNG: &str = "image/png";

/// The smallest unit of payload inside a Content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Text payload, usually JSON-encoded.
    Text(String),

    /// Binary payload with its mime type.
    Blob { mime_type: String, data: Vec<u8> },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a PNG blob part.
    pub fn png(data: Vec<u8>) -> Self {
        Self::Blob {
            mime_type: MIME_PNG.to_string(),
            data,
        }
    }

    /// Text payload, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Blob { .. } => None,
        }
    }

    /// Short name of the variant, for error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Blob { .. } => "blob",
        }
    }
}

/// One logical message: an ordered sequence of parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Speaker role, carried through unchanged.
    pub role: String,

    /// Ordered parts.
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a content block from parts.
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            role: String::new(),
            parts,
        }
    }
}

/// A unit of work, or its result, with causal metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Caller-assigned task identifier.
    pub task_id: TaskId,

    /// Propagated unchanged through a causal chain of tasks.
    pub correlation_id: String,

    /// Back-reference to the task this one answers or derives from.
    pub parent_task_id: Option<TaskId>,

    /// Agent that sent this envelope.
    pub source_agent_id: String,

    /// Agent this envelope is addressed to.
    pub target_agent_id: String,

    /// Human-readable label.
    pub task_name: String,

    /// Ordered content blocks.
    pub content: Vec<Content>,
}

impl TaskEnvelope {
    /// Create a new envelope with the given id and name.
    pub fn new(task_id: TaskId, task_name: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the correlation id.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Builder method to set source and target agents.
    pub fn with_route(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_agent_id = source.into();
        self.target_agent_id = target.into();
        self
    }

    /// Builder method to append a content block holding a single text part.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Content::new(vec![Part::text(text)]));
        self
    }

    /// Text of the first part of the first content block.
    pub fn first_text(&self) -> Result<&str, CoreError> {
        let part = self
            .content
            .first()
            .and_then(|content| content.parts.first())
            .ok_or(CoreError::MissingContent)?;

        part.as_text().ok_or(CoreError::ExpectedText(part.kind()))
    }

    /// Parts of the first content block, empty when there is none.
    pub fn parts(&self) -> &[Part] {
        self.content
            .first()
            .map(|content| content.parts.as_slice())
            .unwrap_or(&[])
    }
}
