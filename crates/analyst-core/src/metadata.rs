//! Static capability description returned by `GetMetadata`.

use serde::{Deserialize, Serialize};

/// Description of what an agent can do and how to call it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Agent name, also the registry service name.
    pub name: String,

    /// What the agent can do.
    pub capability: String,

    /// Shape of the expected input.
    pub input_description: String,

    /// Shape of the produced output.
    pub output_description: String,
}

impl AgentMetadata {
    /// Create metadata with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: String::new(),
            input_description: String::new(),
            output_description: String::new(),
        }
    }

    /// Builder method to set the capability description.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    /// Builder method to set the input description.
    pub fn with_input_description(mut self, desc: impl Into<String>) -> Self {
        self.input_description = desc.into();
        self
    }

    /// Builder method to set the output description.
    pub fn with_output_description(mut self, desc: impl Into<String>) -> Self {
        self.output_description = desc.into();
        self
    }
}
