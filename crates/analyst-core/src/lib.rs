//! Analyst Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/gRPC
//! - The registry
//! - Runtime specifics
//!
//! All types here describe the task envelopes an agent exchanges with its
//! callers and the task specification carried inside them.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod spec;
pub mod status;

// Re-export commonly used types
pub use envelope::{Content, Part, TaskEnvelope, MIME_PNG};
pub use error::CoreError;
pub use ids::{LeaseId, TaskId};
pub use metadata::AgentMetadata;
pub use spec::{DataFormat, SubTaskDescriptor, TaskSpec};
pub use status::LifecycleState;
