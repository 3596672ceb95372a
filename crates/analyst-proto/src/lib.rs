//! Generated gRPC code and converters for the analyst agent.
//!
//! This crate contains:
//! - Generated protobuf message types
//! - Generated gRPC service stubs (client and server)
//! - Converters between proto types and domain types

pub mod convert;

/// Generated protobuf types and services.
pub mod pb {
    tonic::include_proto!("analyst.v1");
}

// Re-export commonly used types
pub use pb::agent_service_client::AgentServiceClient;
pub use pb::agent_service_server::{AgentService, AgentServiceServer};
