//! Registry-backed data analysis agent.
//!
//! The agent publishes itself in a key-value registry under a renewable
//! lease and serves `analyst.v1.AgentService` over gRPC. Each `ExecuteTask`
//! call carries a dataset and a list of sub-tasks; every recognized sub-task
//! produces one part of the reply.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lease;
pub mod lifecycle;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod service;

pub use config::{Args, Config, RegistryBackend};
pub use dispatch::{dispatch, Dispatched, SubTaskKind};
pub use error::AgentError;
pub use lease::{LeaseManager, LeaseSettings};
pub use lifecycle::Agent;
pub use metrics::Metrics;
pub use registry::{EtcdRegistry, MemoryRegistry, Registry, RegistryError};
pub use service::AgentServiceImpl;
