//! Agent errors.

use analyst_analysis::AnalysisError;
use analyst_core::CoreError;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors surfaced by the agent process and its request handlers.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Request envelope or task specification is malformed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Dataset parsing or a sub-task handler failed.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Registry call failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Registry health probe failed at startup.
    #[error("Registry is not reachable: {0}")]
    RegistryUnavailable(RegistryError),

    /// gRPC transport failure.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Socket or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking analysis task panicked or was cancelled.
    #[error("Analysis task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The agent is shutting down and no longer accepts work.
    #[error("Agent is shutting down")]
    ShuttingDown,
}
