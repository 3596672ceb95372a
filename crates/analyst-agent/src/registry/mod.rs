//! Service registry boundary.
//!
//! The agent publishes `/{service_name}/{address}` bound to a lease. Two
//! backends implement [`Registry`]: [`EtcdRegistry`] talks to an etcd v3
//! cluster through its JSON gateway, [`MemoryRegistry`] keeps everything in
//! process and can inject faults.

mod etcd;
mod memory;

use analyst_core::LeaseId;
use async_trait::async_trait;
use thiserror::Error;

pub use etcd::EtcdRegistry;
pub use memory::MemoryRegistry;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Request never got an answer.
    #[error("Registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with a non-success status.
    #[error("Registry returned HTTP {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// Lease is unknown to the registry or already expired.
    #[error("Lease {0} has expired")]
    LeaseExpired(LeaseId),

    /// Registry answer could not be understood.
    #[error("Malformed registry response: {0}")]
    Malformed(String),

    /// Registry refused the call.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Key/value registry with leases.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Health probe.
    async fn status(&self) -> Result<(), RegistryError>;

    /// Grant a lease that expires after `ttl_secs` without renewal.
    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId, RegistryError>;

    /// Refresh a lease. Fails with [`RegistryError::LeaseExpired`] when the
    /// registry no longer knows it.
    async fn keep_alive(&self, lease: LeaseId) -> Result<(), RegistryError>;

    /// Write `key` bound to `lease`; the key disappears when the lease expires.
    async fn put(&self, key: &str, value: &str, lease: LeaseId) -> Result<(), RegistryError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), RegistryError>;

    /// All entries whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError>;
}

/// Registry key an instance publishes under.
pub fn registry_key(service_name: &str, address: &str) -> String {
    format!("/{service_name}/{address}")
}

/// Prefix under which every instance of a service is published.
pub fn service_prefix(service_name: &str) -> String {
    format!("/{service_name}/")
}
