//! Agent configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::lease::LeaseSettings;

/// Which registry implementation to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegistryBackend {
    /// etcd v3 through its JSON gateway.
    Etcd,
    /// In-process registry, for local runs without etcd.
    Memory,
}

/// Command-line arguments of the agent binary.
#[derive(Parser, Debug)]
#[command(name = "analyst-agent")]
#[command(about = "Registry-backed data analysis agent", long_about = None)]
pub struct Args {
    /// Name published in the registry and returned by GetMetadata
    #[arg(long, env = "ANALYST_SERVICE_NAME", default_value = "data_analysis_agent")]
    pub service_name: String,

    /// Address the gRPC server binds to
    #[arg(long, env = "ANALYST_LISTEN_ADDR", default_value = "127.0.0.1:9092")]
    pub listen_addr: SocketAddr,

    /// Address published in the registry (defaults to the listen address)
    #[arg(long, env = "ANALYST_ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// Registry implementation
    #[arg(long, env = "ANALYST_REGISTRY_BACKEND", value_enum, default_value_t = RegistryBackend::Etcd)]
    pub registry_backend: RegistryBackend,

    /// etcd JSON gateway endpoint
    #[arg(long, env = "ANALYST_ETCD_ENDPOINT", default_value = "http://127.0.0.1:2379")]
    pub etcd_endpoint: String,

    /// Lease time-to-live in seconds
    #[arg(long, env = "ANALYST_LEASE_TTL_SECS", default_value_t = 10, value_parser = clap::value_parser!(i64).range(1..))]
    pub lease_ttl_secs: i64,

    /// Pause between failed re-registration attempts, in seconds
    #[arg(long, env = "ANALYST_RETRY_BACKOFF_SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub retry_backoff_secs: u64,

    /// Maximum number of tasks analysed at the same time
    #[arg(long, env = "ANALYST_MAX_CONCURRENT_TASKS", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrent_tasks: u32,

    /// Address of the health and metrics HTTP server (disabled when unset)
    #[arg(long, env = "ANALYST_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    /// Timeout of each registry request, in seconds
    #[arg(long, env = "ANALYST_REGISTRY_TIMEOUT_SECS", default_value_t = 5)]
    pub registry_timeout_secs: u64,
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry service name and agent name.
    pub service_name: String,

    /// gRPC server bind address.
    pub listen_addr: SocketAddr,

    /// Address published in the registry.
    pub advertise_addr: Option<String>,

    /// Registry implementation.
    pub registry_backend: RegistryBackend,

    /// etcd JSON gateway endpoint.
    pub etcd_endpoint: String,

    /// Lease time-to-live (seconds).
    pub lease_ttl_secs: i64,

    /// Re-registration retry delay (seconds).
    pub retry_backoff_secs: u64,

    /// Concurrent task limit.
    pub max_concurrent_tasks: usize,

    /// Health and metrics HTTP bind address.
    pub http_addr: Option<SocketAddr>,

    /// Registry request timeout (seconds).
    pub registry_timeout_secs: u64,
}

impl Config {
    /// Address published in the registry.
    pub fn advertise_addr(&self) -> String {
        self.advertise_addr
            .clone()
            .unwrap_or_else(|| self.listen_addr.to_string())
    }

    pub fn lease_settings(&self) -> LeaseSettings {
        LeaseSettings {
            ttl_secs: self.lease_ttl_secs,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "data_analysis_agent".to_string(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9092)),
            advertise_addr: None,
            registry_backend: RegistryBackend::Etcd,
            etcd_endpoint: "http://127.0.0.1:2379".to_string(),
            lease_ttl_secs: 10,
            retry_backoff_secs: 5,
            max_concurrent_tasks: 10,
            http_addr: None,
            registry_timeout_secs: 5,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            service_name: args.service_name,
            listen_addr: args.listen_addr,
            advertise_addr: args.advertise_addr,
            registry_backend: args.registry_backend,
            etcd_endpoint: args.etcd_endpoint,
            lease_ttl_secs: args.lease_ttl_secs,
            retry_backoff_secs: args.retry_backoff_secs,
            max_concurrent_tasks: args.max_concurrent_tasks as usize,
            http_addr: args.http_addr,
            registry_timeout_secs: args.registry_timeout_secs,
        }
    }
}
