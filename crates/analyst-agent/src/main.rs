//! Analyst agent daemon

use std::sync::Arc;

use analyst_agent::{Agent, Args, Config, EtcdRegistry, MemoryRegistry, Registry, RegistryBackend};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("analyst=info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load config
    let config = Config::from(Args::parse());

    let registry: Arc<dyn Registry> = match config.registry_backend {
        RegistryBackend::Etcd => Arc::new(EtcdRegistry::new(
            config.etcd_endpoint.clone(),
            config.registry_timeout(),
        )?),
        RegistryBackend::Memory => {
            warn!("Using in-memory registry; this instance is not discoverable");
            Arc::new(MemoryRegistry::new())
        }
    };

    info!(
        service = %config.service_name,
        listen_addr = %config.listen_addr,
        registry = ?config.registry_backend,
        "Starting analyst agent"
    );

    Agent::new(config, registry).run(shutdown_signal()).await?;

    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
