//! Agent process lifecycle.
//!
//! `Created -> Registered -> Serving -> Stopping -> Unregistered`. The
//! current state is published on a watch channel so the health endpoint and
//! tests can follow it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use analyst_core::LifecycleState;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::http::{create_router, HttpState};
use crate::lease::LeaseManager;
use crate::metrics::Metrics;
use crate::registry::Registry;
use crate::service::AgentServiceImpl;

/// A configured agent, ready to register and serve.
pub struct Agent {
    config: Config,
    registry: Arc<dyn Registry>,
    metrics: Arc<Metrics>,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Agent {
    pub fn new(config: Config, registry: Arc<dyn Registry>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            config,
            registry,
            metrics: Arc::new(Metrics::new()),
            state: Arc::new(state),
        }
    }

    /// Follow lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Bind the configured listen address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), AgentError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Register, serve on `listener` until `shutdown` resolves, then
    /// unregister.
    ///
    /// Fails without serving when the registry health probe fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), AgentError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let grpc_addr = listener.local_addr()?;
        let advertise_addr = self.config.advertise_addr();

        if let Err(e) = self.registry.status().await {
            error!(error = %e, "Registry health probe failed");
            advance(&self.state, LifecycleState::Unregistered);
            return Err(AgentError::RegistryUnavailable(e));
        }

        let lease = match LeaseManager::start(
            self.registry.clone(),
            &self.config.service_name,
            &advertise_addr,
            self.config.lease_settings(),
            self.metrics.clone(),
        )
        .await
        {
            Ok(lease) => lease,
            Err(e) => {
                advance(&self.state, LifecycleState::Unregistered);
                return Err(e.into());
            }
        };
        advance(&self.state, LifecycleState::Registered);

        let service = AgentServiceImpl::new(
            &self.config.service_name,
            self.config.max_concurrent_tasks,
            self.metrics.clone(),
        )
        .into_server();

        // Fan the shutdown signal out to both servers
        let stop = CancellationToken::new();
        let http = match self.config.http_addr {
            Some(addr) => match self.spawn_http(addr, stop.clone()).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    lease.stop().await;
                    advance(&self.state, LifecycleState::Unregistered);
                    return Err(e);
                }
            },
            None => None,
        };

        let state = self.state.clone();
        let grpc_stop = stop.clone();
        let signal = async move {
            tokio::select! {
                _ = shutdown => {}
                _ = grpc_stop.cancelled() => {}
            }
            info!("Shutdown requested, draining in-flight calls");
            advance(&state, LifecycleState::Stopping);
        };

        advance(&self.state, LifecycleState::Serving);
        info!(
            service = %self.config.service_name,
            grpc_addr = %grpc_addr,
            advertise_addr = %advertise_addr,
            "gRPC server listening"
        );

        let served = Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
            .await;

        // the gRPC server may also have stopped on its own
        advance(&self.state, LifecycleState::Stopping);
        stop.cancel();

        lease.stop().await;
        advance(&self.state, LifecycleState::Unregistered);

        if let Some(handle) = http {
            if let Err(e) = handle.await {
                warn!(error = %e, "HTTP server task ended abnormally");
            }
        }

        served?;
        info!("Agent stopped");
        Ok(())
    }

    async fn spawn_http(
        &self,
        addr: SocketAddr,
        stop: CancellationToken,
    ) -> Result<tokio::task::JoinHandle<()>, AgentError> {
        let router = create_router(HttpState {
            service_name: self.config.service_name.clone(),
            lifecycle: self.state.subscribe(),
            metrics: self.metrics.clone(),
            started_at: Utc::now(),
        });

        let listener = TcpListener::bind(addr).await?;
        info!(http_addr = %addr, "HTTP server listening (health, metrics)");

        Ok(tokio::spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(async move { stop.cancelled().await });
            if let Err(e) = server.await {
                error!(error = %e, "HTTP server error");
            }
        }))
    }
}

/// Move to `next` if it is a legal successor of the current state.
fn advance(state: &watch::Sender<LifecycleState>, next: LifecycleState) {
    let mut changed = None;
    state.send_if_modified(|current| {
        if *current != next && current.can_transition_to(next) {
            changed = Some(*current);
            *current = next;
            true
        } else {
            false
        }
    });

    if let Some(previous) = changed {
        info!(from = %previous, to = %next, "Lifecycle transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    #[test]
    fn test_advance_follows_state_machine() {
        let (tx, rx) = watch::channel(LifecycleState::Created);

        advance(&tx, LifecycleState::Serving);
        assert_eq!(*rx.borrow(), LifecycleState::Created);

        advance(&tx, LifecycleState::Registered);
        advance(&tx, LifecycleState::Serving);
        assert_eq!(*rx.borrow(), LifecycleState::Serving);

        advance(&tx, LifecycleState::Stopping);
        advance(&tx, LifecycleState::Stopping);
        advance(&tx, LifecycleState::Unregistered);
        assert_eq!(*rx.borrow(), LifecycleState::Unregistered);
    }

    #[tokio::test]
    async fn test_failed_probe_is_fatal() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.set_unavailable(true);

        let agent = Agent::new(Config::default(), registry.clone());
        let state = agent.subscribe();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = agent.serve(listener, std::future::pending()).await;

        assert!(matches!(result, Err(AgentError::RegistryUnavailable(_))));
        assert_eq!(*state.borrow(), LifecycleState::Unregistered);
        assert_eq!(registry.grant_count(), 0);
    }

    #[tokio::test]
    async fn test_serve_registers_and_unregisters() {
        let registry = Arc::new(MemoryRegistry::new());
        let agent = Agent::new(Config::default(), registry.clone());
        let mut state = agent.subscribe();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(agent.serve(listener, async move {
            let _ = rx.await;
        }));

        state.wait_for(|s| s.is_serving()).await.unwrap();
        assert_eq!(
            registry.value_of("/data_analysis_agent/127.0.0.1:9092").as_deref(),
            Some("127.0.0.1:9092")
        );

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert!(registry.value_of("/data_analysis_agent/127.0.0.1:9092").is_none());
        assert_eq!(*state.borrow(), LifecycleState::Unregistered);
    }
}
