//! Lease-based self-registration.
//!
//! [`LeaseManager::start`] grants a lease, publishes the instance key bound
//! to it and spawns a renewal loop. The loop refreshes the lease every
//! `ttl / 2`. When a refresh fails it grants a fresh lease and publishes the
//! key again, retrying after a fixed backoff until the registry comes back.
//! Only cancellation ends the loop.

use std::sync::Arc;
use std::time::Duration;

use analyst_core::LeaseId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;
use crate::registry::{registry_key, Registry, RegistryError};

/// Lease timing.
#[derive(Debug, Clone, Copy)]
pub struct LeaseSettings {
    /// Lease time-to-live in seconds.
    pub ttl_secs: i64,

    /// Pause between failed re-registration attempts.
    pub retry_backoff: Duration,
}

impl LeaseSettings {
    /// Interval between keep-alives.
    pub fn renew_interval(&self) -> Duration {
        Duration::from_millis(self.ttl_secs.max(1) as u64 * 1000 / 2)
    }
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Owner of the registry entry for this instance.
pub struct LeaseManager {
    key: String,
    registry: Arc<dyn Registry>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LeaseManager {
    /// Register `address` under `service_name` and start renewing.
    ///
    /// Fails only if the first registration fails.
    pub async fn start(
        registry: Arc<dyn Registry>,
        service_name: &str,
        address: &str,
        settings: LeaseSettings,
        metrics: Arc<Metrics>,
    ) -> Result<Self, RegistryError> {
        let key = registry_key(service_name, address);
        let lease = register(registry.as_ref(), &key, address, settings.ttl_secs).await?;

        info!(
            key = %key,
            lease_id = %lease,
            ttl_secs = settings.ttl_secs,
            "Registered service"
        );

        let cancel = CancellationToken::new();
        let renewal = Renewal {
            registry: registry.clone(),
            key: key.clone(),
            address: address.to_string(),
            settings,
            metrics,
        };
        let handle = tokio::spawn(renewal.run(lease, cancel.clone()));

        Ok(Self {
            key,
            registry,
            cancel,
            handle,
        })
    }

    /// Registry key this instance is published under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true while the renewal loop is alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop renewing and remove the key.
    ///
    /// A failed delete is logged; the lease then expires on its own.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Lease renewal task ended abnormally");
        }

        match self.registry.delete(&self.key).await {
            Ok(()) => info!(key = %self.key, "Unregistered service"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to delete registry key"),
        }
    }
}

/// Grant a lease and publish `key` bound to it.
async fn register(
    registry: &dyn Registry,
    key: &str,
    address: &str,
    ttl_secs: i64,
) -> Result<LeaseId, RegistryError> {
    let lease = registry.grant_lease(ttl_secs).await?;
    registry.put(key, address, lease).await?;
    Ok(lease)
}

/// State of the renewal loop. The current lease lives only in [`Renewal::run`].
struct Renewal {
    registry: Arc<dyn Registry>,
    key: String,
    address: String,
    settings: LeaseSettings,
    metrics: Arc<Metrics>,
}

impl Renewal {
    async fn run(self, mut lease: LeaseId, cancel: CancellationToken) {
        let interval = self.settings.renew_interval();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let renewed = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.registry.keep_alive(lease) => result,
            };

            match renewed {
                Ok(()) => {
                    self.metrics.record_lease_renewal();
                    debug!(lease_id = %lease, "Lease renewed");
                    continue;
                }
                Err(e) => {
                    warn!(lease_id = %lease, error = %e, "Lease renewal failed, re-registering");
                }
            }

            match self.reacquire(&cancel).await {
                Some(new_lease) => {
                    info!(
                        key = %self.key,
                        old_lease_id = %lease,
                        lease_id = %new_lease,
                        "Re-registered service"
                    );
                    lease = new_lease;
                }
                None => break,
            }
        }

        debug!(key = %self.key, "Lease renewal loop stopped");
    }

    /// Grant a new lease and publish the key, retrying until it works.
    ///
    /// Returns `None` when cancelled first.
    async fn reacquire(&self, cancel: &CancellationToken) -> Option<LeaseId> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = register(
                    self.registry.as_ref(),
                    &self.key,
                    &self.address,
                    self.settings.ttl_secs,
                ) => result,
            };

            match attempt {
                Ok(lease) => {
                    self.metrics.record_lease_reacquired();
                    return Some(lease);
                }
                Err(e) => {
                    self.metrics.record_reregistration_failure();
                    error!(
                        key = %self.key,
                        error = %e,
                        retry_in_secs = self.settings.retry_backoff.as_secs(),
                        "Re-registration failed"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.settings.retry_backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    const KEY: &str = "/data_analysis_agent/127.0.0.1:9092";

    async fn start(registry: &Arc<MemoryRegistry>, metrics: &Arc<Metrics>) -> LeaseManager {
        LeaseManager::start(
            registry.clone(),
            "data_analysis_agent",
            "127.0.0.1:9092",
            LeaseSettings::default(),
            metrics.clone(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_renew_interval_is_half_ttl() {
        let settings = LeaseSettings {
            ttl_secs: 10,
            retry_backoff: Duration::from_secs(5),
        };
        assert_eq!(settings.renew_interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_key() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;

        assert_eq!(manager.key(), KEY);
        assert_eq!(registry.value_of(KEY).as_deref(), Some("127.0.0.1:9092"));
        assert_eq!(registry.grant_count(), 1);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_renews_every_half_ttl() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;
        let lease = registry.lease_of(KEY).unwrap();

        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(registry.renewed_leases(), vec![lease, lease, lease]);
        assert_eq!(metrics.lease_renewals(), 3);
        assert_eq!(registry.grant_count(), 1);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_keep_alive_reacquires_lease() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;
        let first = registry.lease_of(KEY).unwrap();

        registry.fail_next_keep_alives(1);
        tokio::time::sleep(Duration::from_secs(11)).await;

        let second = registry.lease_of(KEY).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.grant_count(), 2);
        assert_eq!(metrics.lease_reacquisitions(), 1);
        // later renewals use the new lease
        assert_eq!(registry.renewed_leases(), vec![second]);
        assert!(manager.is_running());

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_reacquired() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;
        let first = registry.lease_of(KEY).unwrap();

        registry.expire_lease(first);
        assert!(registry.lease_of(KEY).is_none());

        tokio::time::sleep(Duration::from_secs(6)).await;

        let second = registry.lease_of(KEY).unwrap();
        assert_ne!(first, second);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_registry_never_stops_loop() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;

        registry.set_unavailable(true);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(manager.is_running());
        assert!(metrics.reregistration_failures() > 1);

        registry.set_unavailable(false);
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(registry.grant_count(), 2);
        assert!(registry.lease_of(KEY).is_some());

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_deletes_key() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;

        manager.stop().await;

        assert!(registry.value_of(KEY).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_with_unreachable_registry() {
        let registry = Arc::new(MemoryRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let manager = start(&registry, &metrics).await;

        registry.set_unavailable(true);
        manager.stop().await;

        // delete failed; the entry stays until its lease expires
        assert!(registry.lease_of(KEY).is_some());
    }

    #[tokio::test]
    async fn test_start_fails_when_registry_down() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.set_unavailable(true);

        let result = LeaseManager::start(
            registry.clone(),
            "svc",
            "127.0.0.1:1",
            LeaseSettings::default(),
            Arc::new(Metrics::new()),
        )
        .await;

        assert!(result.is_err());
    }
}
