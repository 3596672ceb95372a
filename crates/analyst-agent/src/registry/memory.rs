//! In-process registry with fault injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use analyst_core::LeaseId;
use async_trait::async_trait;

use super::{Registry, RegistryError};

#[derive(Default)]
struct Inner {
    next_lease: i64,
    leases: HashSet<LeaseId>,
    entries: BTreeMap<String, (String, LeaseId)>,
    failing_keep_alives: usize,
    unavailable: bool,
    grants: usize,
    renewed: Vec<LeaseId>,
}

/// Registry kept in memory.
///
/// Used by the `memory` backend for local runs and by tests to simulate
/// registry failures.
#[derive(Default)]
pub struct MemoryRegistry {
    inner: Mutex<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `count` keep-alive calls fail.
    pub fn fail_next_keep_alives(&self, count: usize) {
        self.inner().failing_keep_alives = count;
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner().unavailable = unavailable;
    }

    /// Expire a lease now, removing every key bound to it.
    pub fn expire_lease(&self, lease: LeaseId) {
        let mut inner = self.inner();
        inner.leases.remove(&lease);
        inner.entries.retain(|_, (_, bound)| *bound != lease);
    }

    /// Lease `key` is currently bound to.
    pub fn lease_of(&self, key: &str) -> Option<LeaseId> {
        self.inner().entries.get(key).map(|(_, lease)| *lease)
    }

    /// Value stored under `key`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.inner().entries.get(key).map(|(value, _)| value.clone())
    }

    /// Number of leases granted so far.
    pub fn grant_count(&self) -> usize {
        self.inner().grants
    }

    /// Leases passed to successful keep-alive calls, in call order.
    pub fn renewed_leases(&self) -> Vec<LeaseId> {
        self.inner().renewed.clone()
    }

    fn check_available(inner: &Inner) -> Result<(), RegistryError> {
        if inner.unavailable {
            return Err(RegistryError::Unavailable(
                "memory registry switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn status(&self) -> Result<(), RegistryError> {
        Self::check_available(&self.inner())
    }

    async fn grant_lease(&self, _ttl_secs: i64) -> Result<LeaseId, RegistryError> {
        let mut inner = self.inner();
        Self::check_available(&inner)?;

        inner.next_lease += 1;
        let lease = LeaseId::new(inner.next_lease);
        inner.leases.insert(lease);
        inner.grants += 1;
        Ok(lease)
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<(), RegistryError> {
        let mut inner = self.inner();
        Self::check_available(&inner)?;

        if inner.failing_keep_alives > 0 {
            inner.failing_keep_alives -= 1;
            return Err(RegistryError::Unavailable(
                "injected keep-alive failure".to_string(),
            ));
        }
        if !inner.leases.contains(&lease) {
            return Err(RegistryError::LeaseExpired(lease));
        }

        inner.renewed.push(lease);
        Ok(())
    }

    async fn put(&self, key: &str, value: &str, lease: LeaseId) -> Result<(), RegistryError> {
        let mut inner = self.inner();
        Self::check_available(&inner)?;

        if !inner.leases.contains(&lease) {
            return Err(RegistryError::LeaseExpired(lease));
        }
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), lease));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner();
        Self::check_available(&inner)?;

        inner.entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError> {
        let inner = self.inner();
        Self::check_available(&inner)?;

        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, (value, _))| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_list() {
        let registry = MemoryRegistry::new();
        let lease = registry.grant_lease(10).await.unwrap();
        registry.put("/svc/a:1", "a:1", lease).await.unwrap();
        registry.put("/svc/b:2", "b:2", lease).await.unwrap();
        registry.put("/other/c:3", "c:3", lease).await.unwrap();

        let entries = registry.list("/svc/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("/svc/a:1".to_string(), "a:1".to_string()),
                ("/svc/b:2".to_string(), "b:2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_expire_lease_drops_keys() {
        let registry = MemoryRegistry::new();
        let lease = registry.grant_lease(10).await.unwrap();
        registry.put("/svc/a:1", "a:1", lease).await.unwrap();

        registry.expire_lease(lease);

        assert!(registry.lease_of("/svc/a:1").is_none());
        assert!(matches!(
            registry.keep_alive(lease).await,
            Err(RegistryError::LeaseExpired(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_keep_alive_failures() {
        let registry = MemoryRegistry::new();
        let lease = registry.grant_lease(10).await.unwrap();
        registry.fail_next_keep_alives(2);

        assert!(registry.keep_alive(lease).await.is_err());
        assert!(registry.keep_alive(lease).await.is_err());
        assert!(registry.keep_alive(lease).await.is_ok());
        assert_eq!(registry.renewed_leases(), vec![lease]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let registry = MemoryRegistry::new();
        registry.set_unavailable(true);
        assert!(registry.status().await.is_err());
        assert!(registry.grant_lease(10).await.is_err());

        registry.set_unavailable(false);
        assert!(registry.status().await.is_ok());
    }
}
