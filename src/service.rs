//! Single-writer access to a registry with periodic snapshot saves
use crate::config::Config;
use crate::error::Result;
use crate::persistence::{open_store, SnapshotStore};
use crate::registry::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the registry behind one async mutex. All mutations are serialized
/// through [`LedgerService::write`]; clones share the same registry.
#[derive(Clone)]
pub struct LedgerService {
    registry: Arc<Mutex<Registry>>,
    store: Arc<dyn SnapshotStore>,
    dirty: Arc<AtomicBool>,
}

impl LedgerService {
    pub fn new(registry: Registry, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            store,
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the configured store and restore the registry from it
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage)?;
        let registry = Registry::load_from(&config.ledger, store.as_ref())?;
        info!(
            store = %store.describe(),
            units = registry.unit_map().len(),
            groups = registry.group_map().len(),
            members = registry.member_map().len(),
            "Ledger service ready"
        );
        Ok(Self::new(registry, store))
    }

    /// Run a mutation with exclusive access. The forest is marked dirty even
    /// when `op` fails, since a cascade may have applied partially.
    pub async fn write<T>(&self, op: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
        let mut registry = self.registry.lock().await;
        let result = op(&mut registry);
        self.dirty.store(true, Ordering::SeqCst);
        result
    }

    pub async fn read<T>(&self, op: impl FnOnce(&Registry) -> T) -> T {
        let registry = self.registry.lock().await;
        op(&registry)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Persist the forest if it changed since the last save. Returns whether
    /// a snapshot was written.
    pub async fn flush(&self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let snapshot = self.registry.lock().await.snapshot_all();
        if let Err(e) = self.store.save(&snapshot) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }

        info!(store = %self.store.describe(), chains = snapshot.chain_count(), "Snapshot saved");
        Ok(true)
    }

    /// Flush every `interval` until the returned handle is aborted
    pub fn spawn_autosave(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.flush().await {
                    Ok(true) => debug!("Autosave wrote snapshot"),
                    Ok(false) => {}
                    Err(e) => warn!("Autosave failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use crate::registry::MemberParent;
    use crate::transaction::Profile;

    fn service() -> (LedgerService, InMemoryPersistence) {
        let store = InMemoryPersistence::new();
        let service = LedgerService::new(Registry::new(1), Arc::new(store.clone()));
        (service, store)
    }

    #[tokio::test]
    async fn test_flush_only_when_dirty() {
        let (service, store) = service();
        assert!(!service.flush().await.unwrap());
        assert!(store.raw().is_none());

        service
            .write(|reg| reg.create_unit("U1", Profile::new("Engineering")))
            .await
            .unwrap();
        assert!(service.is_dirty());
        assert!(service.flush().await.unwrap());
        assert!(!service.is_dirty());
        assert!(!service.flush().await.unwrap());

        let saved = store.load().unwrap().unwrap();
        assert!(saved.units.contains_key("U1"));
    }

    #[tokio::test]
    async fn test_writes_are_serialized_across_clones() {
        let (service, _store) = service();
        service
            .write(|reg| reg.create_unit("U1", Profile::new("Engineering")))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let svc = service.clone();
            handles.push(tokio::spawn(async move {
                svc.write(move |reg| {
                    reg.create_member(&format!("M{}", i), MemberParent::Unit("U1"), Profile::new("Member"))
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count = service.read(|reg| reg.members().len()).await;
        assert_eq!(count, 4);
        assert!(service.read(|reg| reg.validate_all().overall_valid).await);
    }

    #[tokio::test]
    async fn test_autosave_persists_changes() {
        let (service, store) = service();
        let handle = service.spawn_autosave(Duration::from_millis(20));

        service
            .write(|reg| reg.create_unit("U1", Profile::new("Engineering")))
            .await
            .unwrap();

        let mut saved = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            saved = store.load().unwrap();
            if saved.is_some() {
                break;
            }
        }
        handle.abort();

        let saved = saved.expect("autosave never ran");
        assert!(saved.units.contains_key("U1"));
    }

    #[tokio::test]
    async fn test_open_memory_backend_starts_empty() {
        let mut config = Config::default();
        config.ledger.difficulty = 1;
        config.storage.backend = crate::config::StorageBackend::Memory;

        let service = LedgerService::open(&config).unwrap();
        assert_eq!(service.read(|reg| reg.system_stats().total_units).await, 0);
        assert_eq!(service.store().describe(), "memory");
    }
}
