//! Persistent local storage for exchange snapshots and the currency directory.
//!
//! Snapshots live in an indexed table keyed by base currency. The currency
//! directory is a single serialized value under a fixed key in a flat settings
//! collection. The underlying handle is opened lazily on first use and then
//! shared for the lifetime of the store; a failed open is reported to that
//! caller only and the next operation tries again.

pub mod disk;
pub mod memory;

use crate::core::error::{FxError, Result};
use crate::core::rates::{CurrencyDirectory, ExchangeSnapshot, normalize_code};
use async_trait::async_trait;
use disk::DiskBackend;
use memory::MemoryBackend;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const DIRECTORY_KEY: &str = "currencyCodes";

/// Byte-oriented collection the store is layered over.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Inserts or replaces the value under `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    async fn values(&self) -> Result<Vec<Vec<u8>>>;
}

/// The two collections backing a [`PersistentStore`].
#[derive(Clone)]
pub struct StoreHandle {
    pub snapshots: Arc<dyn KeyValueCollection>,
    pub settings: Arc<dyn KeyValueCollection>,
}

/// Opens the underlying storage. Called at most once per successful open.
pub trait StoreBackend: Send + Sync + 'static {
    fn open(&self) -> Result<StoreHandle>;
}

pub struct PersistentStore {
    backend: Arc<dyn StoreBackend>,
    handle: OnceCell<StoreHandle>,
}

impl PersistentStore {
    pub fn new(backend: impl StoreBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            handle: OnceCell::new(),
        }
    }

    pub fn on_disk(path: impl AsRef<Path>) -> Self {
        Self::new(DiskBackend::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Concurrent first callers share a single open; a failed open leaves the
    /// cell empty.
    async fn handle(&self) -> Result<&StoreHandle> {
        self.handle
            .get_or_try_init(|| async {
                let backend = Arc::clone(&self.backend);
                tokio::task::spawn_blocking(move || backend.open())
                    .await
                    .map_err(|e| FxError::StorageUnavailable(format!("Store open task failed: {e}")))?
            })
            .await
    }

    pub async fn upsert_snapshot(&self, snapshot: &ExchangeSnapshot) -> Result<()> {
        let handle = self.handle().await?;
        let value = serde_json::to_vec(snapshot).map_err(|e| {
            FxError::StorageUnavailable(format!(
                "Failed to encode snapshot for {}: {e}",
                snapshot.base_currency()
            ))
        })?;
        handle
            .snapshots
            .put(snapshot.base_currency().as_bytes(), &value)
            .await?;
        debug!(base = snapshot.base_currency(), "Store PUT snapshot");
        Ok(())
    }

    /// Returns `Ok(None)` when nothing is stored for `base_currency`.
    pub async fn get_snapshot(&self, base_currency: &str) -> Result<Option<ExchangeSnapshot>> {
        let key = normalize_code(base_currency)?;
        let handle = self.handle().await?;
        match handle.snapshots.get(key.as_bytes()).await? {
            Some(raw) => {
                debug!(base = %key, "Store HIT");
                decode_snapshot(&raw).map(Some)
            }
            None => {
                debug!(base = %key, "Store MISS");
                Ok(None)
            }
        }
    }

    /// Every decodable snapshot. Corrupt records are logged and skipped so
    /// they cannot block the rest.
    pub async fn get_all_snapshots(&self) -> Result<Vec<ExchangeSnapshot>> {
        let handle = self.handle().await?;
        let mut snapshots = Vec::new();
        for raw in handle.snapshots.values().await? {
            match decode_snapshot(&raw) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(error = %e, "Skipping unreadable snapshot record"),
            }
        }
        Ok(snapshots)
    }

    /// Replaces the stored directory as a whole.
    pub async fn set_directory(&self, directory: &CurrencyDirectory) -> Result<()> {
        let handle = self.handle().await?;
        let value = serde_json::to_vec(directory).map_err(|e| {
            FxError::StorageUnavailable(format!("Failed to encode currency directory: {e}"))
        })?;
        handle.settings.put(DIRECTORY_KEY.as_bytes(), &value).await?;
        debug!(entries = directory.len(), "Store PUT currency directory");
        Ok(())
    }

    /// Returns `Ok(None)` if no directory was ever stored.
    pub async fn get_directory(&self) -> Result<Option<CurrencyDirectory>> {
        let handle = self.handle().await?;
        let Some(raw) = handle.settings.get(DIRECTORY_KEY.as_bytes()).await? else {
            debug!("Store MISS currency directory");
            return Ok(None);
        };
        let directory = serde_json::from_slice(&raw).map_err(|e| {
            FxError::StorageUnavailable(format!("Corrupt currency directory record: {e}"))
        })?;
        Ok(Some(directory))
    }
}

fn decode_snapshot(raw: &[u8]) -> Result<ExchangeSnapshot> {
    serde_json::from_slice(raw)
        .map_err(|e| FxError::StorageUnavailable(format!("Corrupt snapshot record: {e}")))
}
