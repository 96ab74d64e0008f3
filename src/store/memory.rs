use super::{KeyValueCollection, StoreBackend, StoreHandle};
use crate::core::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory collection. Contents live as long as the collection does.
#[derive(Default)]
pub struct MemoryCollection {
    inner: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let entries = self.inner.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut entries = self.inner.lock().await;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn values(&self) -> Result<Vec<Vec<u8>>> {
        let entries = self.inner.lock().await;
        Ok(entries.values().cloned().collect())
    }
}

/// Backend whose collections are created once and handed out on every open.
pub struct MemoryBackend {
    snapshots: Arc<MemoryCollection>,
    settings: Arc<MemoryCollection>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(MemoryCollection::new()),
            settings: Arc::new(MemoryCollection::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    fn open(&self) -> Result<StoreHandle> {
        debug!("Opening in-memory store");
        Ok(StoreHandle {
            snapshots: Arc::clone(&self.snapshots) as Arc<dyn KeyValueCollection>,
            settings: Arc::clone(&self.settings) as Arc<dyn KeyValueCollection>,
        })
    }
}
