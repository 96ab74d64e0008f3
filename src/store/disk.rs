use super::{KeyValueCollection, StoreBackend, StoreHandle};
use crate::core::error::{FxError, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const SNAPSHOT_PARTITION: &str = "exchange";
const SETTINGS_PARTITION: &str = "settings";

/// A fjall partition. Writes are synced before returning so they survive a
/// restart.
pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Keyspace, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.partition.get(key)?.map(|value| value.to_vec()))
    }

    /// The insert and fsync run on the blocking pool.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let keyspace = self.keyspace.clone();
        let partition = self.partition.clone();
        let (key, value) = (key.to_vec(), value.to_vec());
        tokio::task::spawn_blocking(move || -> Result<()> {
            partition.insert(key, value)?;
            keyspace.persist(PersistMode::SyncAll)?;
            Ok(())
        })
        .await
        .map_err(|e| FxError::StorageUnavailable(format!("Store write task failed: {e}")))?
    }

    async fn values(&self) -> Result<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        for item in self.partition.iter() {
            let (_key, value) = item?;
            values.push(value.to_vec());
        }
        Ok(values)
    }
}

/// Opens a fjall keyspace at `path` with one partition for snapshots and one
/// for flat settings.
pub struct DiskBackend {
    path: PathBuf,
}

impl DiskBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StoreBackend for DiskBackend {
    fn open(&self) -> Result<StoreHandle> {
        debug!("Opening store at {}", self.path.display());
        let keyspace = Config::new(&self.path).open()?;
        let snapshots =
            keyspace.open_partition(SNAPSHOT_PARTITION, PartitionCreateOptions::default())?;
        let settings =
            keyspace.open_partition(SETTINGS_PARTITION, PartitionCreateOptions::default())?;

        Ok(StoreHandle {
            snapshots: Arc::new(DiskCollection::new(keyspace.clone(), snapshots)),
            settings: Arc::new(DiskCollection::new(keyspace, settings)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disk_collection_get_put() {
        let dir = tempdir().unwrap();
        let handle = DiskBackend::new(dir.path()).open().unwrap();

        assert!(handle.snapshots.get(b"key1").await.unwrap().is_none());

        handle.snapshots.put(b"key1", b"123").await.unwrap();
        assert_eq!(
            handle.snapshots.get(b"key1").await.unwrap(),
            Some(b"123".to_vec())
        );

        // Partitions are independent
        assert!(handle.settings.get(b"key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_collection_values() {
        let dir = tempdir().unwrap();
        let handle = DiskBackend::new(dir.path()).open().unwrap();

        handle.snapshots.put(b"a", b"1").await.unwrap();
        handle.snapshots.put(b"b", b"2").await.unwrap();
        handle.snapshots.put(b"a", b"3").await.unwrap();

        let mut values = handle.snapshots.values().await.unwrap();
        values.sort();
        assert_eq!(values, vec![b"2".to_vec(), b"3".to_vec()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disk_collection_concurrent_puts() {
        let dir = tempdir().unwrap();
        let handle = DiskBackend::new(dir.path()).open().unwrap();

        let writes = (0..16u8).map(|i| {
            let snapshots = Arc::clone(&handle.snapshots);
            tokio::spawn(async move { snapshots.put(&[i], &[i]).await })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        assert_eq!(handle.snapshots.values().await.unwrap().len(), 16);
        assert_eq!(handle.snapshots.get(&[7]).await.unwrap(), Some(vec![7]));
    }

    #[test]
    fn test_open_fails_when_path_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = DiskBackend::new(file.path()).open();
        assert!(matches!(
            result,
            Err(crate::core::FxError::StorageUnavailable(_))
        ));
    }
}
