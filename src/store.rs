//! Keyed blob persistence and the snapshot store built on it.

use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::constants::store::{DEFAULT_STORE_DIR, DEFAULT_STORE_FILENAME, SNAPSHOT_KEY};
use crate::data::Snapshot;
use crate::errors::PoolError;

/// Whole-blob keyed storage. Every `put` replaces the previous value.
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`, or `None` when it was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PoolError>;
    /// Replace the blob stored under `key`.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PoolError>;
}

/// File-backed blob store for persistent runs.
pub struct FileBlobStore {
    store: DataStore,
    path: PathBuf,
}

impl fmt::Debug for FileBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBlobStore")
            .field("path", &self.path)
            .finish()
    }
}

impl FileBlobStore {
    /// Open (or create) a blob store at `path`. A directory path gets the default filename.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, PoolError> {
        let path = coerce_store_path(path.into());
        ensure_parent_dir(&path)?;
        let store = DataStore::open(path.as_path()).map_err(map_store_err)?;
        debug!(path = %path.display(), "blob store opened");
        Ok(Self { store, path })
    }

    /// Default store file path under the crate's default store directory.
    pub fn default_path() -> PathBuf {
        Self::default_path_in_dir(DEFAULT_STORE_DIR)
    }

    /// Default store file path inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_STORE_FILENAME)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PoolError> {
        Ok(self
            .store
            .read(key.as_bytes())
            .map_err(map_store_err)?
            .map(|entry| entry.as_ref().to_vec()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PoolError> {
        self.store
            .write(key.as_bytes(), bytes)
            .map_err(map_store_err)?;
        Ok(())
    }
}

/// In-memory blob store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PoolError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| PoolError::Store("blob store lock poisoned".into()))?;
        Ok(blobs.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PoolError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| PoolError::Store("blob store lock poisoned".into()))?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Reads and writes the snapshot blob.
#[derive(Clone)]
pub struct SnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl SnapshotStore {
    /// Snapshot store over `blobs`.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Load the persisted snapshot.
    ///
    /// A missing, unreadable or undecodable blob yields `None`.
    pub fn load(&self) -> Option<Snapshot> {
        let bytes = match self.blobs.get(SNAPSHOT_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = SNAPSHOT_KEY, "no persisted snapshot");
                return None;
            }
            Err(err) => {
                warn!(key = SNAPSHOT_KEY, error = %err, "snapshot read failed");
                return None;
            }
        };
        match serde_json::from_slice::<Snapshot>(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(key = SNAPSHOT_KEY, error = %err, "snapshot decode failed");
                None
            }
        }
    }

    /// Persist `snapshot`, replacing the previous blob.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PoolError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.blobs.put(SNAPSHOT_KEY, &bytes)?;
        debug!(
            key = SNAPSHOT_KEY,
            ordinary = snapshot.ordinary.len(),
            special = snapshot.special.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

fn coerce_store_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_STORE_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), PoolError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn map_store_err(err: io::Error) -> PoolError {
    PoolError::Store(err.to_string())
}
