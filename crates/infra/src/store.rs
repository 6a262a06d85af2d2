//! Persistence for the system list.
//!
//! The whole list lives in one JSON array. Saves rewrite the file through a
//! temporary sibling and a rename so a crash never leaves a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use warehouse_core::{DomainError, SystemName};
use warehouse_inventory::StorageSystem;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: invalid system list: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode system list: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        DomainError::persistence(value.to_string())
    }
}

/// Storage for [`StorageSystem`] records.
///
/// Implementations keep one record per system name; `save` replaces it.
pub trait SystemStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<StorageSystem>, StoreError>;
    fn save(&self, system: &StorageSystem) -> Result<(), StoreError>;
    /// Force everything held to durable storage.
    fn flush(&self) -> Result<(), StoreError>;
}

impl<S> SystemStore for Arc<S>
where
    S: SystemStore + ?Sized,
{
    fn load_all(&self) -> Result<Vec<StorageSystem>, StoreError> {
        (**self).load_all()
    }

    fn save(&self, system: &StorageSystem) -> Result<(), StoreError> {
        (**self).save(system)
    }

    fn flush(&self) -> Result<(), StoreError> {
        (**self).flush()
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySystemStore {
    inner: Mutex<BTreeMap<SystemName, StorageSystem>>,
}

impl InMemorySystemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_systems(systems: impl IntoIterator<Item = StorageSystem>) -> Self {
        Self {
            inner: Mutex::new(systems.into_iter().map(|s| (s.name().clone(), s)).collect()),
        }
    }
}

impl SystemStore for InMemorySystemStore {
    fn load_all(&self) -> Result<Vec<StorageSystem>, StoreError> {
        let map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn save(&self, system: &StorageSystem) -> Result<(), StoreError> {
        let mut map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        map.insert(system.name().clone(), system.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// JSON file store. Every `save` rewrites the file.
#[derive(Debug)]
pub struct JsonFileSystemStore {
    path: PathBuf,
    cache: Mutex<BTreeMap<SystemName, StorageSystem>>,
}

impl JsonFileSystemStore {
    /// Open `path`, creating it as an empty list when missing.
    ///
    /// An unreadable or invalid file is an error; nothing is overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let systems = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<StorageSystem>>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no system list found; starting empty");
                write_atomically(&path, b"[]")?;
                Vec::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut cache = BTreeMap::new();
        for system in systems {
            cache.insert(system.name().clone(), system);
        }
        info!(path = %path.display(), systems = cache.len(), "opened system store");
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, cache: &BTreeMap<SystemName, StorageSystem>) -> Result<(), StoreError> {
        let systems: Vec<&StorageSystem> = cache.values().collect();
        let bytes = serde_json::to_vec_pretty(&systems).map_err(StoreError::Encode)?;
        write_atomically(&self.path, &bytes)?;
        debug!(path = %self.path.display(), systems = systems.len(), "wrote system list");
        Ok(())
    }
}

impl SystemStore for JsonFileSystemStore {
    fn load_all(&self) -> Result<Vec<StorageSystem>, StoreError> {
        let cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(cache.values().cloned().collect())
    }

    fn save(&self, system: &StorageSystem) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        cache.insert(system.name().clone(), system.clone());
        self.write(&cache)
    }

    fn flush(&self) -> Result<(), StoreError> {
        let cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        self.write(&cache)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)
}
