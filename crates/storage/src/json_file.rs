use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::repository::{CollectionStore, StorageError, Store};

/// File-per-collection transport: each named collection lives in
/// `<dir>/<name>.json`. Writes go through a sibling temp file and a rename so
/// a crash mid-write never leaves a half-written collection behind.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Opens (and creates, if needed) the data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(map_io)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }
}

fn map_io(err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => StorageError::QuotaExceeded,
        _ => StorageError::Io(err.to_string()),
    }
}

#[async_trait]
impl CollectionStore for JsonFileBackend {
    async fn get(&self, collection: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(collection)) {
            Ok(payload) => Ok(Some(payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(err)),
        }
    }

    async fn set(&self, collection: &str, payload: &str) -> Result<(), StorageError> {
        let target = self.path(collection);
        let staged = self.dir.join(format!("{collection}.json.tmp"));
        std::fs::write(&staged, payload).map_err(map_io)?;
        std::fs::rename(&staged, &target).map_err(map_io)
    }

    async fn remove(&self, collection: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(collection)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io(err)),
        }
    }
}

impl Store {
    /// Store backed by JSON files under the given data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be created.
    pub fn json_file(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self::new(std::sync::Arc::new(JsonFileBackend::open(dir)?)))
    }
}
