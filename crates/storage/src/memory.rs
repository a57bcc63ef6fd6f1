use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::repository::{CollectionStore, StorageError};

/// In-memory collection transport for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    collections: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl CollectionStore for InMemoryBackend {
    async fn get(&self, collection: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .collections
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(guard.get(collection).cloned())
    }

    async fn set(&self, collection: &str, payload: &str) -> Result<(), StorageError> {
        let mut guard = self
            .collections
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        guard.insert(collection.to_string(), payload.to_string());
        Ok(())
    }

    async fn remove(&self, collection: &str) -> Result<(), StorageError> {
        let mut guard = self
            .collections
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        guard.remove(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let backend = InMemoryBackend::new();

        assert_eq!(backend.get("k").await.unwrap(), None);

        backend.set("k", "v1").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v1".to_string()));

        backend.set("k", "v2").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v2".to_string()));

        backend.remove("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
