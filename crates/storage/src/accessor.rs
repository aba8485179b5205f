use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::KeyValueStore;

/// Typed JSON view over a [`KeyValueStore`] that never surfaces failures.
///
/// An unavailable backend reads as "nothing stored" and swallows writes, so
/// callers can treat persistence as best-effort. A stored value that no
/// longer decodes as `T` also reads as absent.
#[derive(Clone)]
pub struct StorageAccessor {
    store: Arc<dyn KeyValueStore>,
}

impl StorageAccessor {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(key, %error, "storage read failed; using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(key, %error, "stored value is not valid for requested type");
                None
            }
        }
    }

    pub async fn read_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.read(key).await.unwrap_or(default)
    }

    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(key, %error, "value could not be serialized; write dropped");
                return;
            }
        };
        if let Err(error) = self.store.put(key, &raw).await {
            warn!(key, %error, "storage write failed; ignoring");
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(error) = self.store.delete(key).await {
            warn!(key, %error, "storage remove failed; ignoring");
        }
    }
}
