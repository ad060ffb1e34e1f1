//! Typed JSON access over a [`KeyValueStore`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{KeyValueStore, StorageKey};
use crate::error::Result;

/// Serializes records to JSON blobs and back.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying raw store.
    #[must_use]
    pub fn raw(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Load the value stored under `key`.
    ///
    /// A value that fails to decode is logged and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself cannot be read.
    pub fn load<T: DeserializeOwned>(&self, key: &StorageKey) -> Result<Option<T>> {
        let key = key.as_key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable stored value");
                Ok(None)
            }
        }
    }

    /// Load the value under `key`, or `T::default()` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself cannot be read.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &StorageKey) -> Result<T> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the store cannot be written.
    pub fn save<T: Serialize + ?Sized>(&self, key: &StorageKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(&key.as_key(), &json)?;
        debug!(key = %key, "Saved record");
        Ok(())
    }

    /// Remove the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn remove(&self, key: &StorageKey) -> Result<()> {
        self.store.remove(&key.as_key())
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}
