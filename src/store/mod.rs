//! Record store
//!
//! Durable keyed collections. Each collection is a JSON array stored under a
//! plain string key (`"contacts"`, `"bdRoadmapItems"`, ...). Collections are
//! read in full and rewritten in full on every save: there are no partial
//! updates and no indexes, so a mutation costs O(n) in the collection size.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::seed::DataSource;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed collection '{key}': {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed storage of serialized collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Raw JSON of a collection, `None` when the key was never written
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the whole collection stored under `key`
    async fn save(&self, key: &str, json: String) -> Result<(), StoreError>;
}

/// Typed view of one collection in a [`RecordStore`]
pub struct Collection<T> {
    store: Arc<dyn RecordStore>,
    key: String,
    _items: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _items: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Collection<T> {
    pub fn new(store: Arc<dyn RecordStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _items: PhantomData,
        }
    }

    /// Load and decode the collection; `None` when absent
    pub async fn load(&self) -> Result<Option<Vec<T>>, StoreError> {
        let Some(raw) = self.store.load(&self.key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Json {
                key: self.key.clone(),
                source,
            })
    }

    /// Load the collection, substituting `seed` when it is absent or unreadable.
    /// Never fails.
    pub async fn load_or_seed(&self, seed: impl FnOnce() -> Vec<T>) -> (Vec<T>, DataSource) {
        match self.load().await {
            Ok(Some(items)) => {
                debug!("Loaded {} items from '{}'", items.len(), self.key);
                (items, DataSource::Live)
            }
            Ok(None) => {
                warn!("Collection '{}' not found, using seed data", self.key);
                (seed(), DataSource::Fallback)
            }
            Err(e) => {
                warn!("Failed to load '{}', using seed data: {}", self.key, e);
                (seed(), DataSource::Fallback)
            }
        }
    }

    /// Serialize and rewrite the whole collection
    pub async fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Json {
            key: self.key.clone(),
            source,
        })?;
        self.store.save(&self.key, json).await?;
        debug!("Saved {} items to '{}'", items.len(), self.key);
        Ok(())
    }
}
