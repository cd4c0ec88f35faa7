//! In-memory record store
//!
//! Process-local; contents are lost on restart.

use super::{RecordStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(key).cloned())
    }

    async fn save(&self, key: &str, json: String) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections.insert(key.to_string(), json);
        Ok(())
    }
}
