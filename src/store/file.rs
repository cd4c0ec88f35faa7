//! JSON file record store
//!
//! One `<key>.json` file per collection inside a data directory. Saves write
//! to a sibling temp file and rename it over the target, so a reader sees
//! either the previous or the new collection.

use super::{RecordStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create the store, creating `dir` if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                key: dir.display().to_string(),
                source,
            })?;
        info!("JSON file store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Anything outside `[A-Za-z0-9_-]` becomes `_`,
    /// so keys can never address paths outside the data directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn save(&self, key: &str, json: String) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("data")).await.unwrap();

        assert_eq!(store.load("contacts").await.unwrap(), None);

        store.save("contacts", "[1,2,3]".into()).await.unwrap();
        assert_eq!(store.load("contacts").await.unwrap().as_deref(), Some("[1,2,3]"));
        assert!(store.dir().join("contacts.json").exists());

        // full rewrite replaces the previous content
        store.save("contacts", "[]".into()).await.unwrap();
        assert_eq!(store.load("contacts").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store.save("../evil/key", "[]".into()).await.unwrap();
        assert!(dir.path().join("___evil_key.json").exists());
    }
}
