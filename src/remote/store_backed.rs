//! Record service served from the local record store
//!
//! Each container is a flat collection of records stored under the container
//! id. Every write rewrites the whole collection.

use super::{CreatedRecord, PipelineRemote, RemoteError, RemotePipeline};
use crate::pipeline::types::{EntryStatus, NewRecord, PipelineRecord, RecordType};
use crate::store::{Collection, RecordStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub struct StoreRemote {
    store: Arc<dyn RecordStore>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl StoreRemote {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn collection(&self, container_id: &str) -> Collection<PipelineRecord> {
        Collection::new(self.store.clone(), container_id)
    }

    async fn existing(&self, container_id: &str) -> Result<Vec<PipelineRecord>, RemoteError> {
        self.collection(container_id)
            .load()
            .await?
            .ok_or_else(|| RemoteError::NotFound(format!("container '{}'", container_id)))
    }
}

#[async_trait]
impl PipelineRemote for StoreRemote {
    async fn fetch_pipeline(&self, container_id: &str) -> Result<RemotePipeline, RemoteError> {
        let records = self.existing(container_id).await?;
        Ok(RemotePipeline::from_records(&records))
    }

    async fn move_record(
        &self,
        container_id: &str,
        record_id: &str,
        new_stage: &str,
        _new_status: EntryStatus,
    ) -> Result<(), RemoteError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.existing(container_id).await?;

        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| RemoteError::NotFound(format!("record '{}'", record_id)))?;
        record.raw_stage = new_stage.to_string();
        record.canonical_stage = new_stage.to_string();

        self.collection(container_id).save(&records).await?;
        debug!("Moved '{}' to '{}' in '{}'", record_id, new_stage, container_id);
        Ok(())
    }

    async fn create_record(
        &self,
        container_id: &str,
        fields: &NewRecord,
    ) -> Result<CreatedRecord, RemoteError> {
        let _guard = self.write_lock.lock().await;
        let collection = self.collection(container_id);
        let mut records = collection.load().await?.unwrap_or_default();

        let id = Uuid::new_v4().to_string();
        let stage = fields.stage.clone().unwrap_or_default();
        records.push(fields.clone().into_record(id.clone(), stage));

        collection.save(&records).await?;
        debug!("Created '{}' in '{}'", id, container_id);
        Ok(CreatedRecord { id })
    }

    async fn fetch_records_by_type(
        &self,
        container_id: &str,
        record_type: RecordType,
    ) -> Result<Vec<PipelineRecord>, RemoteError> {
        let records = self.existing(container_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.record_type == record_type)
            .collect())
    }

    async fn adopt(&self, container_id: &str, records: &[PipelineRecord]) -> Result<bool, RemoteError> {
        let _guard = self.write_lock.lock().await;
        let collection = self.collection(container_id);
        if collection.load().await?.is_none() {
            collection.save(records).await?;
            debug!("Adopted {} records as '{}'", records.len(), container_id);
        }
        Ok(true)
    }
}
