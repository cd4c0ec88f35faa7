//! Remote record service
//!
//! The pipeline board reads and writes deals through this contract. Two
//! implementations exist: [`HttpRemote`] talks to an external JSON service,
//! [`StoreRemote`] serves the same contract from the local record store.
//! Callers treat every failure as recoverable (seed fallback on reads,
//! unsynced ledger on writes).

mod http;
mod store_backed;

pub use http::HttpRemote;
pub use store_backed::StoreRemote;

use crate::pipeline::types::{EntryStatus, NewRecord, PipelineRecord, RecordType};
use crate::store::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid remote configuration: {0}")]
    Config(String),
}

/// One entry as delivered by the record service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Only present on flat listings; grouped listings carry it as the map key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, alias = "recordType", rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RemoteEntry {
    /// Convert to a pipeline record whose raw stage is `stage`
    pub fn into_record(self, stage: &str) -> PipelineRecord {
        PipelineRecord {
            id: self.id,
            display_name: self.display_name,
            company: self.company,
            title: self.title,
            raw_stage: stage.to_string(),
            canonical_stage: String::new(),
            record_type: self
                .record_type
                .as_deref()
                .map(RecordType::from_label)
                .unwrap_or_default(),
            value: self.value,
            probability: self.probability,
            source: self.source,
        }
    }

    pub fn from_record(record: &PipelineRecord) -> Self {
        Self {
            id: record.id.clone(),
            display_name: record.display_name.clone(),
            company: record.company.clone(),
            title: record.title.clone(),
            stage: Some(record.raw_stage.clone()),
            record_type: Some(record.record_type.as_str().to_string()),
            value: record.value,
            probability: record.probability,
            source: record.source.clone(),
        }
    }
}

/// Entries of one remote stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStage {
    #[serde(default)]
    pub entries: Vec<RemoteEntry>,
}

/// `fetchPipeline` payload: entries grouped under their raw stage key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePipeline {
    #[serde(default)]
    pub stages: BTreeMap<String, RemoteStage>,
}

impl RemotePipeline {
    /// Flatten into records, raw stage taken from the map key
    pub fn into_records(self) -> Vec<PipelineRecord> {
        self.stages
            .into_iter()
            .flat_map(|(stage, bucket)| {
                bucket
                    .entries
                    .into_iter()
                    .map(move |entry| entry.into_record(&stage))
            })
            .collect()
    }

    /// Group records under their raw stage
    pub fn from_records(records: &[PipelineRecord]) -> Self {
        let mut stages: BTreeMap<String, RemoteStage> = BTreeMap::new();
        for record in records {
            let mut entry = RemoteEntry::from_record(record);
            entry.stage = None;
            stages
                .entry(record.raw_stage.clone())
                .or_default()
                .entries
                .push(entry);
        }
        Self { stages }
    }
}

/// `createRecord` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

/// Contract of the remote record service
#[async_trait]
pub trait PipelineRemote: Send + Sync {
    async fn fetch_pipeline(&self, container_id: &str) -> Result<RemotePipeline, RemoteError>;

    async fn move_record(
        &self,
        container_id: &str,
        record_id: &str,
        new_stage: &str,
        new_status: EntryStatus,
    ) -> Result<(), RemoteError>;

    async fn create_record(
        &self,
        container_id: &str,
        fields: &NewRecord,
    ) -> Result<CreatedRecord, RemoteError>;

    async fn fetch_records_by_type(
        &self,
        container_id: &str,
        record_type: RecordType,
    ) -> Result<Vec<PipelineRecord>, RemoteError>;

    /// Take `records` over as the container's collection if it has none yet.
    /// `Ok(true)` means the container now holds a collection that later
    /// writes can land on. A service that owns its data never adopts.
    async fn adopt(&self, _container_id: &str, _records: &[PipelineRecord]) -> Result<bool, RemoteError> {
        Ok(false)
    }
}
