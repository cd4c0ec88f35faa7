//! HTTP client for the remote record service

use super::{CreatedRecord, PipelineRemote, RemoteEntry, RemoteError, RemotePipeline};
use crate::config::RemoteConfig;
use crate::pipeline::types::{EntryStatus, NewRecord, PipelineRecord, RecordType};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest<'a> {
    container_id: &'a str,
    stage: &'a str,
    status: EntryStatus,
}

/// Record service reached over HTTP
///
/// Endpoints, relative to the configured base URL:
///
/// - `GET  containers/{id}/pipeline`
/// - `POST records/{id}/move`
/// - `POST containers/{id}/records`
/// - `GET  containers/{id}/records?type=...`
pub struct HttpRemote {
    base: Url,
    client: Client,
}

impl HttpRemote {
    pub fn new(base: Url, config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| RemoteError::Config("API key is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Config(format!("'{}' cannot be a base URL", self.base)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let body = Self::check(response).await?.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl PipelineRemote for HttpRemote {
    async fn fetch_pipeline(&self, container_id: &str) -> Result<RemotePipeline, RemoteError> {
        let url = self.endpoint(&["containers", container_id, "pipeline"])?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    async fn move_record(
        &self,
        container_id: &str,
        record_id: &str,
        new_stage: &str,
        new_status: EntryStatus,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["records", record_id, "move"])?;
        debug!("POST {} -> {} ({})", url, new_stage, new_status.as_str());
        let body = MoveRequest {
            container_id,
            stage: new_stage,
            status: new_status,
        };
        let response = self.client.post(url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_record(
        &self,
        container_id: &str,
        fields: &NewRecord,
    ) -> Result<CreatedRecord, RemoteError> {
        let url = self.endpoint(&["containers", container_id, "records"])?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(fields).send().await?;
        Self::handle_response(response).await
    }

    async fn fetch_records_by_type(
        &self,
        container_id: &str,
        record_type: RecordType,
    ) -> Result<Vec<PipelineRecord>, RemoteError> {
        let mut url = self.endpoint(&["containers", container_id, "records"])?;
        url.query_pairs_mut().append_pair("type", record_type.as_str());
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let entries: Vec<RemoteEntry> = Self::handle_response(response).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let stage = entry.stage.clone().unwrap_or_default();
                entry.into_record(&stage)
            })
            .collect())
    }
}
