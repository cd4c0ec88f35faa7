//! Pipeline board service
//!
//! Holds one in-memory board per container and wires the normalizer,
//! aggregator and transition policy to the remote record service.
//!
//! Stage moves follow a command model: the move is applied to the board
//! first and returned as a [`StageMove`]; persisting it is a separate step
//! whose outcome is reported as a [`SyncStatus`]. A failed write is never
//! rolled back. It lands in the container's unsynced ledger, survives
//! reloads (the local change is re-applied on top of fresh data) and can be
//! retried with [`PipelineService::resync`].

use crate::error::{not_found_error, AppError};
use crate::pipeline::aggregator::{PipelineAggregator, PipelineTotals, StageGroup, StageSummary};
use crate::pipeline::funnel::Funnel;
use crate::pipeline::normalizer::StageNormalizer;
use crate::pipeline::transition::{StageMove, StageTransitionPolicy};
use crate::pipeline::types::{NewRecord, PipelineRecord, RecordType, TypeFilter};
use crate::remote::{PipelineRemote, RemoteError};
use crate::seed::DataSource;
use crate::sync::{SyncStatus, WriteFailure, WriteKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum PendingWrite {
    Move(StageMove),
    Create(NewRecord),
}

/// A local change the record service has not accepted yet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsyncedWrite {
    pub record_id: String,
    /// Stage held by the local copy
    pub stage: String,
    #[serde(flatten)]
    pub failure: WriteFailure,
    #[serde(skip)]
    pending: PendingWrite,
}

#[derive(Debug, Clone)]
struct Board {
    records: Vec<PipelineRecord>,
    source: DataSource,
    loaded_at: DateTime<Utc>,
    unsynced: BTreeMap<String, UnsyncedWrite>,
}

impl Board {
    fn new(records: Vec<PipelineRecord>, source: DataSource) -> Self {
        Self {
            records,
            source,
            loaded_at: Utc::now(),
            unsynced: BTreeMap::new(),
        }
    }

    fn record(&self, id: &str) -> Result<&PipelineRecord, AppError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found_error(format!("Record {} not found", id)))
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut PipelineRecord, AppError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found_error(format!("Record {} not found", id)))
    }

    /// Put local changes back on top of freshly loaded records. A pending
    /// move whose record is gone from the fresh data is dropped.
    fn reapply_unsynced(&mut self, funnel: &Funnel) {
        let records = &mut self.records;
        self.unsynced.retain(|record_id, entry| match &entry.pending {
            PendingWrite::Move(stage_move) => match records.iter_mut().find(|r| &r.id == record_id) {
                Some(record) => {
                    record.raw_stage = stage_move.to.clone();
                    record.canonical_stage = stage_move.to.clone();
                    true
                }
                None => {
                    warn!(record_id = %record_id, "Dropping unsynced move of a record that no longer exists");
                    false
                }
            },
            PendingWrite::Create(fields) => {
                if !records.iter().any(|r| &r.id == record_id) {
                    records.push(local_record(funnel, record_id, fields));
                }
                true
            }
        });
    }

    /// Records the record service may hold; pending creates are left out
    fn syncable_records(&self) -> Vec<PipelineRecord> {
        self.records
            .iter()
            .filter(|r| {
                !self
                    .unsynced
                    .get(&r.id)
                    .is_some_and(|entry| matches!(entry.pending, PendingWrite::Create(_)))
            })
            .cloned()
            .collect()
    }

    fn current_stage(&self, record_id: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.id == record_id)
            .map(|r| r.canonical_stage.as_str())
    }
}

fn local_record(funnel: &Funnel, id: &str, fields: &NewRecord) -> PipelineRecord {
    let raw_stage = fields.stage.clone().unwrap_or_default();
    let mut record = fields.clone().into_record(id.to_string(), raw_stage);
    record.canonical_stage = StageNormalizer::normalize(funnel, &record.raw_stage).to_string();
    record
}

/// Stage buckets with records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub container: String,
    pub funnel: &'static str,
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
    pub stages: Vec<StageGroup>,
    pub totals: PipelineTotals,
    pub unsynced_count: usize,
}

/// Stage counts and totals without records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub container: String,
    pub funnel: &'static str,
    pub source: DataSource,
    pub stages: Vec<StageSummary>,
    pub totals: PipelineTotals,
    pub unsynced_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub record: PipelineRecord,
    pub sync: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryView {
    pub record_type: RecordType,
    pub source: DataSource,
    pub records: Vec<PipelineRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncReport {
    pub synced: Vec<String>,
    pub failed: Vec<String>,
}

/// Boards of one funnel, keyed by container id
#[derive(Clone)]
pub struct PipelineService {
    funnel: &'static Funnel,
    remote: Arc<dyn PipelineRemote>,
    seed: Arc<Vec<PipelineRecord>>,
    directory: Arc<Vec<PipelineRecord>>,
    boards: Arc<RwLock<HashMap<String, Board>>>,
}

impl PipelineService {
    pub fn new(
        funnel: &'static Funnel,
        remote: Arc<dyn PipelineRemote>,
        seed: Vec<PipelineRecord>,
        directory: Vec<PipelineRecord>,
    ) -> Self {
        Self {
            funnel,
            remote,
            seed: Arc::new(seed),
            directory: Arc::new(directory),
            boards: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn funnel(&self) -> &'static Funnel {
        self.funnel
    }

    /// Fetch and normalize a container, falling back to seed data
    async fn fetch(&self, container: &str) -> (Vec<PipelineRecord>, DataSource) {
        let (mut records, source) = match self.remote.fetch_pipeline(container).await {
            Ok(pipeline) => {
                let records = pipeline.into_records();
                info!("Loaded {} records for '{}'", records.len(), container);
                (records, DataSource::Live)
            }
            Err(e) => {
                warn!("Failed to fetch pipeline '{}', using seed data: {}", container, e);
                (self.seed.as_ref().clone(), DataSource::Fallback)
            }
        };
        StageNormalizer::normalize_records(self.funnel, &mut records);
        (records, source)
    }

    async fn ensure_loaded(&self, container: &str) {
        if self.boards.read().await.contains_key(container) {
            return;
        }
        let (records, source) = self.fetch(container).await;
        self.boards
            .write()
            .await
            .entry(container.to_string())
            .or_insert_with(|| Board::new(records, source));
    }

    async fn with_board<R>(
        &self,
        container: &str,
        f: impl FnOnce(&Board) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        self.ensure_loaded(container).await;
        let boards = self.boards.read().await;
        let board = boards
            .get(container)
            .ok_or_else(|| AppError::Internal(format!("Board '{}' vanished", container)))?;
        f(board)
    }

    async fn with_board_mut<R>(
        &self,
        container: &str,
        f: impl FnOnce(&mut Board) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        self.ensure_loaded(container).await;
        let mut boards = self.boards.write().await;
        let board = boards
            .get_mut(container)
            .ok_or_else(|| AppError::Internal(format!("Board '{}' vanished", container)))?;
        f(board)
    }

    fn board_view(&self, container: &str, board: &Board, filter: TypeFilter) -> BoardView {
        BoardView {
            container: container.to_string(),
            funnel: self.funnel.name,
            source: board.source,
            loaded_at: board.loaded_at,
            stages: PipelineAggregator::group(&board.records, self.funnel, filter),
            totals: PipelineAggregator::totals(&board.records, self.funnel, filter),
            unsynced_count: board.unsynced.len(),
        }
    }

    /// Replace the board with a fresh fetch. Unsynced local changes are kept
    /// and applied again on top of the new data.
    pub async fn reload(&self, container: &str) -> BoardView {
        let (records, source) = self.fetch(container).await;
        let mut boards = self.boards.write().await;
        let board = boards
            .entry(container.to_string())
            .or_insert_with(|| Board::new(Vec::new(), source));

        board.records = records;
        board.source = source;
        board.loaded_at = Utc::now();
        board.reapply_unsynced(self.funnel);

        self.board_view(container, board, TypeFilter::All)
    }

    pub async fn board(&self, container: &str, filter: TypeFilter) -> Result<BoardView, AppError> {
        self.with_board(container, |board| Ok(self.board_view(container, board, filter)))
            .await
    }

    pub async fn summary(&self, container: &str, filter: TypeFilter) -> Result<SummaryView, AppError> {
        self.with_board(container, |board| {
            Ok(SummaryView {
                container: container.to_string(),
                funnel: self.funnel.name,
                source: board.source,
                stages: PipelineAggregator::summarize(&board.records, self.funnel, filter),
                totals: PipelineAggregator::totals(&board.records, self.funnel, filter),
                unsynced_count: board.unsynced.len(),
            })
        })
        .await
    }

    pub async fn record(&self, container: &str, record_id: &str) -> Result<PipelineRecord, AppError> {
        self.with_board(container, |board| board.record(record_id).cloned())
            .await
    }

    /// Stages a guided advance could reach from the record's current stage
    pub async fn next_stages(
        &self,
        container: &str,
        record_id: &str,
    ) -> Result<Vec<&'static str>, AppError> {
        self.with_board(container, |board| {
            let record = board.record(record_id)?;
            Ok(StageTransitionPolicy::next_stages(self.funnel, &record.canonical_stage))
        })
        .await
    }

    /// Guided advance, applied to the board. Persist the returned move with
    /// [`persist_move`](Self::persist_move) or [`spawn_persist`](Self::spawn_persist).
    pub async fn advance(&self, container: &str, record_id: &str) -> Result<StageMove, AppError> {
        self.with_board_mut(container, |board| {
            let record = board.record_mut(record_id)?;
            StageTransitionPolicy::advance(self.funnel, record)
        })
        .await
    }

    /// Manual override, applied to the board
    pub async fn move_to(
        &self,
        container: &str,
        record_id: &str,
        stage: &str,
    ) -> Result<StageMove, AppError> {
        self.with_board_mut(container, |board| {
            let record = board.record_mut(record_id)?;
            Ok(StageTransitionPolicy::override_stage(self.funnel, record, stage))
        })
        .await
    }

    /// A board running on seed data hands its records to the record service
    /// before the first write, so writes land on the whole board instead of
    /// an empty container.
    async fn adopt_fallback(&self, container: &str) {
        let records = {
            let boards = self.boards.read().await;
            match boards.get(container) {
                Some(board) if board.source == DataSource::Fallback => board.syncable_records(),
                _ => return,
            }
        };

        let result = self.remote.adopt(container, &records).await;
        match result {
            Ok(true) => {
                if let Some(board) = self.boards.write().await.get_mut(container) {
                    board.source = DataSource::Live;
                }
                info!("Seed data of '{}' is now the live collection ({} records)", container, records.len());
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to adopt seed data for '{}': {}", container, e),
        }
    }

    async fn is_unsynced(&self, container: &str, record_id: &str) -> bool {
        self.boards
            .read()
            .await
            .get(container)
            .is_some_and(|b| b.unsynced.contains_key(record_id))
    }

    /// Send a locally applied move to the record service and record the outcome
    pub async fn persist_move(&self, container: &str, stage_move: &StageMove) -> SyncStatus {
        if stage_move.is_noop() && !self.is_unsynced(container, &stage_move.record_id).await {
            return SyncStatus::Synced;
        }

        // A record the service has never seen carries its stage in the pending create
        {
            let mut boards = self.boards.write().await;
            let pending_create = boards
                .get_mut(container)
                .and_then(|b| b.unsynced.get_mut(&stage_move.record_id))
                .filter(|entry| matches!(entry.pending, PendingWrite::Create(_)));
            if let Some(entry) = pending_create {
                if let PendingWrite::Create(fields) = &mut entry.pending {
                    fields.stage = Some(stage_move.to.clone());
                }
                entry.stage = stage_move.to.clone();
                return SyncStatus::Failed;
            }
        }

        self.adopt_fallback(container).await;

        let result = self
            .remote
            .move_record(
                container,
                &stage_move.record_id,
                &stage_move.to,
                stage_move.status,
            )
            .await;

        self.settle(
            container,
            PendingWrite::Move(stage_move.clone()),
            &stage_move.record_id,
            &stage_move.to,
            result,
        )
        .await
    }

    /// Persist in the background; the outcome only shows in the unsynced ledger
    pub fn spawn_persist(&self, container: &str, stage_move: StageMove) {
        let service = self.clone();
        let container = container.to_string();
        tokio::spawn(async move {
            service.persist_move(&container, &stage_move).await;
        });
    }

    /// Record the outcome of a write. Background writes may settle out of
    /// order, so an outcome only touches the ledger while it still describes
    /// the record's local stage (or the ledger entry it replays).
    async fn settle(
        &self,
        container: &str,
        pending: PendingWrite,
        record_id: &str,
        stage: &str,
        result: Result<(), RemoteError>,
    ) -> SyncStatus {
        let mut boards = self.boards.write().await;
        let board = boards.get_mut(container);

        match result {
            Ok(()) => {
                if let Some(board) = board {
                    let current = board.current_stage(record_id) == Some(stage);
                    let replayed = board.unsynced.get(record_id).is_some_and(|e| e.stage == stage);
                    if current || replayed {
                        board.unsynced.remove(record_id);
                    }
                }
                debug!("Persisted '{}' in '{}'", record_id, container);
                SyncStatus::Synced
            }
            Err(e) => {
                warn!(
                    container,
                    record_id,
                    error = %e,
                    "Remote write failed, keeping local state"
                );
                let kind = match pending {
                    PendingWrite::Move(_) => WriteKind::Move,
                    PendingWrite::Create(_) => WriteKind::Create,
                };
                let board = board.filter(|b| {
                    kind == WriteKind::Create || b.current_stage(record_id) == Some(stage)
                });
                match board {
                    None => debug!("'{}' has moved on since this write, not recording it", record_id),
                    Some(board) => {
                        board.unsynced.insert(
                            record_id.to_string(),
                            UnsyncedWrite {
                                record_id: record_id.to_string(),
                                stage: stage.to_string(),
                                failure: WriteFailure::new(kind, e),
                                pending,
                            },
                        );
                    }
                }
                SyncStatus::Failed
            }
        }
    }

    /// Create a record through the record service, then reload the board.
    /// When the service rejects the write the record is kept locally under a
    /// `local-` id and marked unsynced.
    pub async fn create(&self, container: &str, mut fields: NewRecord) -> Result<CreateOutcome, AppError> {
        let stage = fields
            .stage
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.funnel.first())
            .unwrap_or_default()
            .to_string();
        fields.stage = Some(stage);

        self.ensure_loaded(container).await;
        self.adopt_fallback(container).await;

        let result = self.remote.create_record(container, &fields).await;
        match result {
            Ok(created) => {
                info!("Created record {} in '{}'", created.id, container);
                self.reload(container).await;
                let funnel = self.funnel;
                let record = self
                    .with_board_mut(container, |board| {
                        if let Some(existing) = board.records.iter().find(|r| r.id == created.id) {
                            return Ok(existing.clone());
                        }
                        let record = local_record(funnel, &created.id, &fields);
                        board.records.push(record.clone());
                        Ok(record)
                    })
                    .await?;
                Ok(CreateOutcome {
                    record,
                    sync: SyncStatus::Synced,
                })
            }
            Err(e) => {
                let id = format!("local-{}", Uuid::new_v4());
                let record = local_record(self.funnel, &id, &fields);
                warn!("Failed to create record in '{}', keeping it as {}: {}", container, id, e);

                self.with_board_mut(container, |board| {
                    board.records.push(record.clone());
                    board.unsynced.insert(
                        id.clone(),
                        UnsyncedWrite {
                            record_id: id.clone(),
                            stage: record.canonical_stage.clone(),
                            failure: WriteFailure::new(WriteKind::Create, e),
                            pending: PendingWrite::Create(fields),
                        },
                    );
                    Ok(())
                })
                .await?;

                Ok(CreateOutcome {
                    record,
                    sync: SyncStatus::Failed,
                })
            }
        }
    }

    /// Records of one type for selection lists, seed directory on failure
    pub async fn records_by_type(&self, container: &str, record_type: RecordType) -> DirectoryView {
        let (mut records, source) = match self.remote.fetch_records_by_type(container, record_type).await {
            Ok(records) => (records, DataSource::Live),
            Err(e) => {
                warn!("Failed to fetch {} records from '{}', using seed data: {}", record_type, container, e);
                let records = self
                    .directory
                    .iter()
                    .filter(|r| r.record_type == record_type)
                    .cloned()
                    .collect();
                (records, DataSource::Fallback)
            }
        };
        StageNormalizer::normalize_records(self.funnel, &mut records);

        DirectoryView {
            record_type,
            source,
            records,
        }
    }

    /// Local changes the record service does not have, by record id
    pub async fn unsynced(&self, container: &str) -> Vec<UnsyncedWrite> {
        self.boards
            .read()
            .await
            .get(container)
            .map(|b| b.unsynced.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Replay a pending create; the local id is swapped for the one the
    /// service assigns. Returns the new id on success.
    async fn resync_create(
        &self,
        container: &str,
        local_id: &str,
        stage: &str,
        fields: NewRecord,
    ) -> Option<String> {
        let result = self.remote.create_record(container, &fields).await;
        let created = match result {
            Ok(created) => created,
            Err(e) => {
                self.settle(container, PendingWrite::Create(fields), local_id, stage, Err(e))
                    .await;
                return None;
            }
        };

        let mut boards = self.boards.write().await;
        if let Some(board) = boards.get_mut(container) {
            if let Some(record) = board.records.iter_mut().find(|r| r.id == local_id) {
                record.id = created.id.clone();
            }
            board.unsynced.remove(local_id);
        }
        info!("Created {} in '{}' as {}", local_id, container, created.id);
        Some(created.id)
    }

    /// Retry every unsynced write of a container
    pub async fn resync(&self, container: &str) -> ResyncReport {
        self.adopt_fallback(container).await;
        let pending = self.unsynced(container).await;
        let mut report = ResyncReport::default();

        for entry in pending {
            match entry.pending {
                PendingWrite::Move(stage_move) => {
                    let result = self
                        .remote
                        .move_record(container, &stage_move.record_id, &stage_move.to, stage_move.status)
                        .await;
                    let stage = stage_move.to.clone();
                    let status = self
                        .settle(container, PendingWrite::Move(stage_move), &entry.record_id, &stage, result)
                        .await;
                    match status {
                        SyncStatus::Synced => report.synced.push(entry.record_id),
                        _ => report.failed.push(entry.record_id),
                    }
                }
                PendingWrite::Create(fields) => {
                    let created = self
                        .resync_create(container, &entry.record_id, &entry.stage, fields)
                        .await;
                    match created {
                        Some(new_id) => report.synced.push(new_id),
                        None => report.failed.push(entry.record_id),
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::funnel::{DEAL_FUNNEL, LIFECYCLE_FUNNEL};
    use crate::pipeline::types::{EntryStatus, Selection};
    use crate::remote::{CreatedRecord, RemotePipeline, StoreRemote};
    use crate::store::{Collection, MemoryStore, RecordStore};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store-backed remote that can be switched off, or made to reject
    /// moves to one stage
    struct SwitchableRemote {
        inner: StoreRemote,
        down: AtomicBool,
        rejected_stage: std::sync::Mutex<Option<String>>,
    }

    impl SwitchableRemote {
        fn check(&self) -> Result<(), RemoteError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(RemoteError::Status {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(())
        }

        fn check_stage(&self, stage: &str) -> Result<(), RemoteError> {
            let rejected = self.rejected_stage.lock().unwrap();
            if rejected.as_deref() == Some(stage) {
                return Err(RemoteError::Status {
                    status: 409,
                    message: format!("stage {} rejected", stage),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PipelineRemote for SwitchableRemote {
        async fn fetch_pipeline(&self, container_id: &str) -> Result<RemotePipeline, RemoteError> {
            self.check()?;
            self.inner.fetch_pipeline(container_id).await
        }

        async fn move_record(
            &self,
            container_id: &str,
            record_id: &str,
            new_stage: &str,
            new_status: EntryStatus,
        ) -> Result<(), RemoteError> {
            self.check()?;
            self.check_stage(new_stage)?;
            self.inner
                .move_record(container_id, record_id, new_stage, new_status)
                .await
        }

        async fn create_record(
            &self,
            container_id: &str,
            fields: &NewRecord,
        ) -> Result<CreatedRecord, RemoteError> {
            self.check()?;
            self.inner.create_record(container_id, fields).await
        }

        async fn fetch_records_by_type(
            &self,
            container_id: &str,
            record_type: RecordType,
        ) -> Result<Vec<PipelineRecord>, RemoteError> {
            self.check()?;
            self.inner.fetch_records_by_type(container_id, record_type).await
        }

        async fn adopt(&self, container_id: &str, records: &[PipelineRecord]) -> Result<bool, RemoteError> {
            self.check()?;
            self.inner.adopt(container_id, records).await
        }
    }

    struct Fixture {
        store: Arc<dyn RecordStore>,
        remote: Arc<SwitchableRemote>,
    }

    impl Fixture {
        async fn new(records: Vec<PipelineRecord>) -> Self {
            let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
            if !records.is_empty() {
                Collection::new(store.clone(), "bd").save(&records).await.unwrap();
            }
            let remote = Arc::new(SwitchableRemote {
                inner: StoreRemote::new(store.clone()),
                down: AtomicBool::new(false),
                rejected_stage: std::sync::Mutex::new(None),
            });
            Self { store, remote }
        }

        fn service(&self, funnel: &'static Funnel, seed: Vec<PipelineRecord>) -> PipelineService {
            PipelineService::new(funnel, self.remote.clone(), seed, Vec::new())
        }

        fn set_down(&self, down: bool) {
            self.remote.down.store(down, Ordering::SeqCst);
        }

        fn reject_stage(&self, stage: Option<&str>) {
            *self.remote.rejected_stage.lock().unwrap() = stage.map(str::to_string);
        }

        async fn stored(&self) -> Vec<PipelineRecord> {
            Collection::new(self.store.clone(), "bd")
                .load()
                .await
                .unwrap()
                .unwrap_or_default()
        }
    }

    fn all_records(view: &BoardView) -> Vec<PipelineRecord> {
        view.stages.iter().flat_map(|g| g.records.clone()).collect()
    }

    fn counts(view: &BoardView) -> Vec<(&'static str, usize)> {
        view.stages
            .iter()
            .map(|g| (g.summary.stage, g.summary.count))
            .collect()
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_seed() {
        let fixture = Fixture::new(Vec::new()).await;
        fixture.set_down(true);
        let seed = vec![
            PipelineRecord::new("s1", "Warm"),
            PipelineRecord::new("s2", "Contract Signed").with_value(500.0),
        ];
        let service = fixture.service(&DEAL_FUNNEL, seed);

        let first = service.board("bd", TypeFilter::All).await.unwrap();
        assert_eq!(first.source, DataSource::Fallback);
        assert_eq!(
            counts(&first),
            vec![
                ("interested", 1),
                ("had-meeting", 0),
                ("contract-negotiations", 0),
                ("contract-signed", 1),
            ]
        );

        let second = service.reload("bd").await;
        assert_eq!(second.source, DataSource::Fallback);
        assert_eq!(all_records(&first), all_records(&second));
        assert_eq!(counts(&first), counts(&second));
        assert_eq!(second.totals.total, 500.0);
    }

    #[tokio::test]
    async fn test_writes_on_seed_data_adopt_the_whole_board() {
        let fixture = Fixture::new(Vec::new()).await;
        let seed = vec![
            PipelineRecord::new("c1", "aware").named("Ada", "Acme"),
            PipelineRecord::new("c2", "interested").named("Bo", "Brix"),
        ];
        let service = fixture.service(&LIFECYCLE_FUNNEL, seed);

        let view = service.board("bd", TypeFilter::All).await.unwrap();
        assert_eq!(view.source, DataSource::Fallback);

        let stage_move = service.advance("bd", "c1").await.unwrap();
        assert_eq!(service.persist_move("bd", &stage_move).await, SyncStatus::Synced);

        let outcome = service
            .create(
                "bd",
                NewRecord {
                    display_name: Some("Cy".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.sync, SyncStatus::Synced);

        let view = service.board("bd", TypeFilter::All).await.unwrap();
        assert_eq!(view.source, DataSource::Live);
        assert_eq!(view.totals.count, 3);
        assert_eq!(service.record("bd", "c1").await.unwrap().canonical_stage, "interested");
        assert!(service.unsynced("bd").await.is_empty());
        assert_eq!(fixture.stored().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reload_drops_moves_of_vanished_records() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        service.board("bd", TypeFilter::All).await.unwrap();

        fixture.set_down(true);
        let stage_move = service.advance("bd", "a").await.unwrap();
        assert_eq!(service.persist_move("bd", &stage_move).await, SyncStatus::Failed);
        assert_eq!(service.unsynced("bd").await.len(), 1);

        fixture.set_down(false);
        Collection::<PipelineRecord>::new(fixture.store.clone(), "bd")
            .save(&[PipelineRecord::new("b", "interested")])
            .await
            .unwrap();
        service.reload("bd").await;

        assert!(service.unsynced("bd").await.is_empty());
        assert_eq!(service.resync("bd").await, ResyncReport::default());
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_override_later_move() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        fixture.reject_stage(Some("had-meeting"));

        let first = service.advance("bd", "a").await.unwrap();
        let second = service.advance("bd", "a").await.unwrap();
        assert_eq!(second.to, "contract-negotiations");

        // The later move lands before the earlier one settles
        assert_eq!(service.persist_move("bd", &second).await, SyncStatus::Synced);
        assert_eq!(service.persist_move("bd", &first).await, SyncStatus::Failed);
        assert!(service.unsynced("bd").await.is_empty());

        let view = service.reload("bd").await;
        assert_eq!(view.unsynced_count, 0);
        assert_eq!(
            service.record("bd", "a").await.unwrap().canonical_stage,
            "contract-negotiations"
        );
        assert_eq!(fixture.stored().await[0].raw_stage, "contract-negotiations");
    }

    #[tokio::test]
    async fn test_later_success_clears_earlier_failure() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        fixture.reject_stage(Some("had-meeting"));

        let first = service.advance("bd", "a").await.unwrap();
        assert_eq!(service.persist_move("bd", &first).await, SyncStatus::Failed);
        assert_eq!(service.unsynced("bd").await.len(), 1);

        let second = service.advance("bd", "a").await.unwrap();
        assert_eq!(service.persist_move("bd", &second).await, SyncStatus::Synced);
        assert!(service.unsynced("bd").await.is_empty());
    }

    #[tokio::test]
    async fn test_live_board_is_normalized() {
        let fixture = Fixture::new(vec![
            PipelineRecord::new("a", "prospecting"),
            PipelineRecord::new("b", "Had Meeting"),
            PipelineRecord::new("c", "client"),
        ])
        .await;
        let service = fixture.service(&LIFECYCLE_FUNNEL, Vec::new());

        let record = service.record("bd", "b").await.unwrap();
        assert_eq!(record.canonical_stage, "qualified");
        assert_eq!(record.raw_stage, "Had Meeting");

        let summary = service.summary("bd", TypeFilter::All).await.unwrap();
        assert_eq!(summary.source, DataSource::Live);
        assert_eq!(summary.stages.len(), LIFECYCLE_FUNNEL.stages.len());
        assert_eq!(summary.totals.count, 3);
    }

    #[tokio::test]
    async fn test_type_filter_applies_to_board() {
        let fixture = Fixture::new(vec![
            PipelineRecord::new("a", "interested").with_value(100.0),
            PipelineRecord::new("b", "interested")
                .of_type(RecordType::Customer)
                .with_value(900.0),
        ])
        .await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());

        let view = service
            .board("bd", Selection::Only(RecordType::Customer))
            .await
            .unwrap();
        assert_eq!(view.totals.count, 1);
        assert_eq!(view.stages[0].records[0].id, "b");
        assert_eq!(view.stages[0].summary.total, 900.0);
    }

    #[tokio::test]
    async fn test_advance_then_persist() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());

        let stage_move = service.advance("bd", "a").await.unwrap();
        assert_eq!(stage_move.from, "interested");
        assert_eq!(stage_move.to, "had-meeting");
        assert_eq!(service.record("bd", "a").await.unwrap().canonical_stage, "had-meeting");

        assert_eq!(service.persist_move("bd", &stage_move).await, SyncStatus::Synced);
        assert_eq!(fixture.stored().await[0].raw_stage, "had-meeting");
        assert!(service.unsynced("bd").await.is_empty());
    }

    #[tokio::test]
    async fn test_advance_errors() {
        let fixture = Fixture::new(vec![PipelineRecord::new("done", "contract-signed")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());

        assert!(matches!(
            service.advance("bd", "done").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service.advance("bd", "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_override_regresses_and_next_stages() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "contract-negotiations")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());

        assert_eq!(
            service.next_stages("bd", "a").await.unwrap(),
            vec!["contract-signed"]
        );

        let stage_move = service.move_to("bd", "a", "Interested").await.unwrap();
        assert_eq!(stage_move.to, "interested");
        assert_eq!(
            service.next_stages("bd", "a").await.unwrap(),
            vec!["had-meeting", "contract-negotiations", "contract-signed"]
        );
    }

    #[tokio::test]
    async fn test_failed_persist_is_kept_and_resynced() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        service.board("bd", TypeFilter::All).await.unwrap();

        fixture.set_down(true);
        let stage_move = service.move_to("bd", "a", "contract-signed").await.unwrap();
        assert_eq!(stage_move.status, EntryStatus::Won);
        assert_eq!(service.persist_move("bd", &stage_move).await, SyncStatus::Failed);

        // No rollback
        assert_eq!(service.record("bd", "a").await.unwrap().canonical_stage, "contract-signed");
        let unsynced = service.unsynced("bd").await;
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].failure.kind, WriteKind::Move);
        assert_eq!(fixture.stored().await[0].raw_stage, "interested");

        // Still down: resync reports the failure and keeps the entry
        let report = service.resync("bd").await;
        assert_eq!(report.failed, vec!["a".to_string()]);
        assert_eq!(service.unsynced("bd").await.len(), 1);

        fixture.set_down(false);
        let report = service.resync("bd").await;
        assert_eq!(report.synced, vec!["a".to_string()]);
        assert!(service.unsynced("bd").await.is_empty());
        assert_eq!(fixture.stored().await[0].raw_stage, "contract-signed");
    }

    #[tokio::test]
    async fn test_reload_reapplies_unsynced_moves() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        service.board("bd", TypeFilter::All).await.unwrap();

        fixture.set_down(true);
        let stage_move = service.advance("bd", "a").await.unwrap();
        service.persist_move("bd", &stage_move).await;

        fixture.set_down(false);
        let view = service.reload("bd").await;
        assert_eq!(view.source, DataSource::Live);
        assert_eq!(view.unsynced_count, 1);
        assert_eq!(service.record("bd", "a").await.unwrap().canonical_stage, "had-meeting");
    }

    #[tokio::test]
    async fn test_create_reloads_board() {
        let fixture = Fixture::new(vec![PipelineRecord::new("a", "interested")]).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());

        let outcome = service
            .create(
                "bd",
                NewRecord {
                    display_name: Some("Kim".into()),
                    stage: Some("Meeting".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.sync, SyncStatus::Synced);
        assert_eq!(outcome.record.canonical_stage, "had-meeting");
        assert!(!outcome.record.id.starts_with("local-"));

        let view = service.board("bd", TypeFilter::All).await.unwrap();
        assert_eq!(view.totals.count, 2);
        assert_eq!(fixture.stored().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_create_is_kept_locally_and_resynced() {
        let fixture = Fixture::new(Vec::new()).await;
        let service = fixture.service(&DEAL_FUNNEL, Vec::new());
        fixture.set_down(true);

        let outcome = service
            .create(
                "bd",
                NewRecord {
                    company: Some("Acme".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.sync, SyncStatus::Failed);
        assert!(outcome.record.id.starts_with("local-"));
        assert_eq!(outcome.record.canonical_stage, "interested");

        // Moving a record the service has never seen folds into the pending create
        let stage_move = service.advance("bd", &outcome.record.id).await.unwrap();
        assert_eq!(service.persist_move("bd", &stage_move).await, SyncStatus::Failed);
        let unsynced = service.unsynced("bd").await;
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].failure.kind, WriteKind::Create);
        assert_eq!(unsynced[0].stage, "had-meeting");

        fixture.set_down(false);
        let report = service.resync("bd").await;
        assert_eq!(report.synced.len(), 1);
        assert!(service.unsynced("bd").await.is_empty());

        let stored = fixture.stored().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, report.synced[0]);
        assert_eq!(stored[0].raw_stage, "had-meeting");
        assert!(service.record("bd", &report.synced[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_records_by_type_falls_back_to_directory() {
        let fixture = Fixture::new(Vec::new()).await;
        fixture.set_down(true);
        let directory = vec![
            PipelineRecord::new("p", "interested"),
            PipelineRecord::new("t", "interested").of_type(RecordType::TechPartner),
        ];
        let service = PipelineService::new(&DEAL_FUNNEL, fixture.remote.clone(), Vec::new(), directory);

        let view = service.records_by_type("bd", RecordType::TechPartner).await;
        assert_eq!(view.source, DataSource::Fallback);
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].id, "t");
    }
}
