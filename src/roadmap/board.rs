//! Roadmap board
//!
//! In-memory roadmap backed by one store collection. Edits apply to memory
//! immediately; [`RoadmapBoard::persist`] rewrites the whole collection.
//! A failed rewrite keeps the in-memory state and is reported through the
//! board's `unsynced` marker until a later rewrite succeeds.

use crate::error::{conflict_error, not_found_error, AppError};
use crate::roadmap::prioritizer::{PhaseGroup, RoadmapFilter, RoadmapPrioritizer};
use crate::roadmap::types::{NewRoadmapItem, RoadmapItem, RoadmapItemPatch};
use crate::seed::DataSource;
use crate::store::{Collection, RecordStore};
use crate::sync::{SyncStatus, WriteFailure, WriteKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Store key of the roadmap collection
pub const ROADMAP_KEY: &str = "bdRoadmapItems";

#[derive(Debug, Clone)]
struct RoadmapState {
    items: Vec<RoadmapItem>,
    source: DataSource,
    loaded_at: DateTime<Utc>,
    unsynced: Option<WriteFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapView {
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
    pub items: Vec<RoadmapItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsynced: Option<WriteFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedRoadmapView {
    pub source: DataSource,
    pub groups: Vec<PhaseGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsynced: Option<WriteFailure>,
}

#[derive(Clone)]
pub struct RoadmapBoard {
    collection: Collection<RoadmapItem>,
    seed: Arc<Vec<RoadmapItem>>,
    state: Arc<RwLock<Option<RoadmapState>>>,
}

impl RoadmapBoard {
    pub fn new(store: Arc<dyn RecordStore>, seed: Vec<RoadmapItem>) -> Self {
        Self {
            collection: Collection::new(store, ROADMAP_KEY),
            seed: Arc::new(seed),
            state: Arc::new(RwLock::new(None)),
        }
    }

    async fn fetch(&self) -> RoadmapState {
        let seed = self.seed.clone();
        let (items, source) = self
            .collection
            .load_or_seed(|| seed.as_ref().clone())
            .await;
        RoadmapState {
            items,
            source,
            loaded_at: Utc::now(),
            unsynced: None,
        }
    }

    async fn with_state<R>(&self, f: impl FnOnce(&RoadmapState) -> R) -> R {
        if let Some(ref state) = *self.state.read().await {
            return f(state);
        }
        self.with_state_mut(|state| f(state)).await
    }

    /// Load on first use, then hand out the state for editing
    async fn with_state_mut<R>(&self, f: impl FnOnce(&mut RoadmapState) -> R) -> R {
        let mut guard = self.state.write().await;
        let loaded = match guard.take() {
            Some(state) => state,
            None => self.fetch().await,
        };
        f(guard.insert(loaded))
    }

    /// Drop the in-memory copy and read the collection again
    pub async fn reload(&self) -> RoadmapView {
        let fresh = self.fetch().await;
        info!("Reloaded {} roadmap items ({:?})", fresh.items.len(), fresh.source);
        let mut state = self.state.write().await;
        let view = RoadmapView {
            source: fresh.source,
            loaded_at: fresh.loaded_at,
            items: RoadmapPrioritizer::prioritize(&fresh.items, RoadmapFilter::default()),
            unsynced: None,
        };
        *state = Some(fresh);
        view
    }

    /// Filtered items in priority order
    pub async fn list(&self, filter: RoadmapFilter) -> RoadmapView {
        self.with_state(|state| RoadmapView {
            source: state.source,
            loaded_at: state.loaded_at,
            items: RoadmapPrioritizer::prioritize(&state.items, filter),
            unsynced: state.unsynced.clone(),
        })
        .await
    }

    /// Filtered items grouped by phase
    pub async fn grouped(&self, filter: RoadmapFilter) -> GroupedRoadmapView {
        self.with_state(|state| GroupedRoadmapView {
            source: state.source,
            groups: RoadmapPrioritizer::group_by_phase(&state.items, filter),
            unsynced: state.unsynced.clone(),
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<RoadmapItem, AppError> {
        self.with_state(|state| {
            state
                .items
                .iter()
                .find(|i| i.id == id)
                .cloned()
                .ok_or_else(|| not_found_error(format!("Roadmap item {} not found", id)))
        })
        .await
    }

    pub async fn create(&self, new_item: NewRoadmapItem) -> Result<RoadmapItem, AppError> {
        self.with_state_mut(|state| {
            let id = match new_item.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => format!("rm-{}", Uuid::new_v4()),
            };
            if state.items.iter().any(|i| i.id == id) {
                return Err(conflict_error(format!("Roadmap item {} already exists", id)));
            }

            let item = RoadmapItem {
                id,
                title: new_item.title.trim().to_string(),
                description: new_item.description,
                phase: new_item.phase,
                status: new_item.status,
                priority: new_item.priority,
                category: new_item.category,
                link: new_item.link,
                link_label: new_item.link_label,
                recurring: new_item.recurring,
            };
            state.items.push(item.clone());
            Ok(item)
        })
        .await
    }

    pub async fn update(&self, id: &str, patch: RoadmapItemPatch) -> Result<RoadmapItem, AppError> {
        self.with_state_mut(|state| {
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| not_found_error(format!("Roadmap item {} not found", id)))?;
            patch.apply(item);
            Ok(item.clone())
        })
        .await
    }

    /// Advance an item's status one step around the cycle
    pub async fn cycle(&self, id: &str) -> Result<RoadmapItem, AppError> {
        self.with_state_mut(|state| {
            let item = state
                .items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| not_found_error(format!("Roadmap item {} not found", id)))?;
            RoadmapPrioritizer::cycle_status(item);
            Ok(item.clone())
        })
        .await
    }

    /// Rewrite the collection from the current in-memory items
    pub async fn persist(&self) -> SyncStatus {
        let Some(items) = self.state.read().await.as_ref().map(|s| s.items.clone()) else {
            return SyncStatus::Synced;
        };

        let result = self.collection.save(&items).await;

        let mut state = self.state.write().await;
        let Some(state) = state.as_mut() else {
            return SyncStatus::Synced;
        };
        match result {
            Ok(()) => {
                state.unsynced = None;
                SyncStatus::Synced
            }
            Err(e) => {
                warn!("Failed to save roadmap, keeping local state: {}", e);
                state.unsynced = Some(WriteFailure::new(WriteKind::Rewrite, e));
                SyncStatus::Failed
            }
        }
    }

    /// Persist in the background
    pub fn spawn_persist(&self) {
        let board = self.clone();
        tokio::spawn(async move {
            board.persist().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::types::{Phase, Priority, Status};
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &str, json: String) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("read-only".into()));
            }
            self.inner.save(key, json).await
        }
    }

    fn seed() -> Vec<RoadmapItem> {
        vec![
            RoadmapItem {
                id: "a".into(),
                title: "Later".into(),
                description: String::new(),
                phase: Phase::Scale,
                status: Status::NotStarted,
                priority: Priority::P2,
                category: None,
                link: None,
                link_label: None,
                recurring: false,
            },
            RoadmapItem {
                id: "b".into(),
                title: "Now".into(),
                description: String::new(),
                phase: Phase::Foundation,
                status: Status::InProgress,
                priority: Priority::P0,
                category: None,
                link: None,
                link_label: None,
                recurring: false,
            },
        ]
    }

    fn new_item(title: &str) -> NewRoadmapItem {
        NewRoadmapItem {
            id: None,
            title: title.into(),
            description: String::new(),
            phase: Phase::Acceleration,
            status: Status::NotStarted,
            priority: Priority::P1,
            category: None,
            link: None,
            link_label: None,
            recurring: false,
        }
    }

    #[tokio::test]
    async fn test_empty_store_serves_seed_in_priority_order() {
        let board = RoadmapBoard::new(Arc::new(MemoryStore::new()), seed());
        let view = board.list(RoadmapFilter::default()).await;

        assert_eq!(view.source, DataSource::Fallback);
        let ids: Vec<_> = view.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_cycle_and_persist_round_trip() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let board = RoadmapBoard::new(store.clone(), seed());

        let item = board.cycle("b").await.unwrap();
        assert_eq!(item.status, Status::Done);
        assert_eq!(board.persist().await, SyncStatus::Synced);

        let reopened = RoadmapBoard::new(store, Vec::new());
        let view = reopened.list(RoadmapFilter::default()).await;
        assert_eq!(view.source, DataSource::Live);
        assert_eq!(reopened.get("b").await.unwrap().status, Status::Done);
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_local_state() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let board = RoadmapBoard::new(store.clone(), seed());

        board.cycle("a").await.unwrap();
        assert_eq!(board.persist().await, SyncStatus::Failed);

        let view = board.list(RoadmapFilter::default()).await;
        assert!(view.unsynced.is_some());
        assert_eq!(board.get("a").await.unwrap().status, Status::InProgress);

        store.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(board.persist().await, SyncStatus::Synced);
        assert!(board.list(RoadmapFilter::default()).await.unsynced.is_none());
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let board = RoadmapBoard::new(Arc::new(MemoryStore::new()), seed());

        let created = board.create(new_item("  Partner webinar ")).await.unwrap();
        assert_eq!(created.title, "Partner webinar");
        assert!(created.id.starts_with("rm-"));

        let updated = board
            .update(
                &created.id,
                RoadmapItemPatch {
                    priority: Some(Priority::P0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::P0);

        let grouped = board.grouped(RoadmapFilter::default()).await;
        let phases: Vec<_> = grouped.groups.iter().map(|g| g.phase).collect();
        assert_eq!(phases, vec![Phase::Foundation, Phase::Acceleration, Phase::Scale]);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let board = RoadmapBoard::new(Arc::new(MemoryStore::new()), seed());

        let mut duplicate = new_item("Dup");
        duplicate.id = Some("a".into());
        assert!(matches!(board.create(duplicate).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let board = RoadmapBoard::new(Arc::new(MemoryStore::new()), seed());
        assert!(matches!(board.cycle("zzz").await, Err(AppError::NotFound(_))));
    }
}
