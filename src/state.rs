//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::pipeline::{PipelineService, DEAL_FUNNEL, LIFECYCLE_FUNNEL};
use crate::remote::{PipelineRemote, StoreRemote};
use crate::roadmap::RoadmapBoard;
use crate::seed::SeedData;
use crate::store::RecordStore;
use std::sync::Arc;

/// Store key of the contact collection
pub const CONTACTS_KEY: &str = "contacts";

/// Application state shared across all handlers
pub struct AppState {
    /// Deal boards, one per record-service container
    pub deals: PipelineService,

    /// Contact lifecycle board, served from the local store
    pub contacts: PipelineService,

    /// Roadmap items
    pub roadmap: RoadmapBoard,

    /// Container used by routes that do not name one
    pub default_container: String,
}

impl AppState {
    /// Wire the services. Deals go through `deal_remote`; contacts and the
    /// roadmap always live in `store`.
    pub fn new(
        store: Arc<dyn RecordStore>,
        deal_remote: Arc<dyn PipelineRemote>,
        seed: SeedData,
        settings: &Settings,
    ) -> Self {
        let SeedData {
            deals,
            contacts,
            roadmap,
            directory,
        } = seed;

        let contact_remote: Arc<dyn PipelineRemote> = Arc::new(StoreRemote::new(store.clone()));

        Self {
            deals: PipelineService::new(&DEAL_FUNNEL, deal_remote, deals, directory),
            contacts: PipelineService::new(&LIFECYCLE_FUNNEL, contact_remote, contacts, Vec::new()),
            roadmap: RoadmapBoard::new(store, roadmap),
            default_container: settings.remote.default_container.clone(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
