//! Stage-tracking pipeline
//!
//! Records (deals and contacts) move through a funnel of ordered stages:
//!
//! 1. **Normalizer**: maps free-text stage labels onto canonical funnel keys
//! 2. **Aggregator**: per-stage counts and value totals
//! 3. **Transition policy**: guided advance and manual override
//! 4. **Service**: in-memory boards backed by the remote record service

pub mod aggregator;
pub mod funnel;
pub mod normalizer;
pub mod service;
pub mod transition;
pub mod types;

pub use funnel::{DEAL_FUNNEL, LIFECYCLE_FUNNEL};
pub use normalizer::StageNormalizer;
pub use service::PipelineService;
pub use transition::StageMove;
