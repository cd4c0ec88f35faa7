//! Business-development roadmap
//!
//! Work items grouped by delivery phase and ordered by urgency.

pub mod board;
pub mod prioritizer;
pub mod types;

pub use board::RoadmapBoard;
pub use prioritizer::RoadmapFilter;
