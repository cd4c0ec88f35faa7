//! Roadmap prioritization
//!
//! Filters roadmap items by phase and status, then orders them by
//! `(priority, phase, status)` rank. The sort is stable: items equal on all
//! three keys keep their input order.

use crate::pipeline::types::Selection;
use crate::roadmap::types::{Phase, RoadmapItem, Status};
use serde::Serialize;

/// Independent phase and status predicates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoadmapFilter {
    pub phase: Selection<Phase>,
    pub status: Selection<Status>,
}

impl RoadmapFilter {
    pub fn matches(&self, item: &RoadmapItem) -> bool {
        self.phase.matches(&item.phase) && self.status.matches(&item.status)
    }
}

/// Items of one phase with completion counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseGroup {
    pub phase: Phase,
    pub done_count: usize,
    pub total_count: usize,
    pub items: Vec<RoadmapItem>,
}

pub struct RoadmapPrioritizer;

impl RoadmapPrioritizer {
    fn sort_key(item: &RoadmapItem) -> (u8, u8, u8) {
        (item.priority.rank(), item.phase.rank(), item.status.rank())
    }

    /// Filtered, prioritized view
    pub fn prioritize(items: &[RoadmapItem], filter: RoadmapFilter) -> Vec<RoadmapItem> {
        let mut view: Vec<RoadmapItem> = items.iter().filter(|i| filter.matches(i)).cloned().collect();
        // sort_by_key is stable
        view.sort_by_key(Self::sort_key);
        view
    }

    /// The prioritized view grouped by phase. Groups follow phase order and
    /// only phases with at least one item are emitted.
    pub fn group_by_phase(items: &[RoadmapItem], filter: RoadmapFilter) -> Vec<PhaseGroup> {
        let view = Self::prioritize(items, filter);

        Phase::ALL
            .iter()
            .filter_map(|&phase| {
                let members: Vec<RoadmapItem> =
                    view.iter().filter(|i| i.phase == phase).cloned().collect();
                if members.is_empty() {
                    return None;
                }
                Some(PhaseGroup {
                    phase,
                    done_count: members.iter().filter(|i| i.status == Status::Done).count(),
                    total_count: members.len(),
                    items: members,
                })
            })
            .collect()
    }

    /// Advance an item's status one step around the cycle
    pub fn cycle_status(item: &mut RoadmapItem) -> Status {
        item.status = item.status.cycled();
        item.status
    }
}
