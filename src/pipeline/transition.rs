//! Stage transitions
//!
//! Two entry points:
//!
//! - **Guided advance** always moves a record to the first stage after its
//!   current one. It never skips and never regresses.
//! - **Manual override** sets any stage of the funnel, earlier ones included.
//!
//! Both produce a [`StageMove`] command that is applied to the in-memory board
//! first and persisted separately.

use crate::error::{conflict_error, AppError};
use crate::pipeline::funnel::Funnel;
use crate::pipeline::normalizer::StageNormalizer;
use crate::pipeline::types::{EntryStatus, PipelineRecord};
use serde::{Deserialize, Serialize};

/// Which entry point produced a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    Guided,
    Manual,
}

/// A stage change already applied locally, still to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMove {
    pub record_id: String,
    pub from: String,
    pub to: String,
    pub status: EntryStatus,
    pub kind: MoveKind,
}

impl StageMove {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

pub struct StageTransitionPolicy;

impl StageTransitionPolicy {
    /// Every stage strictly after `current`, in funnel order. A stage outside
    /// the funnel is treated as the first stage.
    pub fn next_stages(funnel: &Funnel, current: &str) -> Vec<&'static str> {
        let index = funnel.position(current).unwrap_or(0);
        funnel.keys().skip(index + 1).collect()
    }

    /// First logical next stage, `None` at the terminal stage
    pub fn guided_target(funnel: &Funnel, current: &str) -> Option<&'static str> {
        Self::next_stages(funnel, current).into_iter().next()
    }

    /// Target of a manual override. The label goes through the normalizer,
    /// so unknown text lands on the first stage like any other label.
    pub fn manual_target(funnel: &Funnel, requested: &str) -> &'static str {
        StageNormalizer::normalize(funnel, requested)
    }

    /// Guided advance of `record`, applied in place
    pub fn advance(funnel: &Funnel, record: &mut PipelineRecord) -> Result<StageMove, AppError> {
        let target = Self::guided_target(funnel, &record.canonical_stage).ok_or_else(|| {
            conflict_error(format!(
                "Record {} is already at the final stage '{}'",
                record.id, record.canonical_stage
            ))
        })?;
        Ok(Self::apply(funnel, record, target, MoveKind::Guided))
    }

    /// Manual override of `record`, applied in place
    pub fn override_stage(funnel: &Funnel, record: &mut PipelineRecord, requested: &str) -> StageMove {
        let target = Self::manual_target(funnel, requested);
        Self::apply(funnel, record, target, MoveKind::Manual)
    }

    fn apply(funnel: &Funnel, record: &mut PipelineRecord, target: &'static str, kind: MoveKind) -> StageMove {
        let from = std::mem::replace(&mut record.canonical_stage, target.to_string());
        record.raw_stage = target.to_string();

        StageMove {
            record_id: record.id.clone(),
            from,
            to: target.to_string(),
            status: funnel.outcome(target),
            kind,
        }
    }
}
