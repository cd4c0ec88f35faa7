//! Funnel definitions
//!
//! A funnel is the fixed, ordered set of canonical stages a record can occupy,
//! together with the ordered rewrite rules that map historical labels onto it.

use crate::pipeline::types::EntryStatus;
use once_cell::sync::Lazy;
use serde::Serialize;

/// One canonical stage of a funnel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDef {
    pub key: &'static str,
    pub label: &'static str,
    /// Commercial status of a record sitting in this stage
    pub outcome: EntryStatus,
}

/// A `(matchTerm, canonicalTarget)` rewrite rule of the normalization cascade
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRule {
    pub term: &'static str,
    pub target: &'static str,
}

const fn rule(term: &'static str, target: &'static str) -> StageRule {
    StageRule { term, target }
}

/// Ordered canonical stages plus their normalization cascade
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub name: &'static str,
    pub stages: Vec<StageDef>,
    pub rules: Vec<StageRule>,
}

impl Funnel {
    /// Keys in funnel order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.key)
    }

    pub fn first(&self) -> Option<&'static str> {
        self.stages.first().map(|s| s.key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn stage(&self, key: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.key == key)
    }

    /// Status implied by a stage; unknown keys are open
    pub fn outcome(&self, key: &str) -> EntryStatus {
        self.stage(key).map(|s| s.outcome).unwrap_or(EntryStatus::Open)
    }
}

/// Deal funnel used by the remote pipeline board
pub static DEAL_FUNNEL: Lazy<Funnel> = Lazy::new(|| Funnel {
    name: "deals",
    stages: vec![
        StageDef { key: "interested", label: "Interested", outcome: EntryStatus::Open },
        StageDef { key: "had-meeting", label: "Had Meeting", outcome: EntryStatus::Open },
        StageDef {
            key: "contract-negotiations",
            label: "Contract Negotiations",
            outcome: EntryStatus::Open,
        },
        StageDef { key: "contract-signed", label: "Contract Signed", outcome: EntryStatus::Won },
    ],
    // Order matters: "had-meeting" is collapsed before "meeting" is expanded,
    // and "negotiations" is singularized before "negotiation" is expanded.
    rules: vec![
        rule("prospecting", "interested"),
        rule("prospect", "interested"),
        rule("warm", "interested"),
        rule("lead", "interested"),
        rule("had-meeting", "meeting"),
        rule("meeting", "had-meeting"),
        rule("negotiations", "negotiation"),
        rule("negotiation", "contract-negotiations"),
        rule("proposal", "contract-negotiations"),
        rule("closed-won", "contract-signed"),
        rule("signed", "contract-signed"),
        rule("client", "contract-signed"),
        rule("customer", "contract-signed"),
    ],
});

/// Contact lifecycle funnel used by the contacts book
pub static LIFECYCLE_FUNNEL: Lazy<Funnel> = Lazy::new(|| Funnel {
    name: "lifecycle",
    stages: vec![
        StageDef { key: "aware", label: "Aware", outcome: EntryStatus::Open },
        StageDef { key: "interested", label: "Interested", outcome: EntryStatus::Open },
        StageDef { key: "qualified", label: "Qualified", outcome: EntryStatus::Open },
        StageDef { key: "proposal", label: "Proposal", outcome: EntryStatus::Open },
        StageDef { key: "negotiation", label: "Negotiation", outcome: EntryStatus::Open },
        StageDef { key: "closed-won", label: "Closed Won", outcome: EntryStatus::Won },
        StageDef { key: "closed-lost", label: "Closed Lost", outcome: EntryStatus::Lost },
    ],
    rules: vec![
        rule("prospecting", "aware"),
        rule("prospect", "aware"),
        rule("cold", "aware"),
        rule("warm", "interested"),
        rule("had-meeting", "qualified"),
        rule("meeting", "qualified"),
        rule("proposal-sent", "proposal"),
        rule("contract-negotiations", "negotiation"),
        rule("negotiations", "negotiation"),
        rule("contract-signed", "closed-won"),
        rule("signed", "closed-won"),
        rule("client", "closed-won"),
        rule("customer", "closed-won"),
        rule("won", "closed-won"),
        rule("lost", "closed-lost"),
    ],
});

/// Resolve a funnel by name
pub fn by_name(name: &str) -> Option<&'static Funnel> {
    match name.trim().to_lowercase().as_str() {
        "deals" | "deal" | "pipeline" => Some(&*DEAL_FUNNEL),
        "lifecycle" | "contacts" => Some(&*LIFECYCLE_FUNNEL),
        _ => None,
    }
}

/// All declared funnels
pub fn all() -> [&'static Funnel; 2] {
    [&*DEAL_FUNNEL, &*LIFECYCLE_FUNNEL]
}
