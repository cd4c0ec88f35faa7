//! Roadmap item types

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationError};

fn compact(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Delivery phase, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Foundation,
    Acceleration,
    Scale,
    Optimize,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Foundation, Phase::Acceleration, Phase::Scale, Phase::Optimize];

    pub fn rank(self) -> u8 {
        match self {
            Phase::Foundation => 0,
            Phase::Acceleration => 1,
            Phase::Scale => 2,
            Phase::Optimize => 3,
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match compact(s).as_str() {
            "foundation" => Ok(Phase::Foundation),
            "acceleration" => Ok(Phase::Acceleration),
            "scale" => Ok(Phase::Scale),
            "optimize" | "optimise" => Ok(Phase::Optimize),
            _ => Err(format!("Unknown phase '{}'", s)),
        }
    }
}

/// Work status, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    NotStarted,
    InProgress,
    Done,
}

impl Status {
    pub fn rank(self) -> u8 {
        match self {
            Status::NotStarted => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }

    /// Next status of the cycle NotStarted → InProgress → Done → NotStarted
    pub fn cycled(self) -> Self {
        match self {
            Status::NotStarted => Status::InProgress,
            Status::InProgress => Status::Done,
            Status::Done => Status::NotStarted,
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match compact(s).as_str() {
            "notstarted" | "todo" => Ok(Status::NotStarted),
            "inprogress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            _ => Err(format!("Unknown status '{}'", s)),
        }
    }
}

/// Urgency, P0 most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::P0 => 0,
            Priority::P1 => 1,
            Priority::P2 => 2,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match compact(s).as_str() {
            "p0" => Ok(Priority::P0),
            "p1" => Ok(Priority::P1),
            "p2" => Ok(Priority::P2),
            _ => Err(format!("Unknown priority '{}'", s)),
        }
    }
}

/// A unit of business-development work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub phase: Phase,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_label: Option<String>,
    #[serde(default)]
    pub recurring: bool,
}

/// Fields for a new roadmap item
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRoadmapItem {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    #[validate(custom(function = "validate_title"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub phase: Phase,
    #[serde(default = "default_status")]
    pub status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_label: Option<String>,
    #[serde(default)]
    pub recurring: bool,
}

fn default_status() -> Status {
    Status::NotStarted
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        let mut err = ValidationError::new("blank_title");
        err.message = Some("Title must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Partial edit of a roadmap item; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapItemPatch {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    #[validate(custom(function = "validate_title"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub phase: Option<Phase>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub link: Option<String>,
    pub link_label: Option<String>,
    pub recurring: Option<bool>,
}

impl RoadmapItemPatch {
    pub fn apply(self, item: &mut RoadmapItem) {
        if let Some(title) = self.title {
            item.title = title;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(phase) = self.phase {
            item.phase = phase;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(category) = self.category {
            item.category = Some(category);
        }
        if let Some(link) = self.link {
            item.link = Some(link);
        }
        if let Some(link_label) = self.link_label {
            item.link_label = Some(link_label);
        }
        if let Some(recurring) = self.recurring {
            item.recurring = recurring;
        }
    }
}
