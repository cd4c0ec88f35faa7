//! Record types for the stage-tracking pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// Kind of relationship a record represents (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordType {
    #[default]
    Prospect,
    Collaborator,
    TechPartner,
    Customer,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Prospect => "prospect",
            RecordType::Collaborator => "collaborator",
            RecordType::TechPartner => "tech-partner",
            RecordType::Customer => "customer",
        }
    }

    /// Lenient parse used for data coming from the record service.
    /// Unknown text falls back to `Prospect`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match key.as_str() {
            "prospect" => Ok(RecordType::Prospect),
            "collaborator" => Ok(RecordType::Collaborator),
            "techpartner" => Ok(RecordType::TechPartner),
            "customer" => Ok(RecordType::Customer),
            _ => Err(format!("Unknown record type '{}'", s)),
        }
    }
}

/// "all" or exactly one value. Used for every single-select filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr> Selection<T> {
    /// Parse an optional query value; absent, empty and "all" select everything
    pub fn parse(raw: Option<&str>) -> Result<Self, T::Err> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Selection::All),
            Some(v) if v.eq_ignore_ascii_case("all") => Ok(Selection::All),
            Some(v) => v.parse().map(Selection::Only),
        }
    }
}

/// Record-type filter of the aggregator
pub type TypeFilter = Selection<RecordType>;

/// Commercial state of a record, sent alongside its stage to the record service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Open,
    Won,
    Lost,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Open => "open",
            EntryStatus::Won => "won",
            EntryStatus::Lost => "lost",
        }
    }
}

/// A deal or contact tracked through a funnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Stage label exactly as received
    #[serde(default)]
    pub raw_stage: String,
    /// Normalized funnel stage
    #[serde(default)]
    pub canonical_stage: String,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PipelineRecord {
    pub fn new(id: impl Into<String>, raw_stage: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            company: None,
            title: None,
            raw_stage: raw_stage.into(),
            canonical_stage: String::new(),
            record_type: RecordType::default(),
            value: None,
            probability: None,
            source: None,
        }
    }

    pub fn named(mut self, display_name: &str, company: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self.company = Some(company.to_string());
        self
    }

    pub fn of_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Monetary amount used by aggregation. Missing, negative and
    /// non-finite values count as zero.
    pub fn amount(&self) -> f64 {
        match self.value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => 0.0,
        }
    }

    /// Amount weighted by win probability (0 when probability is unknown)
    pub fn weighted_amount(&self) -> f64 {
        match self.probability {
            Some(p) if p.is_finite() => self.amount() * p.clamp(0.0, 100.0) / 100.0,
            _ => 0.0,
        }
    }
}

/// Fields accepted when creating a record
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_named"))]
pub struct NewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Initial stage label; the funnel's first stage when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A record needs something to show on its card
fn validate_named(record: &NewRecord) -> Result<(), ValidationError> {
    let named = [&record.display_name, &record.company]
        .iter()
        .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()));
    if named {
        return Ok(());
    }
    let mut err = ValidationError::new("unnamed_record");
    err.message = Some("A record needs a display name or a company".into());
    Err(err)
}

impl NewRecord {
    pub fn into_record(self, id: String, raw_stage: String) -> PipelineRecord {
        PipelineRecord {
            id,
            display_name: self.display_name,
            company: self.company,
            title: self.title,
            raw_stage,
            canonical_stage: String::new(),
            record_type: self.record_type,
            value: self.value,
            probability: self.probability,
            source: self.source,
        }
    }
}
