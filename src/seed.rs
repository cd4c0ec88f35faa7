//! Seed data
//!
//! The fixed datasets substituted whenever a collection or the remote record
//! service cannot be read. All fallbacks live here and are injected into the
//! services at construction time. The data is static: two consecutive
//! fallbacks yield identical content.

use crate::pipeline::types::{PipelineRecord, RecordType};
use crate::roadmap::types::{Phase, Priority, RoadmapItem, Status};
use serde::Serialize;

/// Where the data currently held in memory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Read from the store or the remote service
    Live,
    /// Substituted seed data after a failed or empty read
    Fallback,
}

/// Centralized provider of every fallback dataset
#[derive(Debug, Clone)]
pub struct SeedData {
    pub deals: Vec<PipelineRecord>,
    pub contacts: Vec<PipelineRecord>,
    pub roadmap: Vec<RoadmapItem>,
    /// Dropdown entries served when records-by-type cannot be fetched
    pub directory: Vec<PipelineRecord>,
}

impl SeedData {
    /// The built-in demo dataset
    pub fn builtin() -> Self {
        Self {
            deals: builtin_deals(),
            contacts: builtin_contacts(),
            roadmap: builtin_roadmap(),
            directory: builtin_directory(),
        }
    }
}

fn builtin_deals() -> Vec<PipelineRecord> {
    vec![
        PipelineRecord::new("demo-deal-1", "Interested")
            .named("Dana Whitfield", "Northwind Logistics")
            .with_value(45000.0)
            .with_probability(10.0),
        PipelineRecord::new("demo-deal-2", "Had Meeting")
            .named("Priya Raman", "Helios Energy")
            .with_value(120000.0)
            .with_probability(30.0),
        PipelineRecord::new("demo-deal-3", "Contract Negotiations")
            .named("Marco Bianchi", "Atlas Robotics")
            .of_type(RecordType::TechPartner)
            .with_value(80000.0)
            .with_probability(60.0),
        PipelineRecord::new("demo-deal-4", "Contract Signed")
            .named("Lena Okafor", "Bluefin Health")
            .of_type(RecordType::Customer)
            .with_value(150000.0)
            .with_probability(100.0),
        PipelineRecord::new("demo-deal-5", "Interested").named("Sam Ito", "Kite Studio"),
    ]
}

fn builtin_contacts() -> Vec<PipelineRecord> {
    vec![
        PipelineRecord::new("contact-1", "prospecting")
            .named("Avery Chen", "Orbit Analytics")
            .with_value(45000.0),
        PipelineRecord::new("contact-2", "warm")
            .named("Jordan Ellis", "Granite Capital")
            .of_type(RecordType::Collaborator),
        PipelineRecord::new("contact-3", "meeting")
            .named("Noor Haddad", "Cedar Labs")
            .with_value(30000.0)
            .with_probability(40.0),
        PipelineRecord::new("contact-4", "proposal")
            .named("Felix Moreau", "Lumen Retail")
            .with_value(60000.0)
            .with_probability(50.0),
        PipelineRecord::new("contact-5", "negotiation")
            .named("Ines Duarte", "Vela Systems")
            .of_type(RecordType::TechPartner)
            .with_value(90000.0)
            .with_probability(70.0),
        PipelineRecord::new("contact-6", "closed-won")
            .named("Tomas Novak", "Pike Foods")
            .of_type(RecordType::Customer)
            .with_value(25000.0)
            .with_probability(100.0),
    ]
}

fn builtin_directory() -> Vec<PipelineRecord> {
    vec![
        PipelineRecord::new("dir-prospect-1", "interested").named("Riley Park", "Sable Mobility"),
        PipelineRecord::new("dir-prospect-2", "interested").named("Quinn Adler", "Tern Freight"),
        PipelineRecord::new("dir-collab-1", "interested")
            .named("Harper Lowe", "Open Grid Alliance")
            .of_type(RecordType::Collaborator),
        PipelineRecord::new("dir-partner-1", "interested")
            .named("Casey Rowe", "Stackline Cloud")
            .of_type(RecordType::TechPartner),
        PipelineRecord::new("dir-customer-1", "contract-signed")
            .named("Morgan Blake", "Bluefin Health")
            .of_type(RecordType::Customer),
    ]
}

fn item(
    id: &str,
    title: &str,
    phase: Phase,
    status: Status,
    priority: Priority,
    category: &str,
) -> RoadmapItem {
    RoadmapItem {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        phase,
        status,
        priority,
        category: Some(category.to_string()),
        link: None,
        link_label: None,
        recurring: false,
    }
}

fn builtin_roadmap() -> Vec<RoadmapItem> {
    let mut weekly = item(
        "rm-5",
        "Weekly pipeline review",
        Phase::Foundation,
        Status::InProgress,
        Priority::P1,
        "Operations",
    );
    weekly.recurring = true;

    let mut deck = item(
        "rm-2",
        "Partner pitch deck",
        Phase::Foundation,
        Status::InProgress,
        Priority::P0,
        "Marketing",
    );
    deck.link = Some("https://example.com/deck".to_string());
    deck.link_label = Some("Deck draft".to_string());

    vec![
        item("rm-1", "Define ideal customer profile", Phase::Foundation, Status::Done, Priority::P0, "Strategy"),
        deck,
        item("rm-3", "Launch referral programme", Phase::Acceleration, Status::NotStarted, Priority::P1, "Growth"),
        item("rm-4", "Hire second account executive", Phase::Scale, Status::NotStarted, Priority::P2, "Team"),
        weekly,
        item("rm-6", "CRM hygiene automation", Phase::Optimize, Status::NotStarted, Priority::P2, "Operations"),
        item("rm-7", "Tech partner integrations", Phase::Acceleration, Status::InProgress, Priority::P0, "Partnerships"),
    ]
}
