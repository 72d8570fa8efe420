//! Test doubles for the pipeline's trait boundaries.
//!
//! - `MemoryStore` (ComplaintStore): stateful in-memory map
//! - `FailingStore` (ComplaintStore): every save fails, for persist-first tests
//! - `StaticTrend` / `FailingTrend` (TrendProvider)
//!
//! Plus report fixture builders and named coordinates.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use fixline_common::{Complaint, GeoPoint, Report, Severity};

use crate::store::{ComplaintStore, TrendProvider};

// ---------------------------------------------------------------------------
// Test coordinates
// ---------------------------------------------------------------------------

/// A block of Main St.
pub const MAIN_ST: GeoPoint = GeoPoint { lat: 12.9000, lng: 77.6000 };
/// ~1.5km from MAIN_ST, outside any sane duplicate radius.
pub const MARKET_SQ: GeoPoint = GeoPoint { lat: 12.9100, lng: 77.6100 };

// ---------------------------------------------------------------------------
// Report fixtures
// ---------------------------------------------------------------------------

/// A plausible infrastructure report at the given coordinates.
pub fn report_at(lat: f64, lng: f64) -> Report {
    report_builder().location(GeoPoint { lat, lng }).build()
}

pub fn report_builder() -> ReportBuilder {
    ReportBuilder {
        reporter_id: "citizen-1".to_string(),
        description: "pothole on Main St".to_string(),
        location: MAIN_ST,
        category: Some("infrastructure".to_string()),
        severity: Some(Severity::Medium),
    }
}

pub struct ReportBuilder {
    reporter_id: String,
    description: String,
    location: GeoPoint,
    category: Option<String>,
    severity: Option<Severity>,
}

impl ReportBuilder {
    pub fn reporter(mut self, reporter_id: &str) -> Self {
        self.reporter_id = reporter_id.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn location(mut self, location: GeoPoint) -> Self {
        self.location = location;
        self
    }

    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(str::to_string);
        self
    }

    pub fn severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    pub fn build(self) -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: self.reporter_id,
            description: self.description,
            location: self.location,
            category: self.category,
            severity: self.severity,
            media_refs: vec![],
            submitted_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Stateful in-memory complaint store. Keeps everything ever saved,
/// including resolved complaints, like a real store would.
pub struct MemoryStore {
    complaints: Mutex<HashMap<Uuid, Complaint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            complaints: Mutex::new(HashMap::new()),
        }
    }

    /// Everything in the store, resolved included.
    pub fn all(&self) -> Vec<Complaint> {
        self.complaints
            .lock()
            .expect("memory store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Complaint> {
        self.complaints
            .lock()
            .expect("memory store lock poisoned")
            .get(&id)
            .cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn load_open_complaints(&self) -> Result<Vec<Complaint>> {
        Ok(self
            .complaints
            .lock()
            .expect("memory store lock poisoned")
            .values()
            .filter(|c| c.status.is_open())
            .cloned()
            .collect())
    }

    async fn save(&self, complaint: &Complaint) -> Result<()> {
        self.complaints
            .lock()
            .expect("memory store lock poisoned")
            .insert(complaint.id, complaint.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// Loads empty, fails every save. For asserting that persist-first ordering
/// leaves in-memory state untouched on store failure.
pub struct FailingStore;

#[async_trait]
impl ComplaintStore for FailingStore {
    async fn load_open_complaints(&self) -> Result<Vec<Complaint>> {
        Ok(Vec::new())
    }

    async fn save(&self, _complaint: &Complaint) -> Result<()> {
        bail!("disk full")
    }
}

// ---------------------------------------------------------------------------
// Trend providers
// ---------------------------------------------------------------------------

/// Answers every lookup with the same weight.
pub struct StaticTrend(pub f64);

impl TrendProvider for StaticTrend {
    fn trend_weight(&self, _category: Option<&str>, _area: &str) -> Result<f64> {
        Ok(self.0)
    }
}

/// Always unreachable; the pipeline must degrade to zero weight.
pub struct FailingTrend;

impl TrendProvider for FailingTrend {
    fn trend_weight(&self, _category: Option<&str>, _area: &str) -> Result<f64> {
        bail!("trend service unreachable")
    }
}
