use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// A point is usable when both coordinates are finite and within the
    /// valid lat/lng ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine great-circle distance between two lat/lng points in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_M * c
}

// --- Enums ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ordinal value used by the priority scorer: Low=1.0 .. Critical=4.0.
    pub fn value(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 2.0,
            Severity::High => 3.0,
            Severity::Critical => 4.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Reported,
    Acknowledged,
    Assigned,
    Resolved,
}

impl ComplaintStatus {
    /// Resolved complaints stay in the store for audit but leave the
    /// duplicate-matching pool.
    pub fn is_open(&self) -> bool {
        !matches!(self, ComplaintStatus::Resolved)
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplaintStatus::Reported => write!(f, "reported"),
            ComplaintStatus::Acknowledged => write!(f, "acknowledged"),
            ComplaintStatus::Assigned => write!(f, "assigned"),
            ComplaintStatus::Resolved => write!(f, "resolved"),
        }
    }
}

// --- Report ---

/// A raw citizen submission. Immutable once created; category and severity
/// arrive pre-resolved from the external classifier/CV services and are
/// absent when those services had nothing to say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: String,
    pub description: String,
    pub location: GeoPoint,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    /// Opaque media references; never processed here.
    pub media_refs: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

// --- Complaint ---

/// Severity assumed when a founding report carries no classifier hint.
/// Midpoint rather than Low so untagged reports are not systematically buried.
pub const DEFAULT_SEVERITY: Severity = Severity::Medium;

/// The canonical aggregate a triage queue is built from. One complaint per
/// real-world incident; duplicate reports merge into it.
///
/// `description` and `location` are the founding report's, the
/// representative exemplar. `linked_reports` is append-only and non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub description: String,
    pub location: GeoPoint,
    pub category: Option<String>,
    pub severity: Severity,
    pub status: ComplaintStatus,
    pub linked_reports: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub priority: f64,
}

impl Complaint {
    /// Found a new complaint from its first report. Priority starts at 0.0
    /// and is computed by the scorer before the complaint is persisted.
    pub fn from_report(report: &Report, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: report.description.clone(),
            location: report.location,
            category: report.category.clone(),
            severity: report.severity.unwrap_or(DEFAULT_SEVERITY),
            status: ComplaintStatus::Reported,
            linked_reports: vec![report.id],
            created_at: now,
            last_update: now,
            priority: 0.0,
        }
    }

    /// Absorb a duplicate report: append it, raise severity when the new
    /// report's hint is stronger, adopt a category when none was known, and
    /// bump `last_update`. Never lowers severity or rewrites the
    /// representative text/location.
    pub fn merge_report(&mut self, report: &Report, now: DateTime<Utc>) {
        self.linked_reports.push(report.id);
        if let Some(sev) = report.severity {
            self.severity = self.severity.max(sev);
        }
        if self.category.is_none() {
            self.category = report.category.clone();
        }
        self.last_update = now;
    }

    pub fn report_count(&self) -> usize {
        self.linked_reports.len()
    }
}

// --- Cancellation ---

/// Caller-supplied cancellation signal. The pipeline checks it before any
/// mutation and aborts cleanly; it never stops mid-mutation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_at(lat: f64, lng: f64) -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: "citizen-1".to_string(),
            description: "pothole on Main St".to_string(),
            location: GeoPoint { lat, lng },
            category: Some("infrastructure".to_string()),
            severity: Some(Severity::Medium),
            media_refs: vec![],
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_same_point_is_zero() {
        let p = GeoPoint { lat: 12.90, lng: 77.60 };
        assert!(haversine_m(p, p) < 0.001);
    }

    #[test]
    fn haversine_main_street_block() {
        // ~60m apart along the same street
        let a = GeoPoint { lat: 12.9000, lng: 77.6000 };
        let b = GeoPoint { lat: 12.9005, lng: 77.6002 };
        let d = haversine_m(a, b);
        assert!((50.0..80.0).contains(&d), "expected ~60m, got {d}");
    }

    #[test]
    fn haversine_across_town() {
        // Bengaluru city center to Whitefield, ~15km
        let a = GeoPoint { lat: 12.9716, lng: 77.5946 };
        let b = GeoPoint { lat: 12.9698, lng: 77.7500 };
        let d = haversine_m(a, b);
        assert!((d - 16_800.0).abs() < 2_000.0, "expected ~16.8km, got {d}");
    }

    #[test]
    fn geopoint_validity() {
        assert!(GeoPoint { lat: 12.9, lng: 77.6 }.is_valid());
        assert!(GeoPoint { lat: -90.0, lng: 180.0 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: 0.0, lng: -181.0 }.is_valid());
        assert!(!GeoPoint { lat: f64::NAN, lng: 0.0 }.is_valid());
    }

    #[test]
    fn severity_ordering_and_values() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Low.value(), 1.0);
        assert_eq!(Severity::Critical.value(), 4.0);
    }

    #[test]
    fn resolved_is_not_open() {
        assert!(ComplaintStatus::Reported.is_open());
        assert!(ComplaintStatus::Acknowledged.is_open());
        assert!(ComplaintStatus::Assigned.is_open());
        assert!(!ComplaintStatus::Resolved.is_open());
    }

    #[test]
    fn founding_report_becomes_sole_link() {
        let report = report_at(12.90, 77.60);
        let complaint = Complaint::from_report(&report, Utc::now());
        assert_eq!(complaint.linked_reports, vec![report.id]);
        assert_eq!(complaint.description, report.description);
        assert_eq!(complaint.severity, Severity::Medium);
        assert_eq!(complaint.status, ComplaintStatus::Reported);
    }

    #[test]
    fn founding_without_severity_defaults_to_medium() {
        let mut report = report_at(12.90, 77.60);
        report.severity = None;
        let complaint = Complaint::from_report(&report, Utc::now());
        assert_eq!(complaint.severity, DEFAULT_SEVERITY);
    }

    #[test]
    fn merge_appends_and_raises_severity() {
        let founder = report_at(12.90, 77.60);
        let mut complaint = Complaint::from_report(&founder, Utc::now());

        let mut dup = report_at(12.9005, 77.6002);
        dup.severity = Some(Severity::High);
        let later = Utc::now();
        complaint.merge_report(&dup, later);

        assert_eq!(complaint.report_count(), 2);
        assert_eq!(complaint.linked_reports, vec![founder.id, dup.id]);
        assert_eq!(complaint.severity, Severity::High);
        assert_eq!(complaint.last_update, later);
    }

    #[test]
    fn merge_never_lowers_severity() {
        let mut founder = report_at(12.90, 77.60);
        founder.severity = Some(Severity::Critical);
        let mut complaint = Complaint::from_report(&founder, Utc::now());

        let mut dup = report_at(12.90, 77.60);
        dup.severity = Some(Severity::Low);
        complaint.merge_report(&dup, Utc::now());
        assert_eq!(complaint.severity, Severity::Critical);
    }

    #[test]
    fn merge_adopts_category_only_when_unknown() {
        let mut founder = report_at(12.90, 77.60);
        founder.category = None;
        let mut complaint = Complaint::from_report(&founder, Utc::now());
        assert!(complaint.category.is_none());

        let dup = report_at(12.90, 77.60);
        complaint.merge_report(&dup, Utc::now());
        assert_eq!(complaint.category.as_deref(), Some("infrastructure"));

        let mut other = report_at(12.90, 77.60);
        other.category = Some("sanitation".to_string());
        complaint.merge_report(&other, Utc::now());
        assert_eq!(complaint.category.as_deref(), Some("infrastructure"));
    }

    #[test]
    fn merge_keeps_representative_text_and_location() {
        let founder = report_at(12.90, 77.60);
        let mut complaint = Complaint::from_report(&founder, Utc::now());

        let mut dup = report_at(12.9005, 77.6002);
        dup.description = "big pothole, Main Street".to_string();
        complaint.merge_report(&dup, Utc::now());

        assert_eq!(complaint.description, "pothole on Main St");
        assert_eq!(complaint.location, founder.location);
    }

    #[test]
    fn cancel_flag_flips_once() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        let clone = flag.clone();
        assert!(clone.is_cancelled());
    }
}
