//! Priority scoring for the triage queue.
//!
//! Formula:
//!   priority = w_severity * severity_value
//!            + w_duplicates * ln(1 + linked_report_count)
//!            + w_age * age_factor
//!            + w_trend * historical_weight
//!
//! Duplicate count is log-damped so report piling yields diminishing
//! returns. The age factor grows linearly and saturates at the configured
//! horizon so unresolved complaints surface over time without drifting
//! unbounded. `historical_weight` is the externally supplied per
//! (category, area) trend indicator.

use chrono::{DateTime, Utc};

use fixline_common::{Complaint, EngineConfig};

/// Pure function of current complaint state plus the trend input. The
/// pipeline recomputes it synchronously after every mutation that touches
/// one of its inputs; a stored priority is never stale.
pub fn priority_score(
    complaint: &Complaint,
    historical_weight: f64,
    now: DateTime<Utc>,
    cfg: &EngineConfig,
) -> f64 {
    let w = &cfg.weights;

    let severity_value = complaint.severity.value();
    let pressure = (1.0 + complaint.report_count() as f64).ln();
    let age_factor = age_factor(complaint.created_at, now, cfg.age_horizon_days);

    w.severity * severity_value
        + w.duplicates * pressure
        + w.age * age_factor
        + w.trend * historical_weight
}

/// Capped linear growth: 0.0 at creation, 1.0 at the horizon and beyond.
fn age_factor(created_at: DateTime<Utc>, now: DateTime<Utc>, horizon_days: i64) -> f64 {
    let age_secs = (now - created_at).num_seconds().max(0) as f64;
    let horizon_secs = (horizon_days * 86_400) as f64;
    (age_secs / horizon_secs).min(1.0)
}
