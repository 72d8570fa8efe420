//! Trait boundaries to the excluded collaborators.
//!
//! The persistent complaint store and the historical-trend provider live
//! outside this core; the pipeline sees them only through these traits,
//! which keeps it testable with in-memory doubles (no database, no network).

use anyhow::Result;
use async_trait::async_trait;

use fixline_common::Complaint;

/// Read/write access to the complaint store. `load_open_complaints` warms
/// the geo index and registry at startup; `save` persists every mutation.
///
/// The pipeline persists BEFORE touching in-memory state, so an
/// implementation that fails a `save` must leave the stored complaint
/// unchanged: partial writes are its bug to prevent, not ours to repair.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// All complaints with status != Resolved.
    async fn load_open_complaints(&self) -> Result<Vec<Complaint>>;

    /// Insert or overwrite one complaint by id.
    async fn save(&self, complaint: &Complaint) -> Result<()>;
}

/// Per-(category, area) complaint-velocity indicator, already resolved by
/// the caller's infrastructure. Synchronous by contract: the core never
/// blocks on a network call, so implementations are expected to answer from
/// a precomputed table. An `Err` is non-fatal: the pipeline substitutes a
/// zero weight and logs.
pub trait TrendProvider: Send + Sync {
    fn trend_weight(&self, category: Option<&str>, area: &str) -> Result<f64>;
}

/// The no-signal provider: every lookup weighs zero. Useful as a default
/// and wherever trend data simply does not exist yet.
pub struct ZeroTrend;

impl TrendProvider for ZeroTrend {
    fn trend_weight(&self, _category: Option<&str>, _area: &str) -> Result<f64> {
        Ok(0.0)
    }
}
