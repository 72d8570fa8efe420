//! The triage core of the complaint platform: duplicate detection and
//! urgency prioritization over a concurrent stream of citizen reports.
//!
//! Flow per report: geo-index lookup → text similarity → duplicate
//! resolution (pure) → merge or create → priority score → persist + status
//! event. See `pipeline::IngestPipeline` for the entry point.

pub mod locks;
pub mod pipeline;
pub mod resolver;
pub mod score;
pub mod similarity;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use pipeline::{IngestOutcome, IngestPipeline};
pub use resolver::{resolve, Decision};
pub use score::priority_score;
pub use similarity::similarity;
pub use store::{ComplaintStore, TrendProvider, ZeroTrend};
