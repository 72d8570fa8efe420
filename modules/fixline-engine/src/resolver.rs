//! The duplicate/new-complaint decision.
//!
//! `resolve` is a pure function over a report and a candidate snapshot: no
//! store, no locks, no side effects. The ingestion pipeline performs the
//! actual mutation, which keeps this independently testable with synthetic
//! candidate sets.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use fixline_common::{Complaint, EngineConfig, Report};

use crate::similarity::{normalize, similarity};

/// Weight of text similarity in the combined candidate ranking.
const TEXT_WEIGHT: f64 = 0.6;

/// Weight of spatial proximity in the combined candidate ranking.
const PROXIMITY_WEIGHT: f64 = 0.4;

/// An empty-description report carries no text evidence, so it may only
/// merge on a very close spatial match: distance within this fraction of the
/// duplicate radius. Deliberately conservative, since pure-location dedup can be
/// wrong.
const EMPTY_TEXT_RADIUS_FRACTION: f64 = 0.2;

/// The outcome of duplicate resolution for a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No open complaint matched; found a new one.
    NewComplaint,
    /// The report duplicates this open complaint.
    MergeInto(Uuid),
}

/// Decide whether `report` duplicates one of `candidates`.
///
/// Candidates come from a Geo-Index radius query as `(complaint, distance)`
/// pairs. A candidate survives filtering when its text similarity clears the
/// threshold (or the empty-text fallback applies), categories are compatible
/// (equal, or either side unknown), and it was updated within the recency
/// window. Survivors are ranked by `0.6*text + 0.4*proximity`; ties break to
/// the lowest complaint id so the decision is deterministic.
pub fn resolve(
    report: &Report,
    candidates: &[(Complaint, f64)],
    now: DateTime<Utc>,
    cfg: &EngineConfig,
) -> Decision {
    let recency_cutoff = now - Duration::days(cfg.recency_window_days);
    let text_is_empty = normalize(&report.description).is_empty();

    let mut best: Option<(Uuid, f64)> = None;

    for (candidate, distance) in candidates {
        // The index only holds open complaints; re-check anyway.
        if !candidate.status.is_open() {
            continue;
        }
        if candidate.last_update < recency_cutoff {
            continue;
        }
        if !categories_compatible(report.category.as_deref(), candidate.category.as_deref()) {
            continue;
        }

        let text_score = if text_is_empty {
            if *distance > cfg.dup_radius_m * EMPTY_TEXT_RADIUS_FRACTION {
                continue;
            }
            0.0
        } else {
            let score = similarity(&report.description, &candidate.description);
            if score < cfg.text_threshold {
                continue;
            }
            score
        };

        let proximity = (1.0 - distance / cfg.dup_radius_m).clamp(0.0, 1.0);
        let combined = TEXT_WEIGHT * text_score + PROXIMITY_WEIGHT * proximity;

        let replace = match best {
            None => true,
            Some((best_id, best_score)) => {
                combined > best_score || (combined == best_score && candidate.id < best_id)
            }
        };
        if replace {
            best = Some((candidate.id, combined));
        }
    }

    match best {
        Some((id, _)) => Decision::MergeInto(id),
        None => Decision::NewComplaint,
    }
}

/// A missing category label matches anything; two known labels must agree.
fn categories_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}
