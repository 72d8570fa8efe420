//! The ingestion pipeline.
//!
//! Per incoming report: validate → cell lock → index lookup → resolve
//! (pure) → mutate (persist first, then memory) → emit one status event.
//! The decide-then-mutate sequence is serialized per geohash-6 cell so two
//! concurrent reports for the same spot cannot both decide "no duplicate"
//! and double-create; merges additionally serialize per complaint id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fixline_common::{
    CancelFlag, Complaint, ComplaintStatus, EngineConfig, FixlineError, Report, StatusEvent,
    StatusEventKind,
};
use fixline_index::{area_key, cell_key, GeoIndex};

use crate::locks::LockMap;
use crate::resolver::{resolve, Decision};
use crate::score::priority_score;
use crate::store::{ComplaintStore, TrendProvider};

/// Buffered status events per subscriber; a slow dashboard lags, it does not
/// block ingestion.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What `ingest` hands back to the reporting UI: the decision, the complaint
/// the report ended up in, and its resulting priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    pub decision: Decision,
    pub complaint_id: Uuid,
    pub priority: f64,
}

/// The triage core service. Owns the geo index and the open-complaint
/// registry; everything else is reached through explicit trait references,
/// so tests run against synthetic stores.
pub struct IngestPipeline {
    store: Arc<dyn ComplaintStore>,
    trends: Arc<dyn TrendProvider>,
    index: GeoIndex,
    /// Open complaints by id. Guards are never held across an await.
    open: RwLock<HashMap<Uuid, Complaint>>,
    cell_locks: LockMap,
    complaint_locks: LockMap,
    events: broadcast::Sender<StatusEvent>,
    cfg: EngineConfig,
}

impl IngestPipeline {
    /// Build the service and warm the geo index + registry from the store.
    pub async fn new(
        store: Arc<dyn ComplaintStore>,
        trends: Arc<dyn TrendProvider>,
        cfg: EngineConfig,
    ) -> Result<Self, FixlineError> {
        cfg.validate()?;

        let complaints = store
            .load_open_complaints()
            .await
            .map_err(|e| FixlineError::Store(e.to_string()))?;

        let index = GeoIndex::new();
        let mut open = HashMap::new();
        for complaint in complaints {
            if !complaint.status.is_open() {
                continue;
            }
            index.insert(complaint.id, complaint.location)?;
            open.insert(complaint.id, complaint);
        }
        info!(open = open.len(), "warmed geo index from complaint store");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            store,
            trends,
            index,
            open: RwLock::new(open),
            cell_locks: LockMap::new(),
            complaint_locks: LockMap::new(),
            events,
            cfg,
        })
    }

    /// Process one report end-to-end. Exactly-once: either every side effect
    /// of the outcome happens (store write, memory update, event) or none.
    pub async fn ingest(&self, report: Report) -> Result<IngestOutcome, FixlineError> {
        self.ingest_cancellable(report, &CancelFlag::new()).await
    }

    /// `ingest` with a caller-supplied cancellation signal. Cancellation is
    /// honored before any mutation, never mid-mutation.
    pub async fn ingest_cancellable(
        &self,
        report: Report,
        cancel: &CancelFlag,
    ) -> Result<IngestOutcome, FixlineError> {
        validate_report(&report)?;

        let cell = cell_key(report.location)?;
        let _cell_guard = self.cell_locks.acquire(&cell, &self.cfg).await?;
        if cancel.is_cancelled() {
            return Err(FixlineError::Cancelled);
        }

        let hits = self
            .index
            .query_radius(report.location, self.cfg.dup_radius_m)?;
        let candidates: Vec<(Complaint, f64)> = {
            let open = self.open.read().expect("registry lock poisoned");
            hits.iter()
                .filter_map(|(id, distance)| open.get(id).map(|c| (c.clone(), *distance)))
                .collect()
        };
        debug!(cell = %cell, candidates = candidates.len(), "gathered duplicate candidates");

        let now = Utc::now();
        match resolve(&report, &candidates, now, &self.cfg) {
            Decision::NewComplaint => self.create_complaint(&report, cancel, now).await,
            Decision::MergeInto(id) => self.merge_into(id, &report, cancel, now).await,
        }
    }

    /// Authority action: transition status, re-score synchronously, emit
    /// `Rescored`. Entering `Resolved` removes the complaint from the
    /// duplicate-matching pool (registry + index) while the store keeps it
    /// for audit.
    pub async fn update_status(
        &self,
        complaint_id: Uuid,
        status: ComplaintStatus,
    ) -> Result<f64, FixlineError> {
        let _guard = self
            .complaint_locks
            .acquire(&complaint_id.to_string(), &self.cfg)
            .await?;

        let mut updated = {
            let open = self.open.read().expect("registry lock poisoned");
            open.get(&complaint_id).cloned().ok_or_else(|| {
                FixlineError::InvalidInput(format!("unknown or resolved complaint {complaint_id}"))
            })?
        };

        let now = Utc::now();
        updated.status = status;
        updated.last_update = now;
        updated.priority = self.score_with_trend(&updated, now);

        self.store
            .save(&updated)
            .await
            .map_err(|e| FixlineError::Store(e.to_string()))?;

        {
            let mut open = self.open.write().expect("registry lock poisoned");
            if status.is_open() {
                open.insert(complaint_id, updated.clone());
            } else {
                open.remove(&complaint_id);
            }
        }
        if !status.is_open() {
            self.index.remove(complaint_id);
        }

        info!(complaint_id = %complaint_id, status = %status, priority = updated.priority, "status updated");
        self.emit(StatusEvent::new(
            complaint_id,
            StatusEventKind::Rescored,
            updated.priority,
        ));
        Ok(updated.priority)
    }

    /// Subscribe to the status event stream (Created / Merged / Rescored).
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Snapshot of one open complaint, for callers showing immediate
    /// feedback. `None` for unknown or resolved ids.
    pub fn open_complaint(&self, id: Uuid) -> Option<Complaint> {
        self.open
            .read()
            .expect("registry lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn open_count(&self) -> usize {
        self.open.read().expect("registry lock poisoned").len()
    }

    // --- mutation paths (cell lock held by caller) ---

    async fn create_complaint(
        &self,
        report: &Report,
        cancel: &CancelFlag,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, FixlineError> {
        let mut complaint = Complaint::from_report(report, now);
        complaint.priority = self.score_with_trend(&complaint, now);

        if cancel.is_cancelled() {
            return Err(FixlineError::Cancelled);
        }
        // Persist first: a failed save leaves index and registry untouched.
        self.store
            .save(&complaint)
            .await
            .map_err(|e| FixlineError::Store(e.to_string()))?;

        self.index.insert(complaint.id, complaint.location)?;
        self.open
            .write()
            .expect("registry lock poisoned")
            .insert(complaint.id, complaint.clone());

        info!(complaint_id = %complaint.id, priority = complaint.priority, "complaint created");
        self.emit(StatusEvent::new(
            complaint.id,
            StatusEventKind::Created,
            complaint.priority,
        ));
        Ok(IngestOutcome {
            decision: Decision::NewComplaint,
            complaint_id: complaint.id,
            priority: complaint.priority,
        })
    }

    async fn merge_into(
        &self,
        complaint_id: Uuid,
        report: &Report,
        cancel: &CancelFlag,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, FixlineError> {
        // Cell lock is already held; complaint lock always comes second, so
        // the acquisition order is fixed and cannot deadlock.
        let _guard = self
            .complaint_locks
            .acquire(&complaint_id.to_string(), &self.cfg)
            .await?;

        // Re-read under the complaint lock: the target may have been
        // resolved by an authority action since the decision was made.
        let mut updated = {
            let open = self.open.read().expect("registry lock poisoned");
            match open.get(&complaint_id) {
                Some(c) if c.status.is_open() => c.clone(),
                _ => {
                    return Err(FixlineError::ConcurrencyConflict(format!(
                        "complaint {complaint_id} no longer open"
                    )))
                }
            }
        };

        updated.merge_report(report, now);
        updated.priority = self.score_with_trend(&updated, now);

        if cancel.is_cancelled() {
            return Err(FixlineError::Cancelled);
        }
        self.store
            .save(&updated)
            .await
            .map_err(|e| FixlineError::Store(e.to_string()))?;

        self.open
            .write()
            .expect("registry lock poisoned")
            .insert(complaint_id, updated.clone());

        info!(
            complaint_id = %complaint_id,
            linked_reports = updated.report_count(),
            severity = %updated.severity,
            priority = updated.priority,
            "report merged into complaint"
        );
        self.emit(StatusEvent::new(
            complaint_id,
            StatusEventKind::Merged,
            updated.priority,
        ));
        Ok(IngestOutcome {
            decision: Decision::MergeInto(complaint_id),
            complaint_id,
            priority: updated.priority,
        })
    }

    /// Priority with the trend weight resolved for this complaint's
    /// (category, area). Provider failure downgrades to zero weight; the
    /// report must never be lost to a missing trend table.
    fn score_with_trend(&self, complaint: &Complaint, now: DateTime<Utc>) -> f64 {
        let weight = match area_key(complaint.location) {
            Ok(area) => match self
                .trends
                .trend_weight(complaint.category.as_deref(), &area)
            {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "trend provider unavailable, scoring with zero weight");
                    0.0
                }
            },
            Err(_) => 0.0,
        };
        priority_score(complaint, weight, now, &self.cfg)
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine; events are best-effort fan-out.
        let _ = self.events.send(event);
    }
}

fn validate_report(report: &Report) -> Result<(), FixlineError> {
    if !report.location.is_valid() {
        return Err(FixlineError::InvalidInput(format!(
            "location out of range: ({}, {})",
            report.location.lat, report.location.lng
        )));
    }
    if report.reporter_id.trim().is_empty() {
        return Err(FixlineError::InvalidInput(
            "reporter_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
