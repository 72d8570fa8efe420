use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixlineError {
    /// Rejected before any mutation; the report never entered the pipeline.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Classifier/trend provider unreachable. Non-fatal; the pipeline
    /// substitutes conservative defaults and proceeds.
    #[error("external data unavailable: {0}")]
    ExternalDataUnavailable(String),

    /// Lock acquisition exhausted its retries. Transient; no partial state
    /// was written and the caller may resubmit the report.
    #[error("concurrency conflict on {0}")]
    ConcurrencyConflict(String),

    /// Store write failed after a decision was made. Fatal for this report;
    /// in-memory state was left untouched (persist-first ordering).
    #[error("store error: {0}")]
    Store(String),

    #[error("ingestion cancelled before mutation")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
