use std::env;

use crate::error::FixlineError;

/// Duplicate-search radius in meters. Sized for GPS error plus "same
/// incident" tolerance, not for neighborhood-level clustering.
pub const DEFAULT_DUP_RADIUS_M: f64 = 150.0;

/// Minimum text similarity for a candidate to stay in the duplicate pool.
pub const DEFAULT_TEXT_THRESHOLD: f64 = 0.4;

/// Candidates not updated within this many days stop absorbing new reports.
pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 30;

/// Age contribution saturates after this many days so stale complaints rise
/// but never dominate on age alone.
pub const DEFAULT_AGE_HORIZON_DAYS: i64 = 14;

/// Scoring weights for the priority formula:
///
///   priority = severity * severity_value
///            + duplicates * ln(1 + linked_report_count)
///            + age * age_factor
///            + trend * historical_weight
///
/// Defaults are plausibility choices, not ground truth; tune against
/// labeled duplicate pairs before trusting the queue ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub severity: f64,
    pub duplicates: f64,
    pub age: f64,
    pub trend: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            severity: 2.0,
            duplicates: 1.5,
            age: 1.0,
            trend: 1.0,
        }
    }
}

/// All tunable knobs of the triage core, loaded from environment variables
/// with documented defaults. Nothing in the engine hard-codes a threshold.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Duplicate-search radius in meters.
    pub dup_radius_m: f64,
    /// Text-similarity threshold for duplicate candidates.
    pub text_threshold: f64,
    /// Recency window in days for duplicate candidates.
    pub recency_window_days: i64,
    /// Age-factor saturation horizon in days.
    pub age_horizon_days: i64,
    pub weights: ScoringWeights,
    /// Attempts to acquire a cell/complaint lock before giving up.
    pub lock_retry_limit: u32,
    /// Per-attempt lock acquisition timeout in milliseconds.
    pub lock_timeout_ms: u64,
    /// Base backoff between lock attempts in milliseconds (linear).
    pub lock_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dup_radius_m: DEFAULT_DUP_RADIUS_M,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
            age_horizon_days: DEFAULT_AGE_HORIZON_DAYS,
            weights: ScoringWeights::default(),
            lock_retry_limit: 3,
            lock_timeout_ms: 250,
            lock_backoff_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `FIXLINE_*` environment variables, falling
    /// back to the documented defaults. Panics with a clear message when a
    /// variable is present but malformed.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            dup_radius_m: env_parse("FIXLINE_DUP_RADIUS_M", d.dup_radius_m),
            text_threshold: env_parse("FIXLINE_TEXT_THRESHOLD", d.text_threshold),
            recency_window_days: env_parse("FIXLINE_RECENCY_WINDOW_DAYS", d.recency_window_days),
            age_horizon_days: env_parse("FIXLINE_AGE_HORIZON_DAYS", d.age_horizon_days),
            weights: ScoringWeights {
                severity: env_parse("FIXLINE_WEIGHT_SEVERITY", d.weights.severity),
                duplicates: env_parse("FIXLINE_WEIGHT_DUPLICATES", d.weights.duplicates),
                age: env_parse("FIXLINE_WEIGHT_AGE", d.weights.age),
                trend: env_parse("FIXLINE_WEIGHT_TREND", d.weights.trend),
            },
            lock_retry_limit: env_parse("FIXLINE_LOCK_RETRY_LIMIT", d.lock_retry_limit),
            lock_timeout_ms: env_parse("FIXLINE_LOCK_TIMEOUT_MS", d.lock_timeout_ms),
            lock_backoff_ms: env_parse("FIXLINE_LOCK_BACKOFF_MS", d.lock_backoff_ms),
        }
    }

    /// Reject configurations the engine cannot honor. The radius ceiling
    /// comes from the geo index: its neighbor ring only guarantees full
    /// coverage up to one geohash-6 cell dimension (~600m).
    pub fn validate(&self) -> Result<(), FixlineError> {
        if !(self.dup_radius_m > 0.0 && self.dup_radius_m <= 600.0) {
            return Err(FixlineError::Config(format!(
                "dup_radius_m must be in (0, 600], got {}",
                self.dup_radius_m
            )));
        }
        if !(0.0..=1.0).contains(&self.text_threshold) {
            return Err(FixlineError::Config(format!(
                "text_threshold must be in [0, 1], got {}",
                self.text_threshold
            )));
        }
        if self.recency_window_days <= 0 {
            return Err(FixlineError::Config(
                "recency_window_days must be positive".to_string(),
            ));
        }
        if self.age_horizon_days <= 0 {
            return Err(FixlineError::Config(
                "age_horizon_days must be positive".to_string(),
            ));
        }
        let w = &self.weights;
        if [w.severity, w.duplicates, w.age, w.trend]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(FixlineError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        if self.lock_retry_limit == 0 {
            return Err(FixlineError::Config(
                "lock_retry_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must parse as {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn radius_ceiling_enforced() {
        let cfg = EngineConfig {
            dup_radius_m: 601.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_radius_rejected() {
        let cfg = EngineConfig {
            dup_radius_m: 0.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let cfg = EngineConfig {
            text_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_weight_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.weights.trend = -0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_retry_limit_rejected() {
        let cfg = EngineConfig {
            lock_retry_limit: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
