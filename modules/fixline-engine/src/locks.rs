//! Keyed exclusive locks for the decide-then-mutate critical section.
//!
//! One lock per geohash-6 cell serializes the "no duplicate found, create"
//! path against concurrent reports for the same spot; one lock per complaint
//! id serializes merges. Acquisition is bounded: per-attempt timeout, linear
//! backoff, then `ConcurrencyConflict`. A held-forever lock must surface as
//! a transient failure, not wedge the worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use fixline_common::{EngineConfig, FixlineError};

pub struct LockMap {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockMap {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `key`, retrying up to the configured limit with
    /// linear backoff. The guard releases on drop, on every exit path.
    pub async fn acquire(
        &self,
        key: &str,
        cfg: &EngineConfig,
    ) -> Result<OwnedMutexGuard<()>, FixlineError> {
        let lock = self.lock_for(key);
        let timeout = Duration::from_millis(cfg.lock_timeout_ms);

        for attempt in 1..=cfg.lock_retry_limit {
            match tokio::time::timeout(timeout, lock.clone().lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) if attempt < cfg.lock_retry_limit => {
                    let backoff = Duration::from_millis(cfg.lock_backoff_ms * attempt as u64);
                    warn!(key, attempt, "lock attempt timed out, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(_) => break,
            }
        }

        Err(FixlineError::ConcurrencyConflict(key.to_string()))
    }
}

impl Default for LockMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_cfg() -> EngineConfig {
        EngineConfig {
            lock_retry_limit: 2,
            lock_timeout_ms: 20,
            lock_backoff_ms: 5,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let locks = LockMap::new();
        let cfg = fast_cfg();
        let guard = locks.acquire("cell-a", &cfg).await.unwrap();
        drop(guard);
        // Re-acquirable after release
        assert!(locks.acquire("cell-a", &cfg).await.is_ok());
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = LockMap::new();
        let cfg = fast_cfg();
        let _a = locks.acquire("cell-a", &cfg).await.unwrap();
        assert!(locks.acquire("cell-b", &cfg).await.is_ok());
    }

    #[tokio::test]
    async fn held_lock_times_out_into_conflict() {
        let locks = LockMap::new();
        let cfg = fast_cfg();
        let _held = locks.acquire("cell-a", &cfg).await.unwrap();

        match locks.acquire("cell-a", &cfg).await {
            Err(FixlineError::ConcurrencyConflict(key)) => assert_eq!(key, "cell-a"),
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_serializes_critical_sections() {
        let locks = Arc::new(LockMap::new());
        let cfg = EngineConfig {
            lock_retry_limit: 50,
            lock_timeout_ms: 100,
            lock_backoff_ms: 1,
            ..EngineConfig::default()
        };
        let in_section = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let cfg = cfg.clone();
            let in_section = in_section.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("cell-a", &cfg).await.unwrap();
                let inside = in_section.fetch_add(1, Ordering::SeqCst);
                assert_eq!(inside, 0, "two tasks inside the same critical section");
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
