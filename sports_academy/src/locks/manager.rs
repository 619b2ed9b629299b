//! Keyed async lock manager with ordered acquisition and bounded waits.

use super::{
    errors::{LockError, LockResult},
    keys::LockKey,
};
use crate::telemetry::Telemetry;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    time::Instant,
};

/// Lock manager configuration
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Maximum time to wait for the whole set of keys in one acquisition
    pub wait_timeout: Duration,

    /// Holds longer than this are reported as warnings
    pub hold_warning_threshold: Duration,
}

impl LockConfig {
    /// Create configuration from environment variables
    ///
    /// - `LOCK_WAIT_TIMEOUT_MS` (default: 5000)
    /// - `LOCK_HOLD_WARNING_MS` (default: 500)
    pub fn from_env() -> Self {
        let wait_ms = std::env::var("LOCK_WAIT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);
        let warn_ms = std::env::var("LOCK_HOLD_WARNING_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self {
            wait_timeout: Duration::from_millis(wait_ms),
            hold_warning_threshold: Duration::from_millis(warn_ms),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            hold_warning_threshold: Duration::from_millis(500),
        }
    }
}

type Slot = Arc<AsyncMutex<()>>;

struct Inner {
    slots: Mutex<HashMap<LockKey, Slot>>,
    config: LockConfig,
    telemetry: Arc<dyn Telemetry>,
}

impl Inner {
    fn slot(&self, key: &LockKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop slots nobody holds or waits on.
    fn prune(&self, keys: &[LockKey]) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            let idle = slots
                .get(key)
                .is_some_and(|slot| Arc::strong_count(slot) == 1);
            if idle {
                slots.remove(key);
            }
        }
    }
}

/// Lock manager
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<Inner>,
}

impl LockManager {
    /// Create a new lock manager
    ///
    /// # Arguments
    ///
    /// * `config` - Wait and hold thresholds
    /// * `telemetry` - Receives acquisition and release timings
    pub fn new(config: LockConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                config,
                telemetry,
            }),
        }
    }

    /// Acquire every key in global order
    ///
    /// Duplicate keys are collapsed. If any key cannot be taken before the
    /// configured timeout, everything already taken is released and
    /// `LockError::Timeout` is returned.
    ///
    /// # Arguments
    ///
    /// * `operation` - Name reported with the hold duration
    /// * `keys` - Entities to lock, in any order
    pub async fn acquire<I>(&self, operation: &'static str, keys: I) -> LockResult<LockScope>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let mut scope = LockScope {
            inner: self.inner.clone(),
            operation,
            guards: Vec::new(),
            acquired_at: Instant::now(),
        };
        scope.extend(keys).await?;
        scope.acquired_at = Instant::now();
        Ok(scope)
    }

    /// Number of lock slots currently tracked
    pub fn tracked_slots(&self) -> usize {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Active configuration
    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }
}

/// A set of held locks, released on drop
pub struct LockScope {
    inner: Arc<Inner>,
    operation: &'static str,
    guards: Vec<(LockKey, OwnedMutexGuard<()>)>,
    acquired_at: Instant,
}

impl LockScope {
    /// Take further keys
    ///
    /// Keys already held are skipped. Every new key must sort after every
    /// held key, otherwise `LockError::OrderViolation` is returned and nothing
    /// new is taken. On timeout the keys taken by this call are released; the
    /// previously held ones stay held.
    pub async fn extend<I>(&mut self, keys: I) -> LockResult<()>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let mut wanted: Vec<LockKey> = keys.into_iter().filter(|k| !self.holds(k)).collect();
        wanted.sort();
        wanted.dedup();

        if let (Some((held, _)), Some(first)) = (self.guards.last(), wanted.first()) {
            if first < held {
                return Err(LockError::OrderViolation {
                    held: held.clone(),
                    requested: first.clone(),
                });
            }
        }

        let previously_held = self.guards.len();
        let started = Instant::now();
        let deadline = started + self.inner.config.wait_timeout;

        for key in wanted {
            let slot = self.inner.slot(&key);
            let waited_from = Instant::now();
            match tokio::time::timeout_at(deadline, slot.lock_owned()).await {
                Ok(guard) => {
                    self.inner
                        .telemetry
                        .lock_acquired(&key, waited_from.elapsed());
                    self.guards.push((key, guard));
                }
                Err(_) => {
                    let waited = started.elapsed();
                    self.inner.telemetry.lock_timeout(&key, waited);
                    let released: Vec<LockKey> = self
                        .guards
                        .drain(previously_held..)
                        .map(|(k, _)| k)
                        .collect();
                    let mut prune = released;
                    prune.push(key.clone());
                    self.inner.prune(&prune);
                    return Err(LockError::Timeout {
                        key,
                        waited_ms: waited.as_millis() as u64,
                    });
                }
            }
        }

        Ok(())
    }

    /// Whether this scope holds `key`
    pub fn holds(&self, key: &LockKey) -> bool {
        self.guards.iter().any(|(k, _)| k == key)
    }

    /// Held keys in acquisition order
    pub fn keys(&self) -> Vec<LockKey> {
        self.guards.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Time since the scope was granted
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Operation name the scope was taken for
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Drop for LockScope {
    fn drop(&mut self) {
        if self.guards.is_empty() {
            return;
        }
        let held = self.acquired_at.elapsed();
        let keys: Vec<LockKey> = self.guards.drain(..).map(|(k, _)| k).collect();
        let over_threshold = held > self.inner.config.hold_warning_threshold;
        self.inner
            .telemetry
            .lock_released(self.operation, &keys, held, over_threshold);
        self.inner.prune(&keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::LogTelemetry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(wait_ms: u64) -> LockManager {
        LockManager::new(
            LockConfig {
                wait_timeout: Duration::from_millis(wait_ms),
                hold_warning_threshold: Duration::from_millis(50),
            },
            Arc::new(LogTelemetry),
        )
    }

    #[tokio::test]
    async fn test_acquire_sorts_and_dedups() {
        let locks = manager(100);
        let scope = locks
            .acquire(
                "test",
                [
                    LockKey::License(2),
                    LockKey::Tournament(1),
                    LockKey::License(2),
                    LockKey::Enrollment(9),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            scope.keys(),
            vec![
                LockKey::Tournament(1),
                LockKey::Enrollment(9),
                LockKey::License(2)
            ]
        );
    }

    #[tokio::test]
    async fn test_release_on_drop_and_prune() {
        let locks = manager(100);
        {
            let _scope = locks
                .acquire("test", [LockKey::Tournament(1)])
                .await
                .unwrap();
            assert_eq!(locks.tracked_slots(), 1);
        }
        assert_eq!(locks.tracked_slots(), 0);
        let again = locks.acquire("test", [LockKey::Tournament(1)]).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_when_held() {
        let locks = manager(30);
        let _held = locks.acquire("holder", [LockKey::License(5)]).await.unwrap();

        let err = locks
            .acquire("waiter", [LockKey::Tournament(1), LockKey::License(5)])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LockError::Timeout { key: LockKey::License(5), .. }));

        // The tournament lock taken before the timeout must have been released.
        let tournament = locks.acquire("other", [LockKey::Tournament(1)]).await;
        assert!(tournament.is_ok());
    }

    #[tokio::test]
    async fn test_extend_rejects_out_of_order() {
        let locks = manager(100);
        let mut scope = locks.acquire("test", [LockKey::License(3)]).await.unwrap();
        let err = scope.extend([LockKey::Tournament(1)]).await.unwrap_err();
        assert!(matches!(err, LockError::OrderViolation { .. }));

        scope.extend([LockKey::License(4), LockKey::License(3)]).await.unwrap();
        assert_eq!(scope.keys(), vec![LockKey::License(3), LockKey::License(4)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion() {
        let locks = manager(5_000);
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                // Alternate the order callers list keys in; acquisition order stays fixed.
                let keys = if i % 2 == 0 {
                    vec![LockKey::Tournament(1), LockKey::License(1)]
                } else {
                    vec![LockKey::License(1), LockKey::Tournament(1)]
                };
                let _scope = locks.acquire("race", keys).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked_slots(), 0);
    }
}
