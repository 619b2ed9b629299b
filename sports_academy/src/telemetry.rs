//! Observability collaborator passed into the lock manager and services.
//!
//! Nothing in this crate keeps process-wide mutable monitoring state. Callers
//! choose an implementation and hand it to [`crate::locks::LockManager`] and
//! [`crate::Academy`].

use std::time::Duration;

use crate::locks::LockKey;

/// Receives timing and outcome signals from the core.
pub trait Telemetry: Send + Sync {
    /// A lock was granted after waiting `waited`.
    fn lock_acquired(&self, key: &LockKey, waited: Duration);

    /// A lock scope was released after being held for `held`.
    fn lock_released(&self, operation: &str, keys: &[LockKey], held: Duration, over_threshold: bool);

    /// A lock wait gave up.
    fn lock_timeout(&self, key: &LockKey, waited: Duration);

    /// A public operation finished.
    fn operation_completed(&self, operation: &str, success: bool, elapsed: Duration);
}

/// Telemetry written through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn lock_acquired(&self, key: &LockKey, waited: Duration) {
        log::trace!("lock {key} acquired after {waited:?}");
    }

    fn lock_released(&self, operation: &str, keys: &[LockKey], held: Duration, over_threshold: bool) {
        if over_threshold {
            log::warn!(
                "lock scope for {operation} held {held:?} over {} key(s): {}",
                keys.len(),
                join_keys(keys)
            );
        } else {
            log::debug!("lock scope for {operation} released after {held:?}");
        }
    }

    fn lock_timeout(&self, key: &LockKey, waited: Duration) {
        log::warn!("timed out after {waited:?} waiting for lock {key}");
    }

    fn operation_completed(&self, operation: &str, success: bool, elapsed: Duration) {
        if success {
            log::debug!("{operation} completed in {elapsed:?}");
        } else {
            log::info!("{operation} failed after {elapsed:?}");
        }
    }
}

/// Telemetry recorded with the `metrics` crate.
///
/// Pair with an exporter such as `metrics-exporter-prometheus` in the binary.
/// Every event is also forwarded to [`LogTelemetry`] so slow lock holds still
/// show up in the logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

impl Telemetry for MetricsTelemetry {
    fn lock_acquired(&self, key: &LockKey, waited: Duration) {
        metrics::histogram!("academy_lock_wait_ms", "entity" => key.entity())
            .record(waited.as_secs_f64() * 1000.0);
        LogTelemetry.lock_acquired(key, waited);
    }

    fn lock_released(&self, operation: &str, keys: &[LockKey], held: Duration, over_threshold: bool) {
        metrics::histogram!("academy_lock_hold_ms", "operation" => operation.to_string())
            .record(held.as_secs_f64() * 1000.0);
        if over_threshold {
            metrics::counter!("academy_lock_hold_warnings_total", "operation" => operation.to_string())
                .increment(1);
        }
        LogTelemetry.lock_released(operation, keys, held, over_threshold);
    }

    fn lock_timeout(&self, key: &LockKey, waited: Duration) {
        metrics::counter!("academy_lock_timeouts_total", "entity" => key.entity()).increment(1);
        LogTelemetry.lock_timeout(key, waited);
    }

    fn operation_completed(&self, operation: &str, success: bool, elapsed: Duration) {
        metrics::counter!("academy_operations_total",
            "operation" => operation.to_string(),
            "success" => success.to_string()
        )
        .increment(1);
        metrics::histogram!("academy_operation_duration_ms", "operation" => operation.to_string())
            .record(elapsed.as_secs_f64() * 1000.0);
        LogTelemetry.operation_completed(operation, success, elapsed);
    }
}

fn join_keys(keys: &[LockKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_telemetry_does_not_panic() {
        let t = LogTelemetry;
        let key = LockKey::License(7);
        t.lock_acquired(&key, Duration::from_millis(1));
        t.lock_released("enroll", &[key.clone()], Duration::from_secs(2), true);
        t.lock_timeout(&key, Duration::from_millis(5));
        t.operation_completed("enroll", false, Duration::from_millis(3));
    }

    #[test]
    fn test_metrics_telemetry_without_recorder() {
        // No recorder installed: metrics calls are no-ops.
        let t = MetricsTelemetry;
        let key = LockKey::Tournament(1);
        t.lock_acquired(&key, Duration::ZERO);
        t.lock_released("distribute_rewards", &[key], Duration::from_millis(1), false);
        t.operation_completed("distribute_rewards", true, Duration::from_millis(1));
    }

    #[test]
    fn test_join_keys() {
        let keys = vec![LockKey::Tournament(1), LockKey::License(2)];
        assert_eq!(join_keys(&keys), "tournament:1, license:2");
    }
}
