//! Lock manager error types.

use super::keys::LockKey;
use thiserror::Error;

/// Lock acquisition errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    /// Bounded wait elapsed; safe to retry
    #[error("Timed out after {waited_ms}ms waiting for lock {key}")]
    Timeout { key: LockKey, waited_ms: u64 },

    /// A key was requested out of the global order
    #[error("Lock order violation: cannot acquire {requested} while holding {held}")]
    OrderViolation { held: LockKey, requested: LockKey },
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
