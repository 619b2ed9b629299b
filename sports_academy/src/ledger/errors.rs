//! Credit ledger error types.

use super::models::LicenseId;
use crate::locks::LockError;
use crate::store::StoreError;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Lock acquisition failure
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Debit would drive the balance negative
    #[error("Insufficient credits for license {license_id}: available {available}, required {required}")]
    InsufficientCredits {
        license_id: LicenseId,
        available: i64,
        required: i64,
    },

    /// Amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance would overflow
    #[error("Balance overflow for license {0}")]
    BalanceOverflow(LicenseId),

    /// The reference was already posted
    #[error("Transaction already applied: {reference}")]
    AlreadyApplied { reference: String },

    /// Caller posted inside a unit of work without holding the license lock
    #[error("License {0} is not locked by the caller")]
    LockNotHeld(LicenseId),
}

impl LedgerError {
    /// Get a client-safe error message
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Store(_) => "Internal server error".to_string(),
            LedgerError::LockNotHeld(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
