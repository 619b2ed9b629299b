//! Tournament error types.

use super::models::TournamentId;
use super::state::TournamentState;
use crate::bracket::SessionId;
use crate::enrollment::EnrollmentId;
use crate::ledger::{LedgerError, LicenseId};
use crate::locks::LockError;
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, rejected before any lock
    Validation,
    /// Operation not allowed in the current state
    State,
    /// Missing credits or lock contention; retriable
    Resource,
    /// The effect already happened or never existed
    Idempotency,
    /// Concurrent modification or corrupt data
    Integrity,
    /// Infrastructure failure
    Internal,
}

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(EnrollmentId),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TournamentState,
        to: TournamentState,
    },

    #[error("Tournament not in correct state: expected {expected}, got {actual}")]
    InvalidState {
        expected: TournamentState,
        actual: TournamentState,
    },

    #[error("Enrollment is not open (tournament is {state})")]
    EnrollmentNotOpen { state: TournamentState },

    #[error("License {license} is already enrolled in tournament {tournament}")]
    AlreadyEnrolled {
        tournament: TournamentId,
        license: LicenseId,
    },

    #[error("Tournament is full ({max} participants)")]
    TournamentFull { max: u32 },

    #[error("Insufficient credits for license {license}: available {available}, required {required}")]
    InsufficientCredits {
        license: LicenseId,
        available: i64,
        required: i64,
    },

    #[error("Enrollment {0} is not active")]
    NoActiveEnrollment(EnrollmentId),

    #[error("Withdrawal window is closed (tournament is {state})")]
    WithdrawalWindowClosed { state: TournamentState },

    #[error("Tournament has enrollments and cannot be deleted ({count})")]
    HasEnrollments { count: usize },

    #[error("{pending} session(s) are not finalized")]
    SessionsNotFinalized { pending: usize },

    #[error("Sessions have not been generated")]
    SessionsNotGenerated,

    #[error("Sessions have already been generated")]
    SessionsAlreadyGenerated,

    #[error("Session {0} is already finalized")]
    AlreadyFinalized(SessionId),

    #[error("Session {0} roster is not populated yet")]
    RosterNotReady(SessionId),

    #[error("Invalid result payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    #[error("Invalid tournament configuration: {0}")]
    InvalidConfig(String),

    #[error("A reason is required")]
    ReasonRequired,

    #[error("Tournament is not completed (state {state})")]
    NotCompleted { state: TournamentState },

    #[error("Insufficient participants: need {needed}, have {current}")]
    InsufficientParticipants { needed: usize, current: usize },

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<LedgerError> for TournamentError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                license_id,
                available,
                required,
            } => TournamentError::InsufficientCredits {
                license: license_id,
                available,
                required,
            },
            LedgerError::Lock(err) => TournamentError::Lock(err),
            LedgerError::Store(err) => TournamentError::Store(err),
            other => TournamentError::Ledger(other),
        }
    }
}

impl TournamentError {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        use TournamentError::*;
        match self {
            NotFound(_)
            | EnrollmentNotFound(_)
            | SessionNotFound(_)
            | InvalidPayload(_)
            | InvalidRoster(_)
            | InvalidConfig(_)
            | ReasonRequired => ErrorKind::Validation,

            InvalidTransition { .. }
            | InvalidState { .. }
            | EnrollmentNotOpen { .. }
            | WithdrawalWindowClosed { .. }
            | HasEnrollments { .. }
            | SessionsNotFinalized { .. }
            | SessionsNotGenerated
            | SessionsAlreadyGenerated
            | RosterNotReady(_)
            | NotCompleted { .. }
            | InsufficientParticipants { .. } => ErrorKind::State,

            TournamentFull { .. } | InsufficientCredits { .. } => ErrorKind::Resource,

            AlreadyEnrolled { .. } | NoActiveEnrollment(_) | AlreadyFinalized(_) => {
                ErrorKind::Idempotency
            }

            Lock(LockError::Timeout { .. }) => ErrorKind::Resource,
            Lock(LockError::OrderViolation { .. }) => ErrorKind::Internal,

            Ledger(LedgerError::InvalidAmount(_)) => ErrorKind::Validation,
            Ledger(LedgerError::AlreadyApplied { .. }) => ErrorKind::Idempotency,
            Ledger(LedgerError::BalanceOverflow(_)) => ErrorKind::Integrity,
            Ledger(_) => ErrorKind::Internal,

            Store(StoreError::VersionConflict { .. }) | Store(StoreError::Corrupt { .. }) => {
                ErrorKind::Integrity
            }
            Store(StoreError::Timeout(_)) => ErrorKind::Resource,
            Store(_) | Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Resource)
            || matches!(self, TournamentError::Store(StoreError::VersionConflict { .. }))
    }

    /// Get a client-safe error message
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            ErrorKind::Integrity => match self {
                TournamentError::Store(StoreError::VersionConflict { .. }) => {
                    "Tournament was modified concurrently, please retry".to_string()
                }
                _ => "Internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// Result type for tournament-level operations
pub type TournamentResult<T> = Result<T, TournamentError>;
