//! Transactional persistence boundary.
//!
//! Services never talk to a database session directly. They open a
//! [`UnitOfWork`] through a [`Store`], read and write immutable value structs
//! through it, and either commit or drop it (dropping rolls back).
//!
//! Two implementations ship with the crate:
//!
//! - [`PgStore`]: PostgreSQL through `sqlx`, taking `FOR UPDATE` row locks on
//!   tournament and account reads.
//! - [`MemoryStore`]: an in-process store with the same unique constraints and
//!   all-or-nothing commits, used by the test suite and the CLI's memory mode.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::bracket::{NewSession, Session, SessionId};
use crate::enrollment::{Enrollment, EnrollmentId, NewEnrollment};
use crate::ledger::{CreditAccount, CreditTransaction, LicenseId, NewCreditTransaction};
use crate::rewards::{NewXpEntry, RewardDistributionRecord, XpEntry};
use crate::skills::{NewSkillDelta, SkillProgressionDelta};
use crate::tournament::{
    NewAuditEntry, NewTournament, Tournament, TournamentAuditEntry, TournamentId,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Names of the unique constraints services translate into domain signals
pub mod constraints {
    /// At most one non-withdrawn enrollment per (tournament, license)
    pub const ACTIVE_ENROLLMENT: &str = "enrollments_active_unique";
    /// Ledger idempotency reference
    pub const TRANSACTION_REFERENCE: &str = "credit_transactions_reference_key";
    /// One delta per (license, skill, tournament)
    pub const SKILL_DELTA: &str = "skill_progression_deltas_unique";
    /// One XP entry per (license, tournament)
    pub const XP_ENTRY: &str = "xp_entries_unique";
    /// One distribution per tournament
    pub const REWARD_RECORD: &str = "reward_distribution_records_pkey";
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Unique constraint rejected a write
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Row to update does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Optimistic version check failed
    #[error("Version conflict on tournament {id}: expected {expected}, found {found}")]
    VersionConflict { id: TournamentId, expected: i64, found: i64 },

    /// Stored value could not be decoded
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database call exceeded its deadline
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Database(err)
    }
}

impl StoreError {
    /// Whether this is a unique violation on `constraint`
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint: c } if c == constraint)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Opens units of work
#[async_trait]
pub trait Store: Send + Sync {
    /// Begin a transaction
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// One database transaction
///
/// Reads see the transaction's own writes. Nothing is visible to other units
/// of work until [`UnitOfWork::commit`]; dropping without committing discards
/// every write.
#[async_trait]
pub trait UnitOfWork: Send {
    // Tournaments

    async fn insert_tournament(&mut self, tournament: &NewTournament) -> StoreResult<Tournament>;

    /// Read a tournament, locking its row where the backend supports it
    async fn tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>>;

    /// Persist state and cancel reason
    ///
    /// Fails with `VersionConflict` unless the stored version equals
    /// `tournament.version`. Returns the row with its bumped version.
    async fn update_tournament(&mut self, tournament: &Tournament) -> StoreResult<Tournament>;

    async fn delete_tournament(&mut self, id: TournamentId) -> StoreResult<bool>;

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> StoreResult<TournamentAuditEntry>;

    async fn audit_trail(&mut self, id: TournamentId) -> StoreResult<Vec<TournamentAuditEntry>>;

    // Enrollments

    async fn insert_enrollment(&mut self, enrollment: &NewEnrollment) -> StoreResult<Enrollment>;

    async fn enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>>;

    /// Every enrollment of a tournament, oldest first
    async fn enrollments(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Enrollment>>;

    /// Persist withdrawal fields
    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()>;

    // Sessions

    async fn insert_session(&mut self, session: &NewSession) -> StoreResult<Session>;

    async fn session(&mut self, id: SessionId) -> StoreResult<Option<Session>>;

    /// Every session of a tournament in creation order
    async fn sessions(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Session>>;

    /// Persist roster, result and finalized flag
    async fn update_session(&mut self, session: &Session) -> StoreResult<()>;

    // Ledger

    /// Read an account, locking its row where the backend supports it
    async fn account(&mut self, license_id: LicenseId) -> StoreResult<Option<CreditAccount>>;

    async fn upsert_account(&mut self, license_id: LicenseId, balance: i64) -> StoreResult<CreditAccount>;

    async fn insert_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> StoreResult<CreditTransaction>;

    /// Transactions of a license, oldest first
    async fn transactions(&mut self, license_id: LicenseId) -> StoreResult<Vec<CreditTransaction>>;

    // XP, skills, reward records

    async fn insert_xp_entry(&mut self, entry: &NewXpEntry) -> StoreResult<XpEntry>;

    async fn xp_entries(&mut self, license_id: LicenseId) -> StoreResult<Vec<XpEntry>>;

    async fn insert_skill_delta(&mut self, delta: &NewSkillDelta) -> StoreResult<SkillProgressionDelta>;

    async fn skill_deltas(&mut self, license_id: LicenseId) -> StoreResult<Vec<SkillProgressionDelta>>;

    async fn reward_record(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<RewardDistributionRecord>>;

    async fn insert_reward_record(&mut self, record: &RewardDistributionRecord) -> StoreResult<()>;

    // Transaction control

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
