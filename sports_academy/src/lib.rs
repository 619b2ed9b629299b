//! # Sports Academy
//!
//! Tournament lifecycle and credit settlement core for a sports academy.
//!
//! Licensed players spend credits to enroll in tournaments, play sessions
//! generated from the tournament format, and receive credits, XP and skill
//! progression once the tournament completes. Every money movement goes
//! through an append-only ledger and every cross-entity mutation runs in one
//! unit of work under ordered locks.
//!
//! ## Architecture
//!
//! A tournament moves through a guarded state machine:
//!
//! - **Draft**: Created, configuration editable
//! - **EnrollmentOpen**: Licenses may enroll and withdraw
//! - **InProgress**: Sessions generated and played
//! - **Completed**: Every session finalized
//! - **RewardsDistributed**: Payouts applied exactly once
//! - **Cancelled**: Active enrollments refunded in full
//!
//! ## Core Modules
//!
//! - [`tournament`]: State machine, configuration and audit trail
//! - [`enrollment`]: Enrollment and withdrawal with credit charging and refunds
//! - [`bracket`]: League, knockout, group and heat session generation
//! - [`results`]: Result submission, bracket advancement and standings
//! - [`rewards`]: Idempotent reward distribution
//! - [`ledger`]: Credit accounts and immutable transactions
//! - [`locks`]: Ordered entity locks with bounded waits
//! - [`store`]: Transactional persistence (PostgreSQL and in-memory)
//!
//! ## Example
//!
//! ```
//! use sports_academy::{Academy, TournamentConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let academy = Academy::in_memory();
//! let cup = academy
//!     .create_tournament(TournamentConfig::knockout("Spring Cup".to_string(), 8, 0))
//!     .await
//!     .unwrap();
//! academy.open_enrollment(cup.id, Some("coach")).await.unwrap();
//! # }
//! ```

pub mod academy;
pub use academy::Academy;

pub mod config;
pub use config::{AcademyConfig, ConfigError};

/// Database connection pool and migrations.
pub mod db;

pub mod bracket;
pub mod enrollment;
pub mod ledger;
pub mod locks;
pub mod results;
pub mod rewards;
pub mod skills;
pub mod store;
pub mod telemetry;
pub mod tournament;

pub use bracket::{Session, SessionId, SessionPhase};
pub use enrollment::{Enrollment, EnrollmentId, Withdrawal};
pub use ledger::{CreditTransaction, LicenseId, TransactionKind};
pub use results::{ResultPayload, StandingRow, SubmitOutcome};
pub use rewards::{Distribution, RewardConfig, RewardSummary};
pub use store::{MemoryStore, PgStore, Store};
pub use telemetry::{LogTelemetry, MetricsTelemetry, Telemetry};
pub use tournament::{
    ErrorKind, Tournament, TournamentConfig, TournamentError, TournamentFormat, TournamentId,
    TournamentResult, TournamentState,
};
