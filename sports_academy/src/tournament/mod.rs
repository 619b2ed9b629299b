//! Tournament lifecycle.
//!
//! This module provides:
//! - Tournament creation and configuration validation
//! - The forward state machine and the audited admin reset path
//! - Cancellation with full refunds of active enrollments
//! - The shared error taxonomy of the tournament services
//!
//! ## Example
//!
//! ```no_run
//! use sports_academy::locks::{LockConfig, LockManager};
//! use sports_academy::skills::SkillCatalog;
//! use sports_academy::store::MemoryStore;
//! use sports_academy::telemetry::LogTelemetry;
//! use sports_academy::tournament::{TournamentConfig, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
//!     let manager = TournamentManager::new(
//!         Arc::new(MemoryStore::new()),
//!         locks,
//!         SkillCatalog::default(),
//!         100,
//!     );
//!
//!     // 8-player knockout, 150 credits to enter
//!     let config = TournamentConfig::knockout("Spring Cup".to_string(), 8, 150);
//!     let tournament = manager.create_tournament(config).await?;
//!     manager.open_enrollment(tournament.id, Some("admin")).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod state;

pub use errors::{ErrorKind, TournamentError, TournamentResult};
pub use manager::{MIN_PARTICIPANTS, TournamentManager};
pub use models::{
    AuditKind, GroupStageConfig, NewAuditEntry, NewTournament, RankingDirection, RankingKind,
    RoundAggregation, ScoringMode, Tournament, TournamentAuditEntry, TournamentConfig,
    TournamentFormat, TournamentId,
};
pub use state::TournamentState;
