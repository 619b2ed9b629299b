//! Scoped, ordered entity locks.
//!
//! Every unit of work that touches more than one entity takes its locks through
//! [`LockManager::acquire`]. Keys are always taken in the order defined by
//! [`LockKey`]'s `Ord` implementation:
//!
//! 1. tournament
//! 2. enrollment
//! 3. license
//!
//! and by id inside each entity type. Two operations that need overlapping
//! entities therefore never wait on each other in a cycle. Waiting is bounded
//! by [`LockConfig::wait_timeout`]; a scope releases everything it holds when
//! dropped, whether the unit of work committed or not.
//!
//! ## Example
//!
//! ```no_run
//! use sports_academy::locks::{LockConfig, LockKey, LockManager};
//! use sports_academy::telemetry::LogTelemetry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), sports_academy::locks::LockError> {
//! let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
//! let scope = locks
//!     .acquire("enroll", [LockKey::License(42), LockKey::Tournament(7)])
//!     .await?;
//! assert!(scope.holds(&LockKey::Tournament(7)));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod keys;
pub mod manager;

pub use errors::{LockError, LockResult};
pub use keys::LockKey;
pub use manager::{LockConfig, LockManager, LockScope};
