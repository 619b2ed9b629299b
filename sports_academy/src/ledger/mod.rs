//! Credit ledger.
//!
//! Credits are the academy's internal currency. This module implements:
//! - An append-only transaction log with a denormalised running balance
//! - Non-negative balances, enforced before anything is written
//! - Idempotency references that apply at most once
//! - In-transaction posting for services that hold the license lock
//!
//! ## Example
//!
//! ```no_run
//! use sports_academy::ledger::{CreditLedger, Posting, TransactionKind};
//! use sports_academy::locks::{LockConfig, LockManager};
//! use sports_academy::store::MemoryStore;
//! use sports_academy::telemetry::LogTelemetry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
//!     let ledger = CreditLedger::new(Arc::new(MemoryStore::new()), locks);
//!
//!     ledger.purchase(1, 500, Some("order-1".to_string())).await?;
//!     ledger.debit(Posting::new(1, 120, TransactionKind::Spend)).await?;
//!     println!("Balance: {}", ledger.get_balance(1).await?);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::CreditLedger;
pub use models::{
    AccountVerification, CreditAccount, CreditTransaction, LicenseId, NewCreditTransaction,
    Posting, TransactionId, TransactionKind,
};
