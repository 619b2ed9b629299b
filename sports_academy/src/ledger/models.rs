//! Credit ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::enrollment::EnrollmentId;

/// License ID type (the entity owning a credit balance)
pub type LicenseId = i64;

/// Credit transaction ID type
pub type TransactionId = i64;

/// Denormalised running balance of a license
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub license_id: LicenseId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: TransactionId,
    pub license_id: LicenseId,
    /// Signed amount: negative for spends, positive otherwise
    pub amount: i64,
    pub balance_after: i64,
    pub kind: TransactionKind,
    pub enrollment_id: Option<EnrollmentId>,
    /// Idempotency key, unique across the ledger when present
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row before the store assigns its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCreditTransaction {
    pub license_id: LicenseId,
    pub amount: i64,
    pub balance_after: i64,
    pub kind: TransactionKind,
    pub enrollment_id: Option<EnrollmentId>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Spend,
    Refund,
    Reward,
}

impl TransactionKind {
    /// Whether this kind removes credits
    pub fn is_debit(self) -> bool {
        matches!(self, TransactionKind::Spend)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Purchase => write!(f, "purchase"),
            TransactionKind::Spend => write!(f, "spend"),
            TransactionKind::Refund => write!(f, "refund"),
            TransactionKind::Reward => write!(f, "reward"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionKind::Purchase),
            "spend" => Ok(TransactionKind::Spend),
            "refund" => Ok(TransactionKind::Refund),
            "reward" => Ok(TransactionKind::Reward),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// What to post to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub license_id: LicenseId,
    /// Always positive; the kind decides the sign
    pub amount: i64,
    pub kind: TransactionKind,
    pub enrollment_id: Option<EnrollmentId>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl Posting {
    /// Create a posting without enrollment link or reference
    pub fn new(license_id: LicenseId, amount: i64, kind: TransactionKind) -> Self {
        Self {
            license_id,
            amount,
            kind,
            enrollment_id: None,
            reference: None,
            description: None,
        }
    }

    /// Attach an idempotency reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Attach the enrollment this posting belongs to
    pub fn for_enrollment(mut self, enrollment_id: EnrollmentId) -> Self {
        self.enrollment_id = Some(enrollment_id);
        self
    }

    /// Attach a human-readable description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Result of comparing a license's stored balance with its transaction sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountVerification {
    pub license_id: LicenseId,
    pub stored_balance: i64,
    pub transaction_sum: i64,
    pub transaction_count: usize,
}

impl AccountVerification {
    /// Whether balance and transaction sum agree
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.transaction_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in [
            TransactionKind::Purchase,
            TransactionKind::Spend,
            TransactionKind::Refund,
            TransactionKind::Reward,
        ] {
            assert_eq!(kind.to_string().parse::<TransactionKind>(), Ok(kind));
        }
        assert!("bonus".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_only_spend_is_debit() {
        assert!(TransactionKind::Spend.is_debit());
        assert!(!TransactionKind::Refund.is_debit());
        assert!(!TransactionKind::Reward.is_debit());
    }

    #[test]
    fn test_posting_builder() {
        let p = Posting::new(1, 50, TransactionKind::Refund)
            .for_enrollment(9)
            .with_reference("enrollment:9:refund")
            .describe("Withdrawal refund");
        assert_eq!(p.enrollment_id, Some(9));
        assert_eq!(p.reference.as_deref(), Some("enrollment:9:refund"));
        assert_eq!(p.description.as_deref(), Some("Withdrawal refund"));
    }
}
