//! Enrollment data models and withdrawal policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ledger::LicenseId;
use crate::tournament::TournamentId;

/// Enrollment ID type
pub type EnrollmentId = i64;

/// A license's registration in one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub tournament_id: TournamentId,
    pub license_id: LicenseId,
    pub credits_charged: i64,
    pub enrolled_at: DateTime<Utc>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
}

impl Enrollment {
    /// Not withdrawn
    pub fn is_active(&self) -> bool {
        self.withdrawn_at.is_none()
    }
}

/// Enrollment row before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub tournament_id: TournamentId,
    pub license_id: LicenseId,
    pub credits_charged: i64,
}

/// Latest point at which a participant may still withdraw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalCutoff {
    /// Only while enrollment is open
    EnrollmentClose,
    /// Also after start, until sessions are generated
    SessionGeneration,
}

impl fmt::Display for WithdrawalCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalCutoff::EnrollmentClose => write!(f, "enrollment_close"),
            WithdrawalCutoff::SessionGeneration => write!(f, "session_generation"),
        }
    }
}

impl FromStr for WithdrawalCutoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrollment_close" => Ok(WithdrawalCutoff::EnrollmentClose),
            "session_generation" => Ok(WithdrawalCutoff::SessionGeneration),
            other => Err(format!("unknown withdrawal cutoff: {other}")),
        }
    }
}

/// Enrollment pricing and refund policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPolicy {
    /// Cost used when a tournament config leaves it unset
    pub default_cost: i64,
    /// Share of the original charge refunded on withdrawal
    pub refund_percent: u8,
    pub cutoff: WithdrawalCutoff,
}

impl EnrollmentPolicy {
    /// Refund for a charge, rounded down
    pub fn refund_for(&self, charged: i64) -> i64 {
        let refund = i128::from(charged.max(0)) * i128::from(self.refund_percent) / 100;
        i64::try_from(refund).unwrap_or(i64::MAX)
    }
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            default_cost: 100,
            refund_percent: 50,
            cutoff: WithdrawalCutoff::SessionGeneration,
        }
    }
}

/// Outcome of a successful withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub enrollment: Enrollment,
    pub refund: i64,
    pub balance_after: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_rounds_down() {
        let policy = EnrollmentPolicy::default();
        assert_eq!(policy.refund_for(250), 125);
        assert_eq!(policy.refund_for(101), 50);
        assert_eq!(policy.refund_for(0), 0);
    }

    #[test]
    fn test_refund_of_huge_charge() {
        let policy = EnrollmentPolicy::default();
        assert_eq!(policy.refund_for(i64::MAX), i64::MAX / 2);
        let full = EnrollmentPolicy {
            refund_percent: 100,
            ..EnrollmentPolicy::default()
        };
        assert_eq!(full.refund_for(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_full_and_zero_refund() {
        let full = EnrollmentPolicy {
            refund_percent: 100,
            ..EnrollmentPolicy::default()
        };
        assert_eq!(full.refund_for(250), 250);
        let none = EnrollmentPolicy {
            refund_percent: 0,
            ..EnrollmentPolicy::default()
        };
        assert_eq!(none.refund_for(250), 0);
    }

    #[test]
    fn test_cutoff_parse() {
        assert_eq!(
            "enrollment_close".parse::<WithdrawalCutoff>(),
            Ok(WithdrawalCutoff::EnrollmentClose)
        );
        assert!("never".parse::<WithdrawalCutoff>().is_err());
    }
}
