//! Lock keys and their global acquisition order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enrollment::EnrollmentId;
use crate::ledger::LicenseId;
use crate::tournament::TournamentId;

/// A lockable entity.
///
/// Variant order is the global lock order; the derived `Ord` compares the
/// variant first and the id second.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockKey {
    Tournament(TournamentId),
    Enrollment(EnrollmentId),
    License(LicenseId),
}

impl LockKey {
    /// Entity name used in logs and metric labels
    pub fn entity(&self) -> &'static str {
        match self {
            LockKey::Tournament(_) => "tournament",
            LockKey::Enrollment(_) => "enrollment",
            LockKey::License(_) => "license",
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Tournament(id) | LockKey::Enrollment(id) | LockKey::License(id) => {
                write!(f, "{}:{id}", self.entity())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_order_dominates_id() {
        assert!(LockKey::Tournament(999) < LockKey::Enrollment(1));
        assert!(LockKey::Enrollment(999) < LockKey::License(1));
        assert!(LockKey::License(1) < LockKey::License(2));
    }

    #[test]
    fn test_sorting_mixed_keys() {
        let mut keys = vec![
            LockKey::License(3),
            LockKey::Tournament(10),
            LockKey::License(1),
            LockKey::Enrollment(5),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                LockKey::Tournament(10),
                LockKey::Enrollment(5),
                LockKey::License(1),
                LockKey::License(3),
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(LockKey::Enrollment(4).to_string(), "enrollment:4");
    }
}
