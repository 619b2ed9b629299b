//! Tournament lifecycle states and the transition tables.
//!
//! Normal transitions move strictly forward. The only way back is the admin
//! reset path, which has its own table and is always audited.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    Draft,
    EnrollmentOpen,
    InProgress,
    Completed,
    RewardsDistributed,
    Cancelled,
}

/// Forward transitions
const TRANSITIONS: &[(TournamentState, TournamentState)] = &[
    (TournamentState::Draft, TournamentState::EnrollmentOpen),
    (TournamentState::Draft, TournamentState::Cancelled),
    (TournamentState::EnrollmentOpen, TournamentState::InProgress),
    (TournamentState::EnrollmentOpen, TournamentState::Cancelled),
    (TournamentState::InProgress, TournamentState::Completed),
    (TournamentState::InProgress, TournamentState::Cancelled),
    (TournamentState::Completed, TournamentState::RewardsDistributed),
];

/// Admin reset transitions
const RESETS: &[(TournamentState, TournamentState)] = &[
    (TournamentState::Completed, TournamentState::InProgress),
    (TournamentState::RewardsDistributed, TournamentState::InProgress),
    (TournamentState::Cancelled, TournamentState::Draft),
];

impl TournamentState {
    /// Whether `self -> to` is a normal transition
    pub fn can_transition_to(self, to: TournamentState) -> bool {
        TRANSITIONS.contains(&(self, to))
    }

    /// Whether `self -> to` is an admin reset
    pub fn can_reset_to(self, to: TournamentState) -> bool {
        RESETS.contains(&(self, to))
    }

    /// States reachable by a normal transition
    pub fn next_states(self) -> Vec<TournamentState> {
        TRANSITIONS
            .iter()
            .filter(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .collect()
    }

    /// No forward transition leaves this state
    pub fn is_terminal(self) -> bool {
        self.next_states().is_empty()
    }

    /// Accepting enrollments
    pub fn accepts_enrollments(self) -> bool {
        self == TournamentState::EnrollmentOpen
    }
}

impl fmt::Display for TournamentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TournamentState::Draft => "draft",
            TournamentState::EnrollmentOpen => "enrollment_open",
            TournamentState::InProgress => "in_progress",
            TournamentState::Completed => "completed",
            TournamentState::RewardsDistributed => "rewards_distributed",
            TournamentState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TournamentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TournamentState::Draft),
            "enrollment_open" => Ok(TournamentState::EnrollmentOpen),
            "in_progress" => Ok(TournamentState::InProgress),
            "completed" => Ok(TournamentState::Completed),
            "rewards_distributed" => Ok(TournamentState::RewardsDistributed),
            "cancelled" => Ok(TournamentState::Cancelled),
            other => Err(format!("unknown tournament state: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TournamentState::*;

    const ALL: [TournamentState; 6] = [
        Draft,
        EnrollmentOpen,
        InProgress,
        Completed,
        RewardsDistributed,
        Cancelled,
    ];

    #[test]
    fn test_happy_path() {
        assert!(Draft.can_transition_to(EnrollmentOpen));
        assert!(EnrollmentOpen.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Completed.can_transition_to(RewardsDistributed));
    }

    #[test]
    fn test_cancel_only_before_completed() {
        assert!(Draft.can_transition_to(Cancelled));
        assert!(EnrollmentOpen.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!RewardsDistributed.can_transition_to(Cancelled));
    }

    #[test]
    fn test_no_backwards_transitions() {
        for (i, from) in ALL.iter().enumerate().take(5) {
            for to in &ALL[..i] {
                assert!(
                    !from.can_transition_to(*to),
                    "{from} -> {to} must not be a normal transition"
                );
            }
        }
        assert!(!RewardsDistributed.can_transition_to(InProgress));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RewardsDistributed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Completed.is_terminal());
    }

    #[test]
    fn test_reset_table_is_separate() {
        assert!(RewardsDistributed.can_reset_to(InProgress));
        assert!(Cancelled.can_reset_to(Draft));
        assert!(!InProgress.can_reset_to(Draft));
        // Reset entries never double as forward transitions.
        for from in ALL {
            for to in ALL {
                assert!(!(from.can_reset_to(to) && from.can_transition_to(to)));
            }
        }
    }

    #[test]
    fn test_parse_display() {
        for state in ALL {
            assert_eq!(state.to_string().parse::<TournamentState>(), Ok(state));
        }
    }
}
