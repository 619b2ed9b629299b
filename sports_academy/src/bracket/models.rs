//! Session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ledger::LicenseId;
use crate::results::SessionResult;
use crate::tournament::TournamentId;

/// Session ID type
pub type SessionId = i64;

/// Which part of the tournament a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Group,
    Knockout,
    LeagueRound,
    /// Individual-ranking heat with the whole roster
    Heat,
}

impl SessionPhase {
    /// Round-robin phases where draws may be allowed
    pub fn is_round_robin(self) -> bool {
        matches!(self, SessionPhase::Group | SessionPhase::LeagueRound)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Group => write!(f, "group"),
            SessionPhase::Knockout => write!(f, "knockout"),
            SessionPhase::LeagueRound => write!(f, "league_round"),
            SessionPhase::Heat => write!(f, "heat"),
        }
    }
}

impl FromStr for SessionPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(SessionPhase::Group),
            "knockout" => Ok(SessionPhase::Knockout),
            "league_round" => Ok(SessionPhase::LeagueRound),
            "heat" => Ok(SessionPhase::Heat),
            other => Err(format!("unknown session phase: {other}")),
        }
    }
}

/// Where one roster slot comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantSource {
    Fixed { license_id: LicenseId },
    WinnerOf { session_id: SessionId },
    LoserOf { session_id: SessionId },
    /// `position`-th finisher of a group, 1-indexed
    GroupQualifier { group: String, position: u32 },
}

impl ParticipantSource {
    /// Session this slot waits on, if any
    pub fn feeder(&self) -> Option<SessionId> {
        match self {
            ParticipantSource::WinnerOf { session_id } | ParticipantSource::LoserOf { session_id } => {
                Some(*session_id)
            }
            _ => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, ParticipantSource::Fixed { .. })
    }
}

impl fmt::Display for ParticipantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantSource::Fixed { license_id } => write!(f, "license({license_id})"),
            ParticipantSource::WinnerOf { session_id } => write!(f, "winner_of({session_id})"),
            ParticipantSource::LoserOf { session_id } => write!(f, "loser_of({session_id})"),
            ParticipantSource::GroupQualifier { group, position } => {
                write!(f, "top_group_qualifiers({group}{position})")
            }
        }
    }
}

/// Marker describing the pending slots, `None` when every slot is fixed
pub fn participant_filter(sources: &[ParticipantSource]) -> Option<String> {
    if sources.iter().all(ParticipantSource::is_fixed) {
        return None;
    }
    Some(
        sources
            .iter()
            .filter(|s| !s.is_fixed())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// One match or heat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tournament_id: TournamentId,
    pub phase: SessionPhase,
    pub round: u32,
    /// Order inside the round
    pub bracket_position: u32,
    pub group_label: Option<String>,
    pub sources: Vec<ParticipantSource>,
    pub participant_filter: Option<String>,
    /// `None` until every source resolves
    pub participants: Option<Vec<LicenseId>>,
    pub result: Option<SessionResult>,
    pub finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Roster populated and results may be submitted
    pub fn is_ready(&self) -> bool {
        self.participants.is_some()
    }

    /// Whether `license_id` is on the roster
    pub fn has_participant(&self, license_id: LicenseId) -> bool {
        self.participants
            .as_ref()
            .is_some_and(|p| p.contains(&license_id))
    }
}

/// Session row before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub tournament_id: TournamentId,
    pub phase: SessionPhase,
    pub round: u32,
    pub bracket_position: u32,
    pub group_label: Option<String>,
    pub sources: Vec<ParticipantSource>,
    pub participant_filter: Option<String>,
    pub participants: Option<Vec<LicenseId>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_none_when_fixed() {
        let sources = vec![
            ParticipantSource::Fixed { license_id: 1 },
            ParticipantSource::Fixed { license_id: 2 },
        ];
        assert_eq!(participant_filter(&sources), None);
    }

    #[test]
    fn test_filter_lists_pending_slots() {
        let sources = vec![
            ParticipantSource::Fixed { license_id: 1 },
            ParticipantSource::WinnerOf { session_id: 12 },
        ];
        assert_eq!(participant_filter(&sources).as_deref(), Some("winner_of(12)"));

        let qualifiers = vec![
            ParticipantSource::GroupQualifier {
                group: "A".to_string(),
                position: 1,
            },
            ParticipantSource::GroupQualifier {
                group: "B".to_string(),
                position: 2,
            },
        ];
        assert_eq!(
            participant_filter(&qualifiers).as_deref(),
            Some("top_group_qualifiers(A1),top_group_qualifiers(B2)")
        );
    }

    #[test]
    fn test_feeder() {
        assert_eq!(ParticipantSource::LoserOf { session_id: 3 }.feeder(), Some(3));
        assert_eq!(ParticipantSource::Fixed { license_id: 3 }.feeder(), None);
    }

    #[test]
    fn test_source_json_shape() {
        let json = serde_json::to_string(&ParticipantSource::WinnerOf { session_id: 4 }).unwrap();
        assert_eq!(json, r#"{"type":"winner_of","session_id":4}"#);
    }
}
