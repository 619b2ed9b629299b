//! Result payloads, finalized results and standing rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bracket::{Session, SessionId};
use crate::ledger::LicenseId;

/// One side of a head-to-head result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub license_id: LicenseId,
    pub score: u32,
}

/// Measured values of one participant; one value per round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub license_id: LicenseId,
    pub values: Vec<f64>,
}

/// What an instructor submits for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    HeadToHead { scores: Vec<ScoreEntry> },
    Individual { measurements: Vec<Measurement> },
}

impl ResultPayload {
    /// Head-to-head payload from two pairs
    pub fn head_to_head(a: (LicenseId, u32), b: (LicenseId, u32)) -> Self {
        ResultPayload::HeadToHead {
            scores: vec![
                ScoreEntry {
                    license_id: a.0,
                    score: a.1,
                },
                ScoreEntry {
                    license_id: b.0,
                    score: b.1,
                },
            ],
        }
    }

    /// Single-value measurements
    pub fn measured(values: &[(LicenseId, f64)]) -> Self {
        ResultPayload::Individual {
            measurements: values
                .iter()
                .map(|(license_id, value)| Measurement {
                    license_id: *license_id,
                    values: vec![*value],
                })
                .collect(),
        }
    }
}

/// Placement of one participant in an individual session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementEntry {
    pub license_id: LicenseId,
    /// Aggregated measured value
    pub value: f64,
    pub placement: u32,
}

/// Finalized, immutable session result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionResult {
    HeadToHead {
        scores: Vec<ScoreEntry>,
        /// `None` for a draw
        winner: Option<LicenseId>,
    },
    Individual { placements: Vec<PlacementEntry> },
}

impl SessionResult {
    /// Head-to-head winner
    pub fn winner(&self) -> Option<LicenseId> {
        match self {
            SessionResult::HeadToHead { winner, .. } => *winner,
            SessionResult::Individual { placements } => {
                let mut firsts = placements.iter().filter(|p| p.placement == 1);
                match (firsts.next(), firsts.next()) {
                    (Some(only), None) => Some(only.license_id),
                    _ => None,
                }
            }
        }
    }

    /// Head-to-head loser, `None` for a draw
    pub fn loser(&self) -> Option<LicenseId> {
        match self {
            SessionResult::HeadToHead { scores, winner } => {
                let winner = (*winner)?;
                scores
                    .iter()
                    .find(|s| s.license_id != winner)
                    .map(|s| s.license_id)
            }
            SessionResult::Individual { .. } => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, SessionResult::HeadToHead { winner: None, .. })
    }
}

/// Badge derived from a leaderboard percentile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardTier {
    Top5,
    Top10,
    Top25,
    Standard,
}

impl fmt::Display for LeaderboardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderboardTier::Top5 => write!(f, "top_5"),
            LeaderboardTier::Top10 => write!(f, "top_10"),
            LeaderboardTier::Top25 => write!(f, "top_25"),
            LeaderboardTier::Standard => write!(f, "standard"),
        }
    }
}

/// One row of a tournament ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub license_id: LicenseId,
    pub placement: u32,
    pub group_label: Option<String>,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub score_for: u64,
    pub score_against: u64,
    /// Aggregated measurement for individual tournaments
    pub measured_value: Option<f64>,
    pub percentile: f64,
    pub tier: LeaderboardTier,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub session: Session,
    /// Sessions whose roster was populated by this result
    pub populated: Vec<SessionId>,
}
