//! Storage-free bracket plans.
//!
//! Planning functions only ever see a seeded roster and produce a
//! [`BracketPlan`]: sessions in creation order whose feeder references are
//! plan indices. The generator maps indices to stored ids while persisting,
//! which keeps the planners pure and deterministic.

use crate::bracket::models::{ParticipantSource, SessionId, SessionPhase};
use crate::ledger::LicenseId;

/// Roster slot of a planned session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlannedSource {
    Fixed(LicenseId),
    /// Winner of the planned session at this index
    WinnerOf(usize),
    /// Loser of the planned session at this index
    LoserOf(usize),
    GroupQualifier { group: String, position: u32 },
}

impl PlannedSource {
    /// Translate plan indices to stored session ids
    pub fn resolve(&self, ids: &[SessionId]) -> Option<ParticipantSource> {
        Some(match self {
            PlannedSource::Fixed(license_id) => ParticipantSource::Fixed {
                license_id: *license_id,
            },
            PlannedSource::WinnerOf(index) => ParticipantSource::WinnerOf {
                session_id: *ids.get(*index)?,
            },
            PlannedSource::LoserOf(index) => ParticipantSource::LoserOf {
                session_id: *ids.get(*index)?,
            },
            PlannedSource::GroupQualifier { group, position } => ParticipantSource::GroupQualifier {
                group: group.clone(),
                position: *position,
            },
        })
    }

    fn feeder(&self) -> Option<usize> {
        match self {
            PlannedSource::WinnerOf(index) | PlannedSource::LoserOf(index) => Some(*index),
            _ => None,
        }
    }
}

/// One session of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSession {
    pub phase: SessionPhase,
    pub round: u32,
    pub bracket_position: u32,
    pub group_label: Option<String>,
    pub sources: Vec<PlannedSource>,
}

impl PlannedSession {
    /// Licenses known at planning time
    pub fn fixed_participants(&self) -> Vec<LicenseId> {
        self.sources
            .iter()
            .filter_map(|s| match s {
                PlannedSource::Fixed(license_id) => Some(*license_id),
                _ => None,
            })
            .collect()
    }

    pub fn is_fully_fixed(&self) -> bool {
        self.sources
            .iter()
            .all(|s| matches!(s, PlannedSource::Fixed(_)))
    }
}

/// Sessions in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BracketPlan {
    sessions: Vec<PlannedSession>,
}

impl BracketPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session and return its index
    pub fn push(&mut self, session: PlannedSession) -> usize {
        self.sessions.push(session);
        self.sessions.len() - 1
    }

    pub fn sessions(&self) -> &[PlannedSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions of one phase
    pub fn phase(&self, phase: SessionPhase) -> impl Iterator<Item = &PlannedSession> {
        self.sessions.iter().filter(move |s| s.phase == phase)
    }

    /// Every feeder must precede the session it feeds
    pub fn check_feeders(&self) -> Result<(), String> {
        for (index, session) in self.sessions.iter().enumerate() {
            for feeder in session.sources.iter().filter_map(PlannedSource::feeder) {
                if feeder >= index {
                    return Err(format!(
                        "session {index} is fed by session {feeder}, which is not created before it"
                    ));
                }
            }
        }
        Ok(())
    }
}
