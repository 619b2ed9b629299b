//! Feeder graph over persisted sessions.

use std::collections::BTreeMap;

use super::models::{ParticipantSource, Session, SessionId, SessionPhase};

/// Which sessions wait on which
///
/// Edges run from a feeder to the sessions whose roster depends on it:
/// `WinnerOf`/`LoserOf` slots point at one session, `GroupQualifier` slots
/// wait on every session of their group.
#[derive(Debug, Clone, Default)]
pub struct BracketGraph {
    dependents: BTreeMap<SessionId, Vec<SessionId>>,
    groups: BTreeMap<String, Vec<SessionId>>,
}

impl BracketGraph {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut graph = Self::default();
        for session in sessions {
            if session.phase == SessionPhase::Group {
                if let Some(label) = &session.group_label {
                    graph
                        .groups
                        .entry(label.clone())
                        .or_default()
                        .push(session.id);
                }
            }
        }

        for session in sessions {
            for source in &session.sources {
                let feeders = match source {
                    ParticipantSource::WinnerOf { session_id }
                    | ParticipantSource::LoserOf { session_id } => vec![*session_id],
                    ParticipantSource::GroupQualifier { group, .. } => {
                        graph.groups.get(group).cloned().unwrap_or_default()
                    }
                    ParticipantSource::Fixed { .. } => Vec::new(),
                };
                for feeder in feeders {
                    let entry = graph.dependents.entry(feeder).or_default();
                    if !entry.contains(&session.id) {
                        entry.push(session.id);
                    }
                }
            }
        }
        graph
    }

    /// Sessions whose roster may change once `session_id` is finalized
    pub fn dependents_of(&self, session_id: SessionId) -> &[SessionId] {
        self.dependents
            .get(&session_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Sessions of a group
    pub fn group_sessions(&self, label: &str) -> &[SessionId] {
        self.groups.get(label).map_or(&[], Vec::as_slice)
    }

    pub fn group_labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}
