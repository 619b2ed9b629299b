//! Result submission and bracket advancement.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use super::models::{ResultPayload, SessionResult, StandingRow, SubmitOutcome};
use super::ranking::place_measurements;
use super::standings::{Seeds, final_standings, group_complete, group_finishers, seeds_from_enrollments};
use crate::bracket::{BracketGraph, ParticipantSource, Session, SessionId};
use crate::ledger::LicenseId;
use crate::locks::{LockKey, LockManager};
use crate::store::{Store, UnitOfWork};
use crate::tournament::manager::load_tournament;
use crate::tournament::{
    ScoringMode, Tournament, TournamentError, TournamentId, TournamentResult, TournamentState,
};

/// Validate a payload against a session and turn it into a result
pub fn evaluate(
    tournament: &Tournament,
    session: &Session,
    payload: &ResultPayload,
) -> TournamentResult<SessionResult> {
    let roster = session
        .participants
        .as_deref()
        .ok_or(TournamentError::RosterNotReady(session.id))?;

    match (&tournament.scoring, payload) {
        (ScoringMode::HeadToHead, ResultPayload::HeadToHead { scores }) => {
            if scores.len() != 2 || roster.len() != 2 {
                return Err(TournamentError::InvalidPayload(format!(
                    "head-to-head results need exactly 2 scores, got {}",
                    scores.len()
                )));
            }
            let submitted: BTreeSet<LicenseId> = scores.iter().map(|s| s.license_id).collect();
            let expected: BTreeSet<LicenseId> = roster.iter().copied().collect();
            if submitted != expected {
                return Err(TournamentError::InvalidPayload(format!(
                    "scores must cover exactly the roster {roster:?}"
                )));
            }

            let (a, b) = (scores[0], scores[1]);
            let winner = match a.score.cmp(&b.score) {
                std::cmp::Ordering::Greater => Some(a.license_id),
                std::cmp::Ordering::Less => Some(b.license_id),
                std::cmp::Ordering::Equal => {
                    if !(session.phase.is_round_robin() && tournament.allow_draws) {
                        return Err(TournamentError::InvalidPayload(format!(
                            "{} sessions cannot end in a draw",
                            session.phase
                        )));
                    }
                    None
                }
            };
            Ok(SessionResult::HeadToHead {
                scores: scores.clone(),
                winner,
            })
        }
        (
            ScoringMode::IndividualRanking {
                kind,
                direction,
                aggregation,
                rounds,
            },
            ResultPayload::Individual { measurements },
        ) => {
            let placements =
                place_measurements(roster, measurements, *kind, *direction, *aggregation, *rounds)
                    .map_err(TournamentError::InvalidPayload)?;
            Ok(SessionResult::Individual { placements })
        }
        (ScoringMode::HeadToHead, _) => Err(TournamentError::InvalidPayload(
            "tournament expects a head-to-head result".to_string(),
        )),
        (ScoringMode::IndividualRanking { .. }, _) => Err(TournamentError::InvalidPayload(
            "tournament expects individual measurements".to_string(),
        )),
    }
}

/// Resolve one roster slot, `None` while its feeder is unfinished
fn resolve_source(source: &ParticipantSource, sessions: &[Session], seeds: &Seeds) -> Option<LicenseId> {
    let finalized = |id: SessionId| {
        sessions
            .iter()
            .find(|s| s.id == id && s.finalized)
            .and_then(|s| s.result.as_ref())
    };
    match source {
        ParticipantSource::Fixed { license_id } => Some(*license_id),
        ParticipantSource::WinnerOf { session_id } => finalized(*session_id)?.winner(),
        ParticipantSource::LoserOf { session_id } => finalized(*session_id)?.loser(),
        ParticipantSource::GroupQualifier { group, position } => {
            if !group_complete(sessions, group) {
                return None;
            }
            let index = usize::try_from(*position).ok()?.checked_sub(1)?;
            group_finishers(sessions, group, seeds).get(index).copied()
        }
    }
}

/// Result engine
#[derive(Clone)]
pub struct ResultEngine {
    store: Arc<dyn Store>,
    locks: LockManager,
}

impl ResultEngine {
    pub fn new(store: Arc<dyn Store>, locks: LockManager) -> Self {
        Self { store, locks }
    }

    /// Finalize a session and advance the bracket
    ///
    /// Finalizing is one-way. In the same unit of work every session waiting
    /// on this one gets its roster set, provided all of its slots resolve.
    ///
    /// # Errors
    ///
    /// * `TournamentError::SessionNotFound` - No such session
    /// * `TournamentError::InvalidState` - Tournament is not in progress
    /// * `TournamentError::AlreadyFinalized` - A result was already accepted
    /// * `TournamentError::RosterNotReady` - Feeders are not finished yet
    /// * `TournamentError::InvalidPayload` - Payload does not fit the session
    pub async fn submit_result(
        &self,
        session_id: SessionId,
        payload: &ResultPayload,
    ) -> TournamentResult<SubmitOutcome> {
        let tournament_id = self.tournament_of(session_id).await?;

        let _scope = self
            .locks
            .acquire("submit_result", [LockKey::Tournament(tournament_id)])
            .await?;
        let mut uow = self.store.begin().await?;

        let tournament = load_tournament(uow.as_mut(), tournament_id).await?;
        if tournament.state != TournamentState::InProgress {
            return Err(TournamentError::InvalidState {
                expected: TournamentState::InProgress,
                actual: tournament.state,
            });
        }
        let mut session = uow
            .session(session_id)
            .await?
            .ok_or(TournamentError::SessionNotFound(session_id))?;
        if session.finalized {
            return Err(TournamentError::AlreadyFinalized(session_id));
        }

        let result = evaluate(&tournament, &session, payload)?;
        session.result = Some(result);
        session.finalized = true;
        session.finalized_at = Some(Utc::now());
        uow.update_session(&session).await?;

        let populated = advance(uow.as_mut(), tournament_id, session_id).await?;
        uow.commit().await?;

        log::info!(
            "session {session_id} of tournament {tournament_id} finalized, {} roster(s) populated",
            populated.len()
        );
        Ok(SubmitOutcome { session, populated })
    }

    /// Current ranking, best first
    ///
    /// Empty until sessions are generated.
    pub async fn get_rankings(&self, tournament_id: TournamentId) -> TournamentResult<Vec<StandingRow>> {
        let mut uow = self.store.begin().await?;
        let rows = match rankings_in(uow.as_mut(), tournament_id).await {
            Err(TournamentError::SessionsNotGenerated) => Vec::new(),
            other => other?,
        };
        uow.rollback().await?;
        Ok(rows)
    }

    async fn tournament_of(&self, session_id: SessionId) -> TournamentResult<TournamentId> {
        let mut uow = self.store.begin().await?;
        let session = uow.session(session_id).await?;
        uow.rollback().await?;
        session
            .map(|s| s.tournament_id)
            .ok_or(TournamentError::SessionNotFound(session_id))
    }
}

/// Populate rosters that depended on `finalized`
async fn advance(
    uow: &mut dyn UnitOfWork,
    tournament_id: TournamentId,
    finalized: SessionId,
) -> TournamentResult<Vec<SessionId>> {
    let sessions = uow.sessions(tournament_id).await?;
    let graph = BracketGraph::from_sessions(&sessions);
    let dependents = graph.dependents_of(finalized);
    if dependents.is_empty() {
        return Ok(Vec::new());
    }
    let seeds = seeds_from_enrollments(&uow.enrollments(tournament_id).await?);

    let mut populated = Vec::new();
    for dependent in dependents {
        let Some(session) = sessions.iter().find(|s| s.id == *dependent) else {
            continue;
        };
        if session.participants.is_some() {
            continue;
        }
        let roster: Option<Vec<LicenseId>> = session
            .sources
            .iter()
            .map(|source| resolve_source(source, &sessions, &seeds))
            .collect();
        if let Some(roster) = roster {
            let mut ready = session.clone();
            ready.participants = Some(roster);
            uow.update_session(&ready).await?;
            populated.push(ready.id);
        }
    }
    Ok(populated)
}

/// Ranking read inside a unit of work, shared with reward distribution
pub(crate) async fn rankings_in(
    uow: &mut dyn UnitOfWork,
    tournament_id: TournamentId,
) -> TournamentResult<Vec<StandingRow>> {
    let tournament = load_tournament(uow, tournament_id).await?;
    let sessions = uow.sessions(tournament_id).await?;
    if sessions.is_empty() {
        return Err(TournamentError::SessionsNotGenerated);
    }
    let seeds = seeds_from_enrollments(&uow.enrollments(tournament_id).await?);
    Ok(final_standings(&tournament, &sessions, &seeds))
}
