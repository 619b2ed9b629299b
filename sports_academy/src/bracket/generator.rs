//! Session generation for in-progress tournaments.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::groups::plan_groups;
use super::knockout::plan_knockout;
use super::league::{plan_heat, plan_league};
use super::models::{NewSession, Session, SessionId, participant_filter};
use super::plan::BracketPlan;
use crate::ledger::LicenseId;
use crate::locks::{LockKey, LockManager};
use crate::store::Store;
use crate::tournament::manager::load_tournament;
use crate::tournament::{
    Tournament, TournamentError, TournamentFormat, TournamentId, TournamentResult, TournamentState,
};

/// Plan sessions for a tournament's format and scoring
pub fn plan_for(tournament: &Tournament, roster: &[LicenseId]) -> TournamentResult<BracketPlan> {
    if !tournament.scoring.is_head_to_head() {
        return Ok(plan_heat(roster));
    }
    let plan = match tournament.format {
        TournamentFormat::League => plan_league(roster),
        TournamentFormat::Knockout => plan_knockout(roster, tournament.third_place_match),
        TournamentFormat::GroupPlusKnockout => {
            plan_groups(roster, tournament.group_stage, tournament.third_place_match)
                .map_err(TournamentError::InvalidRoster)?
        }
    };
    plan.check_feeders().map_err(TournamentError::InvalidRoster)?;
    Ok(plan)
}

/// Roster must have at least two entries and no duplicates
pub fn validate_roster(roster: &[LicenseId]) -> TournamentResult<()> {
    if roster.len() < 2 {
        return Err(TournamentError::InvalidRoster(format!(
            "at least 2 participants are required, got {}",
            roster.len()
        )));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = roster.iter().find(|id| !seen.insert(**id)) {
        return Err(TournamentError::InvalidRoster(format!(
            "license {dup} appears more than once"
        )));
    }
    Ok(())
}

/// Bracket generator
#[derive(Clone)]
pub struct BracketGenerator {
    store: Arc<dyn Store>,
    locks: LockManager,
}

impl BracketGenerator {
    pub fn new(store: Arc<dyn Store>, locks: LockManager) -> Self {
        Self { store, locks }
    }

    /// Create every session of a tournament
    ///
    /// # Arguments
    ///
    /// * `tournament_id` - Tournament in `InProgress`
    /// * `roster` - Active licenses in seeding order, best seed first
    /// * `format` - Must match the tournament's format
    ///
    /// # Returns
    ///
    /// Created sessions in creation order. Sessions whose slots all come
    /// from the roster have their participants set; the rest wait on feeders.
    pub async fn generate_sessions(
        &self,
        tournament_id: TournamentId,
        roster: &[LicenseId],
        format: TournamentFormat,
    ) -> TournamentResult<Vec<Session>> {
        validate_roster(roster)?;

        let _scope = self
            .locks
            .acquire("generate_sessions", [LockKey::Tournament(tournament_id)])
            .await?;
        let mut uow = self.store.begin().await?;

        let tournament = load_tournament(uow.as_mut(), tournament_id).await?;
        if tournament.state != TournamentState::InProgress {
            return Err(TournamentError::InvalidState {
                expected: TournamentState::InProgress,
                actual: tournament.state,
            });
        }
        if tournament.format != format {
            return Err(TournamentError::InvalidConfig(format!(
                "tournament {tournament_id} is {}, not {format}",
                tournament.format
            )));
        }
        if !uow.sessions(tournament_id).await?.is_empty() {
            return Err(TournamentError::SessionsAlreadyGenerated);
        }

        let active: BTreeSet<LicenseId> = uow
            .enrollments(tournament_id)
            .await?
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.license_id)
            .collect();
        if let Some(stranger) = roster.iter().find(|id| !active.contains(*id)) {
            return Err(TournamentError::InvalidRoster(format!(
                "license {stranger} has no active enrollment"
            )));
        }

        let plan = plan_for(&tournament, roster)?;
        let mut ids: Vec<SessionId> = Vec::with_capacity(plan.len());
        let mut sessions = Vec::with_capacity(plan.len());
        for planned in plan.sessions() {
            let sources = planned
                .sources
                .iter()
                .map(|s| s.resolve(&ids))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    TournamentError::InvalidRoster("session fed by a later session".to_string())
                })?;
            let participants = planned
                .is_fully_fixed()
                .then(|| planned.fixed_participants());
            let session = uow
                .insert_session(&NewSession {
                    tournament_id,
                    phase: planned.phase,
                    round: planned.round,
                    bracket_position: planned.bracket_position,
                    group_label: planned.group_label.clone(),
                    participant_filter: participant_filter(&sources),
                    sources,
                    participants,
                })
                .await?;
            ids.push(session.id);
            sessions.push(session);
        }
        uow.commit().await?;

        log::info!(
            "generated {} sessions for tournament {tournament_id} ({format}, {} participants)",
            sessions.len(),
            roster.len()
        );
        Ok(sessions)
    }

    /// Sessions of a tournament in creation order
    pub async fn list_sessions(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Session>> {
        let mut uow = self.store.begin().await?;
        load_tournament(uow.as_mut(), tournament_id).await?;
        let sessions = uow.sessions(tournament_id).await?;
        uow.rollback().await?;
        Ok(sessions)
    }

    pub async fn get_session(&self, session_id: SessionId) -> TournamentResult<Session> {
        let mut uow = self.store.begin().await?;
        let session = uow
            .session(session_id)
            .await?
            .ok_or(TournamentError::SessionNotFound(session_id))?;
        uow.rollback().await?;
        Ok(session)
    }
}
