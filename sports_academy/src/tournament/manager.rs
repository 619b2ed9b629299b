//! Tournament lifecycle manager.

use super::{
    errors::{TournamentError, TournamentResult},
    models::{AuditKind, NewAuditEntry, NewTournament, Tournament, TournamentAuditEntry, TournamentConfig, TournamentId},
    state::TournamentState,
};
use crate::ledger::{CreditLedger, Posting, TransactionKind};
use crate::locks::{LockKey, LockManager};
use crate::skills::SkillCatalog;
use crate::store::{Store, UnitOfWork};
use chrono::Utc;
use std::sync::Arc;

/// Minimum active enrollments needed to start
pub const MIN_PARTICIPANTS: usize = 2;

/// Read a tournament inside a unit of work
pub(crate) async fn load_tournament(
    uow: &mut dyn UnitOfWork,
    id: TournamentId,
) -> TournamentResult<Tournament> {
    uow.tournament(id)
        .await?
        .ok_or(TournamentError::NotFound(id))
}

/// Persist a state change and its audit row
///
/// The caller has already checked the transition or reset table. The update
/// carries the version read earlier, so a concurrent writer surfaces as
/// `StoreError::VersionConflict`.
pub(crate) async fn record_transition(
    uow: &mut dyn UnitOfWork,
    tournament: &Tournament,
    to: TournamentState,
    kind: AuditKind,
    reason: Option<String>,
    actor: Option<&str>,
) -> TournamentResult<Tournament> {
    let mut next = tournament.clone();
    next.state = to;
    let saved = uow.update_tournament(&next).await?;
    uow.insert_audit(&NewAuditEntry {
        tournament_id: tournament.id,
        from_state: tournament.state,
        to_state: to,
        kind,
        reason,
        actor: actor.map(str::to_string),
    })
    .await?;
    Ok(saved)
}

fn check_transition(tournament: &Tournament, to: TournamentState) -> TournamentResult<()> {
    if tournament.state.can_transition_to(to) {
        Ok(())
    } else {
        Err(TournamentError::InvalidTransition {
            from: tournament.state,
            to,
        })
    }
}

fn required_reason(reason: &str) -> TournamentResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(TournamentError::ReasonRequired);
    }
    Ok(reason.to_string())
}

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    store: Arc<dyn Store>,
    locks: LockManager,
    skills: SkillCatalog,
    default_cost: i64,
}

impl TournamentManager {
    /// Create a new tournament manager
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional store
    /// * `locks` - Shared lock manager
    /// * `skills` - Skills reward weights may name
    /// * `default_cost` - Enrollment cost for configs that leave it unset
    pub fn new(
        store: Arc<dyn Store>,
        locks: LockManager,
        skills: SkillCatalog,
        default_cost: i64,
    ) -> Self {
        Self {
            store,
            locks,
            skills,
            default_cost,
        }
    }

    /// Create a new tournament in `Draft`
    ///
    /// The configuration, reward weights included, is validated before
    /// anything is written.
    pub async fn create_tournament(&self, config: TournamentConfig) -> TournamentResult<Tournament> {
        config
            .validate(&self.skills)
            .map_err(TournamentError::InvalidConfig)?;

        let new = NewTournament::from_config(config, self.default_cost);
        let mut uow = self.store.begin().await?;
        let tournament = uow.insert_tournament(&new).await?;
        uow.commit().await?;

        log::info!(
            "created tournament {} '{}' ({}, max {})",
            tournament.id,
            tournament.name,
            tournament.format,
            tournament.max_participants
        );
        Ok(tournament)
    }

    /// `Draft -> EnrollmentOpen`
    pub async fn open_enrollment(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.transition("open_enrollment", id, TournamentState::EnrollmentOpen, actor)
            .await
    }

    /// `EnrollmentOpen -> InProgress`, needs at least two active enrollments
    pub async fn start_tournament(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.transition("start_tournament", id, TournamentState::InProgress, actor)
            .await
    }

    /// `InProgress -> Completed`, needs every session finalized
    pub async fn complete_tournament(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.transition("complete_tournament", id, TournamentState::Completed, actor)
            .await
    }

    async fn transition(
        &self,
        operation: &'static str,
        id: TournamentId,
        to: TournamentState,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        let _scope = self.locks.acquire(operation, [LockKey::Tournament(id)]).await?;
        let mut uow = self.store.begin().await?;
        let tournament = load_tournament(uow.as_mut(), id).await?;
        check_transition(&tournament, to)?;

        match to {
            TournamentState::InProgress => {
                let current = uow
                    .enrollments(id)
                    .await?
                    .iter()
                    .filter(|e| e.is_active())
                    .count();
                if current < MIN_PARTICIPANTS {
                    return Err(TournamentError::InsufficientParticipants {
                        needed: MIN_PARTICIPANTS,
                        current,
                    });
                }
            }
            TournamentState::Completed => {
                let sessions = uow.sessions(id).await?;
                if sessions.is_empty() {
                    return Err(TournamentError::SessionsNotGenerated);
                }
                let pending = sessions.iter().filter(|s| !s.finalized).count();
                if pending > 0 {
                    return Err(TournamentError::SessionsNotFinalized { pending });
                }
            }
            _ => {}
        }

        let saved =
            record_transition(uow.as_mut(), &tournament, to, AuditKind::Transition, None, actor)
                .await?;
        uow.commit().await?;

        log::info!("tournament {id}: {} -> {}", tournament.state, saved.state);
        Ok(saved)
    }

    /// Cancel a tournament that has not completed
    ///
    /// Every active enrollment is refunded in full and marked withdrawn in
    /// the same unit of work.
    pub async fn cancel_tournament(
        &self,
        id: TournamentId,
        reason: &str,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        let reason = required_reason(reason)?;
        let mut scope = self
            .locks
            .acquire("cancel_tournament", [LockKey::Tournament(id)])
            .await?;
        let mut uow = self.store.begin().await?;
        let tournament = load_tournament(uow.as_mut(), id).await?;
        check_transition(&tournament, TournamentState::Cancelled)?;

        let active: Vec<_> = uow
            .enrollments(id)
            .await?
            .into_iter()
            .filter(|e| e.is_active())
            .collect();
        scope
            .extend(active.iter().map(|e| LockKey::License(e.license_id)))
            .await?;

        let now = Utc::now();
        let mut refunded = 0;
        for mut enrollment in active {
            if enrollment.credits_charged > 0 {
                let posting = Posting::new(
                    enrollment.license_id,
                    enrollment.credits_charged,
                    TransactionKind::Refund,
                )
                .for_enrollment(enrollment.id)
                .with_reference(format!("enrollment:{}:refund", enrollment.id))
                .describe(format!("Tournament {id} cancelled"));
                CreditLedger::credit_in(uow.as_mut(), &scope, &posting).await?;
                refunded += enrollment.credits_charged;
            }
            enrollment.withdrawn_at = Some(now);
            enrollment.refund_amount = Some(enrollment.credits_charged);
            uow.update_enrollment(&enrollment).await?;
        }

        let mut cancelled = tournament.clone();
        cancelled.cancel_reason = Some(reason.clone());
        let saved = record_transition(
            uow.as_mut(),
            &cancelled,
            TournamentState::Cancelled,
            AuditKind::Transition,
            Some(reason),
            actor,
        )
        .await?;
        uow.commit().await?;

        log::info!(
            "tournament {id} cancelled from {}, refunded {refunded} credits",
            tournament.state
        );
        Ok(saved)
    }

    /// Admin reset along the reset table
    ///
    /// Always audited. The reward record is never touched, so a reset
    /// tournament cannot be paid twice.
    pub async fn reset_tournament(
        &self,
        id: TournamentId,
        target: TournamentState,
        reason: &str,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        let reason = required_reason(reason)?;
        let _scope = self
            .locks
            .acquire("reset_tournament", [LockKey::Tournament(id)])
            .await?;
        let mut uow = self.store.begin().await?;
        let tournament = load_tournament(uow.as_mut(), id).await?;
        if !tournament.state.can_reset_to(target) {
            return Err(TournamentError::InvalidTransition {
                from: tournament.state,
                to: target,
            });
        }
        if target == TournamentState::Draft && !uow.sessions(id).await?.is_empty() {
            return Err(TournamentError::SessionsAlreadyGenerated);
        }

        let mut reset = tournament.clone();
        if target == TournamentState::Draft {
            reset.cancel_reason = None;
        }
        let saved = record_transition(
            uow.as_mut(),
            &reset,
            target,
            AuditKind::Reset,
            Some(reason.clone()),
            actor,
        )
        .await?;
        uow.commit().await?;

        log::warn!(
            "tournament {id} reset {} -> {target} by {}: {reason}",
            tournament.state,
            actor.unwrap_or("unknown")
        );
        Ok(saved)
    }

    /// Delete a tournament nobody ever enrolled in
    pub async fn delete_tournament(&self, id: TournamentId) -> TournamentResult<()> {
        let _scope = self
            .locks
            .acquire("delete_tournament", [LockKey::Tournament(id)])
            .await?;
        let mut uow = self.store.begin().await?;
        let tournament = load_tournament(uow.as_mut(), id).await?;
        if !matches!(
            tournament.state,
            TournamentState::Draft | TournamentState::EnrollmentOpen
        ) {
            return Err(TournamentError::InvalidState {
                expected: TournamentState::Draft,
                actual: tournament.state,
            });
        }
        let count = uow.enrollments(id).await?.len();
        if count > 0 {
            return Err(TournamentError::HasEnrollments { count });
        }
        uow.delete_tournament(id).await?;
        uow.commit().await?;

        log::info!("deleted tournament {id}");
        Ok(())
    }

    /// Get a tournament
    pub async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let mut uow = self.store.begin().await?;
        let tournament = load_tournament(uow.as_mut(), id).await?;
        uow.rollback().await?;
        Ok(tournament)
    }

    /// State changes of a tournament, oldest first
    pub async fn audit_trail(&self, id: TournamentId) -> TournamentResult<Vec<TournamentAuditEntry>> {
        let mut uow = self.store.begin().await?;
        load_tournament(uow.as_mut(), id).await?;
        let entries = uow.audit_trail(id).await?;
        uow.rollback().await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::NewEnrollment;
    use crate::locks::LockConfig;
    use crate::store::MemoryStore;
    use crate::telemetry::LogTelemetry;

    fn setup() -> (Arc<MemoryStore>, TournamentManager) {
        let store = Arc::new(MemoryStore::new());
        let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
        let manager = TournamentManager::new(store.clone(), locks, SkillCatalog::default(), 100);
        (store, manager)
    }

    async fn enroll_directly(store: &MemoryStore, tournament_id: TournamentId, license_id: i64) {
        let mut uow = store.begin().await.unwrap();
        uow.insert_enrollment(&NewEnrollment {
            tournament_id,
            license_id,
            credits_charged: 0,
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_config() {
        let (_, manager) = setup();
        let err = manager
            .create_tournament(TournamentConfig::league(" ".to_string(), 8, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_default_cost_applied() {
        let (_, manager) = setup();
        let mut config = TournamentConfig::knockout("Cup".to_string(), 8, 0);
        config.enrollment_cost = None;
        let t = manager.create_tournament(config).await.unwrap();
        assert_eq!(t.enrollment_cost, 100);
        assert_eq!(t.state, TournamentState::Draft);
    }

    #[tokio::test]
    async fn test_start_needs_two_enrollments() {
        let (store, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        manager.open_enrollment(t.id, Some("coach")).await.unwrap();
        enroll_directly(&store, t.id, 1).await;

        let err = manager.start_tournament(t.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            TournamentError::InsufficientParticipants { needed: 2, current: 1 }
        ));

        enroll_directly(&store, t.id, 2).await;
        let started = manager.start_tournament(t.id, None).await.unwrap();
        assert_eq!(started.state, TournamentState::InProgress);
        assert_eq!(started.version, 3);
    }

    #[tokio::test]
    async fn test_complete_needs_sessions() {
        let (store, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        manager.open_enrollment(t.id, None).await.unwrap();
        enroll_directly(&store, t.id, 1).await;
        enroll_directly(&store, t.id, 2).await;
        manager.start_tournament(t.id, None).await.unwrap();

        let err = manager.complete_tournament(t.id, None).await.unwrap_err();
        assert!(matches!(err, TournamentError::SessionsNotGenerated));
    }

    #[tokio::test]
    async fn test_invalid_transition_and_audit() {
        let (_, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        let err = manager.start_tournament(t.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            TournamentError::InvalidTransition {
                from: TournamentState::Draft,
                to: TournamentState::InProgress
            }
        ));

        manager.open_enrollment(t.id, Some("admin")).await.unwrap();
        let trail = manager.audit_trail(t.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].to_state, TournamentState::EnrollmentOpen);
        assert_eq!(trail[0].actor.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_cancel_requires_reason_and_is_terminal() {
        let (_, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        assert!(matches!(
            manager.cancel_tournament(t.id, "  ", None).await,
            Err(TournamentError::ReasonRequired)
        ));

        let cancelled = manager
            .cancel_tournament(t.id, "venue closed", None)
            .await
            .unwrap();
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("venue closed"));
        assert!(manager.open_enrollment(t.id, None).await.is_err());

        let reset = manager
            .reset_tournament(t.id, TournamentState::Draft, "venue reopened", Some("admin"))
            .await
            .unwrap();
        assert_eq!(reset.state, TournamentState::Draft);
        assert_eq!(reset.cancel_reason, None);
        let trail = manager.audit_trail(t.id).await.unwrap();
        assert_eq!(trail.last().unwrap().kind, AuditKind::Reset);
    }

    #[tokio::test]
    async fn test_reset_outside_table_rejected() {
        let (_, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        let err = manager
            .reset_tournament(t.id, TournamentState::Draft, "why not", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_delete_only_without_enrollments() {
        let (store, manager) = setup();
        let t = manager
            .create_tournament(TournamentConfig::league("L".to_string(), 8, 0))
            .await
            .unwrap();
        manager.open_enrollment(t.id, None).await.unwrap();
        enroll_directly(&store, t.id, 1).await;
        let err = manager.delete_tournament(t.id).await.unwrap_err();
        assert!(matches!(err, TournamentError::HasEnrollments { count: 1 }));

        let empty = manager
            .create_tournament(TournamentConfig::league("E".to_string(), 8, 0))
            .await
            .unwrap();
        manager.delete_tournament(empty.id).await.unwrap();
        assert!(matches!(
            manager.get_tournament(empty.id).await,
            Err(TournamentError::NotFound(_))
        ));
    }
}
