//! Reward distribution.

use std::sync::Arc;

use chrono::Utc;

use super::calculator::compute_rewards;
use super::models::{Distribution, NewXpEntry, RewardDistributionRecord, RewardSummary};
use crate::ledger::{CreditLedger, LicenseId, Posting, TransactionKind};
use crate::locks::{LockKey, LockManager};
use crate::results::engine::rankings_in;
use crate::skills::{NewSkillDelta, record_delta};
use crate::store::{Store, StoreError, constraints};
use crate::tournament::manager::{load_tournament, record_transition};
use crate::tournament::{
    AuditKind, TournamentError, TournamentId, TournamentResult, TournamentState,
};

/// Reward pipeline
///
/// Pays credits, XP and skill deltas for a completed tournament exactly
/// once. The distribution record is the idempotency gate: it is written in
/// the same unit of work as every payout, and a tournament that already has
/// one is never paid again, admin resets included.
#[derive(Clone)]
pub struct RewardPipeline {
    store: Arc<dyn Store>,
    locks: LockManager,
    max_skill_delta: f64,
}

impl RewardPipeline {
    /// Create a new pipeline
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional store
    /// * `locks` - Shared lock manager
    /// * `max_skill_delta` - Winner's skill delta when the tournament sets none
    pub fn new(store: Arc<dyn Store>, locks: LockManager, max_skill_delta: f64) -> Self {
        Self {
            store,
            locks,
            max_skill_delta,
        }
    }

    /// Distribute rewards for a completed tournament
    ///
    /// # Returns
    ///
    /// * `Distribution::Applied` - This call paid out
    /// * `Distribution::AlreadyDistributed` - An earlier call did; nothing is paid, a
    ///   tournament completed again after a reset only moves to `RewardsDistributed`
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotCompleted` - Tournament is not `Completed`
    /// * `TournamentError::SessionsNotGenerated` - Nothing to rank
    pub async fn distribute_rewards(
        &self,
        tournament_id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Distribution> {
        let mut scope = self
            .locks
            .acquire("distribute_rewards", [LockKey::Tournament(tournament_id)])
            .await?;
        let mut uow = self.store.begin().await?;

        let tournament = load_tournament(uow.as_mut(), tournament_id).await?;
        if let Some(record) = uow.reward_record(tournament_id).await? {
            if tournament.state == TournamentState::Completed {
                // Completed again after a reset: close it without paying twice.
                record_transition(
                    uow.as_mut(),
                    &tournament,
                    TournamentState::RewardsDistributed,
                    AuditKind::Transition,
                    None,
                    actor,
                )
                .await?;
                uow.commit().await?;
                log::info!(
                    "tournament {tournament_id} closed again; rewards were already distributed"
                );
            } else {
                log::debug!("rewards for tournament {tournament_id} already distributed");
            }
            return Ok(Distribution::AlreadyDistributed(record.summary));
        }
        if tournament.state != TournamentState::Completed {
            return Err(TournamentError::NotCompleted {
                state: tournament.state,
            });
        }

        let standings = rankings_in(uow.as_mut(), tournament_id).await?;
        let rewards = compute_rewards(&tournament.reward_config, &standings, self.max_skill_delta);

        scope
            .extend(rewards.iter().map(|r| LockKey::License(r.license_id)))
            .await?;

        for reward in &rewards {
            let license_id = reward.license_id;
            if reward.credits > 0 {
                let posting = Posting::new(license_id, reward.credits, TransactionKind::Reward)
                    .with_reference(format!("reward:{tournament_id}:{license_id}"))
                    .describe(format!(
                        "Placement {} in {}",
                        reward.placement, tournament.name
                    ));
                CreditLedger::credit_in(uow.as_mut(), &scope, &posting).await?;
            }
            if reward.xp > 0 {
                uow.insert_xp_entry(&NewXpEntry {
                    license_id,
                    tournament_id,
                    amount: reward.xp,
                })
                .await?;
            }
            for (skill, delta) in &reward.skill_deltas {
                if *delta == 0.0 {
                    continue;
                }
                record_delta(
                    uow.as_mut(),
                    NewSkillDelta {
                        license_id,
                        skill: skill.clone(),
                        tournament_id,
                        delta: *delta,
                    },
                )
                .await?;
            }
        }

        let distributed_at = Utc::now();
        let summary = RewardSummary {
            tournament_id,
            total_credits: rewards.iter().map(|r| r.credits).sum(),
            total_xp: rewards.iter().map(|r| r.xp).sum(),
            participants: rewards,
            distributed_at,
        };
        let inserted = uow
            .insert_reward_record(&RewardDistributionRecord {
                tournament_id,
                summary: summary.clone(),
                distributed_at,
            })
            .await;
        if let Err(err) = inserted {
            let err = lost_race(err)?;
            uow.rollback().await?;
            drop(scope);
            return self.already_distributed(tournament_id, err).await;
        }
        record_transition(
            uow.as_mut(),
            &tournament,
            TournamentState::RewardsDistributed,
            AuditKind::Transition,
            None,
            actor,
        )
        .await?;

        if let Err(err) = uow.commit().await {
            // Another process won the race; report its record.
            let err = lost_race(err)?;
            drop(scope);
            return self.already_distributed(tournament_id, err).await;
        }
        drop(scope);

        log::info!(
            "distributed rewards for tournament {tournament_id}: {} participants, {} credits, {} xp",
            summary.participants.len(),
            summary.total_credits,
            summary.total_xp
        );
        Ok(Distribution::Applied(summary))
    }

    async fn already_distributed(
        &self,
        tournament_id: TournamentId,
        err: StoreError,
    ) -> TournamentResult<Distribution> {
        match self.get_distribution(tournament_id).await? {
            Some(summary) => Ok(Distribution::AlreadyDistributed(summary)),
            None => Err(err.into()),
        }
    }

    /// Summary of a past distribution
    pub async fn get_distribution(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<RewardSummary>> {
        let mut uow = self.store.begin().await?;
        let record = uow.reward_record(tournament_id).await?;
        uow.rollback().await?;
        Ok(record.map(|r| r.summary))
    }

    /// XP earned across all tournaments
    pub async fn xp_total(&self, license_id: LicenseId) -> TournamentResult<i64> {
        let mut uow = self.store.begin().await?;
        let entries = uow.xp_entries(license_id).await?;
        uow.rollback().await?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }
}

/// Keep a reward record unique violation, fail on anything else
///
/// Postgres reports the violation on insert, the memory store on commit.
fn lost_race(err: StoreError) -> TournamentResult<StoreError> {
    if err.violates(constraints::REWARD_RECORD) {
        Ok(err)
    } else {
        Err(err.into())
    }
}
