//! Service facade.
//!
//! [`Academy`] wires the services to one store, one lock manager and one
//! telemetry sink, and reports the outcome and duration of every public
//! operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::bracket::{BracketGenerator, Session, SessionId};
use crate::config::{AcademyConfig, ConfigError};
use crate::enrollment::{Enrollment, EnrollmentId, EnrollmentManager, Withdrawal};
use crate::ledger::{
    AccountVerification, CreditLedger, CreditTransaction, LedgerResult, LicenseId,
};
use crate::locks::LockManager;
use crate::results::{ResultEngine, ResultPayload, StandingRow, SubmitOutcome};
use crate::rewards::{Distribution, RewardPipeline, RewardSummary};
use crate::skills::{SkillProfile, SkillProgressionStore};
use crate::store::{MemoryStore, Store, StoreResult};
use crate::telemetry::{LogTelemetry, Telemetry};
use crate::tournament::{
    Tournament, TournamentAuditEntry, TournamentConfig, TournamentFormat, TournamentId,
    TournamentManager, TournamentResult, TournamentState,
};

/// Tournament core entry point
#[derive(Clone)]
pub struct Academy {
    tournaments: TournamentManager,
    enrollments: EnrollmentManager,
    generator: BracketGenerator,
    engine: ResultEngine,
    rewards: RewardPipeline,
    ledger: CreditLedger,
    skills: SkillProgressionStore,
    telemetry: Arc<dyn Telemetry>,
}

impl Academy {
    /// Build the services over `store`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when `config` fails validation.
    pub fn new(
        config: AcademyConfig,
        store: Arc<dyn Store>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, store, telemetry))
    }

    /// Default configuration over a fresh [`MemoryStore`], logging telemetry
    pub fn in_memory() -> Self {
        Self::assemble(
            AcademyConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(LogTelemetry),
        )
    }

    fn assemble(config: AcademyConfig, store: Arc<dyn Store>, telemetry: Arc<dyn Telemetry>) -> Self {
        let locks = LockManager::new(config.locks.clone(), telemetry.clone());
        Self {
            tournaments: TournamentManager::new(
                store.clone(),
                locks.clone(),
                config.skills.clone(),
                config.enrollment.default_cost,
            ),
            enrollments: EnrollmentManager::new(store.clone(), locks.clone(), config.enrollment),
            generator: BracketGenerator::new(store.clone(), locks.clone()),
            engine: ResultEngine::new(store.clone(), locks.clone()),
            rewards: RewardPipeline::new(store.clone(), locks.clone(), config.max_skill_delta),
            ledger: CreditLedger::new(store.clone(), locks),
            skills: SkillProgressionStore::new(store),
            telemetry,
        }
    }

    async fn observe<T, E, F>(&self, operation: &'static str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = work.await;
        self.telemetry
            .operation_completed(operation, result.is_ok(), started.elapsed());
        result
    }

    // Tournament lifecycle

    pub async fn create_tournament(&self, config: TournamentConfig) -> TournamentResult<Tournament> {
        self.observe("create_tournament", self.tournaments.create_tournament(config))
            .await
    }

    pub async fn open_enrollment(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.observe("open_enrollment", self.tournaments.open_enrollment(id, actor))
            .await
    }

    pub async fn start_tournament(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.observe("start_tournament", self.tournaments.start_tournament(id, actor))
            .await
    }

    pub async fn complete_tournament(
        &self,
        id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.observe(
            "complete_tournament",
            self.tournaments.complete_tournament(id, actor),
        )
        .await
    }

    /// Cancel and refund every active enrollment in full
    pub async fn cancel_tournament(
        &self,
        id: TournamentId,
        reason: &str,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.observe(
            "cancel_tournament",
            self.tournaments.cancel_tournament(id, reason, actor),
        )
        .await
    }

    /// Admin reset; never reverses a reward distribution
    pub async fn reset_tournament(
        &self,
        id: TournamentId,
        target: TournamentState,
        reason: &str,
        actor: Option<&str>,
    ) -> TournamentResult<Tournament> {
        self.observe(
            "reset_tournament",
            self.tournaments.reset_tournament(id, target, reason, actor),
        )
        .await
    }

    pub async fn delete_tournament(&self, id: TournamentId) -> TournamentResult<()> {
        self.observe("delete_tournament", self.tournaments.delete_tournament(id))
            .await
    }

    pub async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.observe("get_tournament", self.tournaments.get_tournament(id))
            .await
    }

    pub async fn audit_trail(&self, id: TournamentId) -> TournamentResult<Vec<TournamentAuditEntry>> {
        self.observe("audit_trail", self.tournaments.audit_trail(id))
            .await
    }

    // Enrollment

    pub async fn enroll(
        &self,
        tournament_id: TournamentId,
        license_id: LicenseId,
    ) -> TournamentResult<Enrollment> {
        self.observe("enroll", self.enrollments.enroll(tournament_id, license_id))
            .await
    }

    pub async fn withdraw(&self, enrollment_id: EnrollmentId) -> TournamentResult<Withdrawal> {
        self.observe("withdraw", self.enrollments.withdraw(enrollment_id))
            .await
    }

    pub async fn list_enrollments(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Enrollment>> {
        self.observe(
            "list_enrollments",
            self.enrollments.list_enrollments(tournament_id),
        )
        .await
    }

    // Sessions and results

    /// Generate the full session graph for `roster`
    ///
    /// `roster` must be a subset of the active enrollments, in seed order.
    pub async fn generate_sessions(
        &self,
        tournament_id: TournamentId,
        roster: &[LicenseId],
        format: TournamentFormat,
    ) -> TournamentResult<Vec<Session>> {
        self.observe(
            "generate_sessions",
            self.generator.generate_sessions(tournament_id, roster, format),
        )
        .await
    }

    /// Generate sessions for every active enrollment, seeded by enrollment order
    pub async fn generate_for_enrolled(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Session>> {
        self.observe("generate_sessions", async {
            let tournament = self.tournaments.get_tournament(tournament_id).await?;
            let roster = self.enrollments.active_roster(tournament_id).await?;
            self.generator
                .generate_sessions(tournament_id, &roster, tournament.format)
                .await
        })
        .await
    }

    pub async fn list_sessions(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Session>> {
        self.observe("list_sessions", self.generator.list_sessions(tournament_id))
            .await
    }

    pub async fn get_session(&self, session_id: SessionId) -> TournamentResult<Session> {
        self.observe("get_session", self.generator.get_session(session_id))
            .await
    }

    pub async fn submit_result(
        &self,
        session_id: SessionId,
        payload: &ResultPayload,
    ) -> TournamentResult<SubmitOutcome> {
        self.observe("submit_result", self.engine.submit_result(session_id, payload))
            .await
    }

    /// Standings recomputed from finalized sessions
    pub async fn get_rankings(&self, tournament_id: TournamentId) -> TournamentResult<Vec<StandingRow>> {
        self.observe("get_rankings", self.engine.get_rankings(tournament_id))
            .await
    }

    // Rewards

    pub async fn distribute_rewards(
        &self,
        tournament_id: TournamentId,
        actor: Option<&str>,
    ) -> TournamentResult<Distribution> {
        self.observe(
            "distribute_rewards",
            self.rewards.distribute_rewards(tournament_id, actor),
        )
        .await
    }

    pub async fn get_distribution(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<RewardSummary>> {
        self.observe("get_distribution", self.rewards.get_distribution(tournament_id))
            .await
    }

    pub async fn xp_total(&self, license_id: LicenseId) -> TournamentResult<i64> {
        self.observe("xp_total", self.rewards.xp_total(license_id))
            .await
    }

    pub async fn skill_profile(&self, license_id: LicenseId) -> StoreResult<SkillProfile> {
        self.observe("skill_profile", self.skills.profile(license_id))
            .await
    }

    // Credits

    pub async fn get_balance(&self, license_id: LicenseId) -> LedgerResult<i64> {
        self.observe("get_balance", self.ledger.get_balance(license_id))
            .await
    }

    pub async fn get_transaction_history(
        &self,
        license_id: LicenseId,
    ) -> LedgerResult<Vec<CreditTransaction>> {
        self.observe(
            "get_transaction_history",
            self.ledger.get_transaction_history(license_id),
        )
        .await
    }

    pub async fn purchase_credits(
        &self,
        license_id: LicenseId,
        amount: i64,
        reference: Option<String>,
    ) -> LedgerResult<CreditTransaction> {
        self.observe(
            "purchase_credits",
            self.ledger.purchase(license_id, amount, reference),
        )
        .await
    }

    pub async fn verify_account(&self, license_id: LicenseId) -> LedgerResult<AccountVerification> {
        self.observe("verify_account", self.ledger.verify_account(license_id))
            .await
    }
}
