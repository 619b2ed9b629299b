//! PostgreSQL store.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::{Store, StoreError, StoreResult, UnitOfWork};
use crate::bracket::{NewSession, ParticipantSource, Session, SessionId};
use crate::db::timeouts::with_timeout;
use crate::enrollment::{Enrollment, EnrollmentId, NewEnrollment};
use crate::ledger::{CreditAccount, CreditTransaction, LicenseId, NewCreditTransaction};
use crate::results::SessionResult;
use crate::rewards::{NewXpEntry, RewardConfig, RewardDistributionRecord, RewardSummary, XpEntry};
use crate::skills::{NewSkillDelta, SkillProgressionDelta};
use crate::tournament::{
    GroupStageConfig, NewAuditEntry, NewTournament, ScoringMode, Tournament,
    TournamentAuditEntry, TournamentId,
};

/// PostgreSQL-backed [`Store`]
///
/// Every statement, including `BEGIN`, runs under the configured query
/// timeout.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
    query_timeout: Duration,
}

impl PgStore {
    /// Create a new store
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `query_timeout` - Deadline for each statement
    pub fn new(pool: Arc<PgPool>, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = with_timeout(self.query_timeout, self.pool.begin()).await?;
        Ok(Box::new(PgUnitOfWork {
            tx,
            timeout: self.query_timeout,
        }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    timeout: Duration,
}

fn parse<T>(table: &'static str, value: String) -> StoreResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|reason| StoreError::Corrupt { table, reason })
}

fn timestamp(row: &PgRow, column: &str) -> chrono::DateTime<chrono::Utc> {
    row.get::<NaiveDateTime, _>(column).and_utc()
}

fn optional_timestamp(row: &PgRow, column: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    row.get::<Option<NaiveDateTime>, _>(column)
        .map(|dt| dt.and_utc())
}

fn tournament_from_row(row: &PgRow) -> StoreResult<Tournament> {
    let scoring: Json<ScoringMode> = row.try_get("scoring")?;
    let reward_config: Json<RewardConfig> = row.try_get("reward_config")?;
    let group_stage: Json<GroupStageConfig> = row.try_get("group_stage")?;
    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        format: parse("tournaments", row.get("format"))?,
        scoring: scoring.0,
        state: parse("tournaments", row.get("state"))?,
        max_participants: row.get::<i32, _>("max_participants") as u32,
        enrollment_cost: row.get("enrollment_cost"),
        reward_config: reward_config.0,
        group_stage: group_stage.0,
        allow_draws: row.get("allow_draws"),
        third_place_match: row.get("third_place_match"),
        cancel_reason: row.get("cancel_reason"),
        version: row.get("version"),
        created_at: timestamp(row, "created_at"),
        updated_at: timestamp(row, "updated_at"),
    })
}

fn audit_from_row(row: &PgRow) -> StoreResult<TournamentAuditEntry> {
    Ok(TournamentAuditEntry {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        from_state: parse("tournament_audit_log", row.get("from_state"))?,
        to_state: parse("tournament_audit_log", row.get("to_state"))?,
        kind: parse("tournament_audit_log", row.get("kind"))?,
        reason: row.get("reason"),
        actor: row.get("actor"),
        created_at: timestamp(row, "created_at"),
    })
}

fn enrollment_from_row(row: &PgRow) -> Enrollment {
    Enrollment {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        license_id: row.get("license_id"),
        credits_charged: row.get("credits_charged"),
        enrolled_at: timestamp(row, "enrolled_at"),
        withdrawn_at: optional_timestamp(row, "withdrawn_at"),
        refund_amount: row.get("refund_amount"),
    }
}

fn session_from_row(row: &PgRow) -> StoreResult<Session> {
    let sources: Json<Vec<ParticipantSource>> = row.try_get("sources")?;
    let participants: Option<Json<Vec<LicenseId>>> = row.try_get("participants")?;
    let result: Option<Json<SessionResult>> = row.try_get("result")?;
    Ok(Session {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        phase: parse("sessions", row.get("phase"))?,
        round: row.get::<i32, _>("round") as u32,
        bracket_position: row.get::<i32, _>("bracket_position") as u32,
        group_label: row.get("group_label"),
        sources: sources.0,
        participant_filter: row.get("participant_filter"),
        participants: participants.map(|p| p.0),
        result: result.map(|r| r.0),
        finalized: row.get("finalized"),
        finalized_at: optional_timestamp(row, "finalized_at"),
        created_at: timestamp(row, "created_at"),
    })
}

fn account_from_row(row: &PgRow) -> CreditAccount {
    CreditAccount {
        license_id: row.get("license_id"),
        balance: row.get("balance"),
        updated_at: timestamp(row, "updated_at"),
    }
}

fn transaction_from_row(row: &PgRow) -> StoreResult<CreditTransaction> {
    Ok(CreditTransaction {
        id: row.get("id"),
        license_id: row.get("license_id"),
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        kind: parse("credit_transactions", row.get("kind"))?,
        enrollment_id: row.get("enrollment_id"),
        reference: row.get("reference"),
        description: row.get("description"),
        created_at: timestamp(row, "created_at"),
    })
}

fn xp_from_row(row: &PgRow) -> XpEntry {
    XpEntry {
        id: row.get("id"),
        license_id: row.get("license_id"),
        tournament_id: row.get("tournament_id"),
        amount: row.get("amount"),
        created_at: timestamp(row, "created_at"),
    }
}

fn skill_delta_from_row(row: &PgRow) -> SkillProgressionDelta {
    SkillProgressionDelta {
        license_id: row.get("license_id"),
        skill: row.get("skill"),
        tournament_id: row.get("tournament_id"),
        delta: row.get("delta"),
        created_at: timestamp(row, "created_at"),
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_tournament(&mut self, tournament: &NewTournament) -> StoreResult<Tournament> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tournaments
                    (name, format, scoring, max_participants, enrollment_cost,
                     reward_config, group_stage, allow_draws, third_place_match)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
                "#,
            )
            .bind(&tournament.name)
            .bind(tournament.format.to_string())
            .bind(Json(&tournament.scoring))
            .bind(tournament.max_participants as i32)
            .bind(tournament.enrollment_cost)
            .bind(Json(&tournament.reward_config))
            .bind(Json(&tournament.group_stage))
            .bind(tournament.allow_draws)
            .bind(tournament.third_place_match)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        tournament_from_row(&row)
    }

    async fn tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM tournaments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn update_tournament(&mut self, tournament: &Tournament) -> StoreResult<Tournament> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE tournaments
                SET state = $1, cancel_reason = $2, version = version + 1, updated_at = NOW()
                WHERE id = $3 AND version = $4
                RETURNING *
                "#,
            )
            .bind(tournament.state.to_string())
            .bind(&tournament.cancel_reason)
            .bind(tournament.id)
            .bind(tournament.version)
            .fetch_optional(&mut *self.tx),
        )
        .await?;

        match row {
            Some(row) => tournament_from_row(&row),
            None => {
                let current = with_timeout(
                    self.timeout,
                    sqlx::query("SELECT version FROM tournaments WHERE id = $1")
                        .bind(tournament.id)
                        .fetch_optional(&mut *self.tx),
                )
                .await?;
                match current {
                    Some(row) => Err(StoreError::VersionConflict {
                        id: tournament.id,
                        expected: tournament.version,
                        found: row.get("version"),
                    }),
                    None => Err(StoreError::NotFound {
                        entity: "tournament",
                        id: tournament.id,
                    }),
                }
            }
        }
    }

    async fn delete_tournament(&mut self, id: TournamentId) -> StoreResult<bool> {
        let result = with_timeout(
            self.timeout,
            sqlx::query("DELETE FROM tournaments WHERE id = $1")
                .bind(id)
                .execute(&mut *self.tx),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> StoreResult<TournamentAuditEntry> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO tournament_audit_log
                    (tournament_id, from_state, to_state, kind, reason, actor)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(entry.tournament_id)
            .bind(entry.from_state.to_string())
            .bind(entry.to_state.to_string())
            .bind(entry.kind.to_string())
            .bind(&entry.reason)
            .bind(&entry.actor)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        audit_from_row(&row)
    }

    async fn audit_trail(&mut self, id: TournamentId) -> StoreResult<Vec<TournamentAuditEntry>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM tournament_audit_log WHERE tournament_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        rows.iter().map(audit_from_row).collect()
    }

    async fn insert_enrollment(&mut self, enrollment: &NewEnrollment) -> StoreResult<Enrollment> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO enrollments (tournament_id, license_id, credits_charged)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(enrollment.tournament_id)
            .bind(enrollment.license_id)
            .bind(enrollment.credits_charged)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        Ok(enrollment_from_row(&row))
    }

    async fn enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM enrollments WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        Ok(row.as_ref().map(enrollment_from_row))
    }

    async fn enrollments(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Enrollment>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM enrollments WHERE tournament_id = $1 ORDER BY id")
                .bind(tournament_id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        Ok(rows.iter().map(enrollment_from_row).collect())
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        let result = with_timeout(
            self.timeout,
            sqlx::query(
                "UPDATE enrollments SET withdrawn_at = $1, refund_amount = $2 WHERE id = $3",
            )
            .bind(enrollment.withdrawn_at.map(|dt| dt.naive_utc()))
            .bind(enrollment.refund_amount)
            .bind(enrollment.id)
            .execute(&mut *self.tx),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "enrollment",
                id: enrollment.id,
            });
        }
        Ok(())
    }

    async fn insert_session(&mut self, session: &NewSession) -> StoreResult<Session> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO sessions
                    (tournament_id, phase, round, bracket_position, group_label,
                     sources, participant_filter, participants)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(session.tournament_id)
            .bind(session.phase.to_string())
            .bind(session.round as i32)
            .bind(session.bracket_position as i32)
            .bind(&session.group_label)
            .bind(Json(&session.sources))
            .bind(&session.participant_filter)
            .bind(session.participants.as_ref().map(Json))
            .fetch_one(&mut *self.tx),
        )
        .await?;
        session_from_row(&row)
    }

    async fn session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn sessions(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Session>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM sessions WHERE tournament_id = $1 ORDER BY id")
                .bind(tournament_id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn update_session(&mut self, session: &Session) -> StoreResult<()> {
        let result = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE sessions
                SET participants = $1, participant_filter = $2, result = $3,
                    finalized = $4, finalized_at = $5
                WHERE id = $6
                "#,
            )
            .bind(session.participants.as_ref().map(Json))
            .bind(&session.participant_filter)
            .bind(session.result.as_ref().map(Json))
            .bind(session.finalized)
            .bind(session.finalized_at.map(|dt| dt.naive_utc()))
            .bind(session.id)
            .execute(&mut *self.tx),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "session",
                id: session.id,
            });
        }
        Ok(())
    }

    async fn account(&mut self, license_id: LicenseId) -> StoreResult<Option<CreditAccount>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM credit_accounts WHERE license_id = $1 FOR UPDATE")
                .bind(license_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn upsert_account(&mut self, license_id: LicenseId, balance: i64) -> StoreResult<CreditAccount> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO credit_accounts (license_id, balance)
                VALUES ($1, $2)
                ON CONFLICT (license_id)
                DO UPDATE SET balance = EXCLUDED.balance, updated_at = NOW()
                RETURNING *
                "#,
            )
            .bind(license_id)
            .bind(balance)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        Ok(account_from_row(&row))
    }

    async fn insert_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> StoreResult<CreditTransaction> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO credit_transactions
                    (license_id, amount, balance_after, kind, enrollment_id, reference, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(transaction.license_id)
            .bind(transaction.amount)
            .bind(transaction.balance_after)
            .bind(transaction.kind.to_string())
            .bind(transaction.enrollment_id)
            .bind(&transaction.reference)
            .bind(&transaction.description)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        transaction_from_row(&row)
    }

    async fn transactions(&mut self, license_id: LicenseId) -> StoreResult<Vec<CreditTransaction>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM credit_transactions WHERE license_id = $1 ORDER BY id")
                .bind(license_id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn insert_xp_entry(&mut self, entry: &NewXpEntry) -> StoreResult<XpEntry> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO xp_entries (license_id, tournament_id, amount)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(entry.license_id)
            .bind(entry.tournament_id)
            .bind(entry.amount)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        Ok(xp_from_row(&row))
    }

    async fn xp_entries(&mut self, license_id: LicenseId) -> StoreResult<Vec<XpEntry>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM xp_entries WHERE license_id = $1 ORDER BY id")
                .bind(license_id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        Ok(rows.iter().map(xp_from_row).collect())
    }

    async fn insert_skill_delta(&mut self, delta: &NewSkillDelta) -> StoreResult<SkillProgressionDelta> {
        let row = with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO skill_progression_deltas (license_id, skill, tournament_id, delta)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(delta.license_id)
            .bind(&delta.skill)
            .bind(delta.tournament_id)
            .bind(delta.delta)
            .fetch_one(&mut *self.tx),
        )
        .await?;
        Ok(skill_delta_from_row(&row))
    }

    async fn skill_deltas(&mut self, license_id: LicenseId) -> StoreResult<Vec<SkillProgressionDelta>> {
        let rows = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM skill_progression_deltas WHERE license_id = $1 ORDER BY id")
                .bind(license_id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        Ok(rows.iter().map(skill_delta_from_row).collect())
    }

    async fn reward_record(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<RewardDistributionRecord>> {
        let row = with_timeout(
            self.timeout,
            sqlx::query("SELECT * FROM reward_distribution_records WHERE tournament_id = $1")
                .bind(tournament_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        match row {
            Some(row) => {
                let summary: Json<RewardSummary> = row.try_get("summary")?;
                Ok(Some(RewardDistributionRecord {
                    tournament_id: row.get("tournament_id"),
                    summary: summary.0,
                    distributed_at: timestamp(&row, "distributed_at"),
                }))
            }
            None => Ok(None),
        }
    }

    async fn insert_reward_record(&mut self, record: &RewardDistributionRecord) -> StoreResult<()> {
        with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO reward_distribution_records (tournament_id, summary, distributed_at)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(record.tournament_id)
            .bind(Json(&record.summary))
            .bind(record.distributed_at.naive_utc())
            .execute(&mut *self.tx),
        )
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        with_timeout(this.timeout, this.tx.commit()).await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        with_timeout(this.timeout, this.tx.rollback()).await
    }
}
