//! In-process store with transactional write sets.
//!
//! A unit of work clones the committed tables at `begin` and applies its own
//! writes to that copy, so it reads its own writes. Each write is also
//! recorded as an [`Op`]. `commit` replays the ops against the latest
//! committed tables under the store mutex, checking unique constraints and
//! tournament versions again, and swaps the result in only if every op
//! applies. Account and tournament reads refresh from the committed tables,
//! mirroring `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use super::{Store, StoreError, StoreResult, UnitOfWork, constraints};
use crate::bracket::{NewSession, Session, SessionId};
use crate::enrollment::{Enrollment, EnrollmentId, NewEnrollment};
use crate::ledger::{CreditAccount, CreditTransaction, LicenseId, NewCreditTransaction};
use crate::rewards::{NewXpEntry, RewardDistributionRecord, XpEntry};
use crate::skills::{NewSkillDelta, SkillProgressionDelta};
use crate::tournament::{
    NewAuditEntry, NewTournament, Tournament, TournamentAuditEntry, TournamentId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    tournaments: BTreeMap<TournamentId, Tournament>,
    audit: BTreeMap<i64, TournamentAuditEntry>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    sessions: BTreeMap<SessionId, Session>,
    accounts: BTreeMap<LicenseId, CreditAccount>,
    transactions: BTreeMap<i64, CreditTransaction>,
    xp: BTreeMap<i64, XpEntry>,
    skill_deltas: BTreeMap<i64, SkillProgressionDelta>,
    rewards: BTreeMap<TournamentId, RewardDistributionRecord>,
}

#[derive(Debug, Clone)]
enum Op {
    InsertTournament(Tournament),
    UpdateTournament { row: Tournament, expected: i64 },
    DeleteTournament(TournamentId),
    InsertAudit(TournamentAuditEntry),
    InsertEnrollment(Enrollment),
    UpdateEnrollment(Enrollment),
    InsertSession(Session),
    UpdateSession(Session),
    UpsertAccount(CreditAccount),
    InsertTransaction(CreditTransaction),
    InsertXp(XpEntry),
    InsertSkillDelta(i64, SkillProgressionDelta),
    InsertRewardRecord(RewardDistributionRecord),
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

impl Tables {
    fn apply(&mut self, op: Op) -> StoreResult<()> {
        match op {
            Op::InsertTournament(row) => {
                self.tournaments.insert(row.id, row);
            }
            Op::UpdateTournament { row, expected } => {
                let current = self.tournaments.get(&row.id).ok_or(StoreError::NotFound {
                    entity: "tournament",
                    id: row.id,
                })?;
                if current.version != expected {
                    return Err(StoreError::VersionConflict {
                        id: row.id,
                        expected,
                        found: current.version,
                    });
                }
                self.tournaments.insert(row.id, row);
            }
            Op::DeleteTournament(id) => {
                self.tournaments.remove(&id);
                self.audit.retain(|_, a| a.tournament_id != id);
                self.sessions.retain(|_, s| s.tournament_id != id);
            }
            Op::InsertAudit(row) => {
                self.audit.insert(row.id, row);
            }
            Op::InsertEnrollment(row) => {
                let duplicate = self.enrollments.values().any(|e| {
                    e.tournament_id == row.tournament_id
                        && e.license_id == row.license_id
                        && e.is_active()
                });
                if duplicate {
                    return Err(unique(constraints::ACTIVE_ENROLLMENT));
                }
                self.enrollments.insert(row.id, row);
            }
            Op::UpdateEnrollment(row) => {
                if !self.enrollments.contains_key(&row.id) {
                    return Err(StoreError::NotFound {
                        entity: "enrollment",
                        id: row.id,
                    });
                }
                self.enrollments.insert(row.id, row);
            }
            Op::InsertSession(row) => {
                self.sessions.insert(row.id, row);
            }
            Op::UpdateSession(row) => {
                if !self.sessions.contains_key(&row.id) {
                    return Err(StoreError::NotFound {
                        entity: "session",
                        id: row.id,
                    });
                }
                self.sessions.insert(row.id, row);
            }
            Op::UpsertAccount(row) => {
                self.accounts.insert(row.license_id, row);
            }
            Op::InsertTransaction(row) => {
                if let Some(reference) = &row.reference {
                    let taken = self
                        .transactions
                        .values()
                        .any(|t| t.reference.as_ref() == Some(reference));
                    if taken {
                        return Err(unique(constraints::TRANSACTION_REFERENCE));
                    }
                }
                self.transactions.insert(row.id, row);
            }
            Op::InsertXp(row) => {
                let taken = self
                    .xp
                    .values()
                    .any(|x| x.license_id == row.license_id && x.tournament_id == row.tournament_id);
                if taken {
                    return Err(unique(constraints::XP_ENTRY));
                }
                self.xp.insert(row.id, row);
            }
            Op::InsertSkillDelta(id, row) => {
                let taken = self.skill_deltas.values().any(|d| {
                    d.license_id == row.license_id
                        && d.skill == row.skill
                        && d.tournament_id == row.tournament_id
                });
                if taken {
                    return Err(unique(constraints::SKILL_DELTA));
                }
                self.skill_deltas.insert(id, row);
            }
            Op::InsertRewardRecord(row) => {
                if self.rewards.contains_key(&row.tournament_id) {
                    return Err(unique(constraints::REWARD_RECORD));
                }
                self.rewards.insert(row.tournament_id, row);
            }
        }
        Ok(())
    }
}

struct Shared {
    tables: Mutex<Tables>,
    next_id: AtomicI64,
}

impl Shared {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn committed(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-memory [`Store`]
///
/// Ids come from one counter shared by every table, so they are unique
/// across the store and increase in insertion order.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                next_id: AtomicI64::new(1),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let snapshot = self.shared.committed().clone();
        Ok(Box::new(MemoryUnitOfWork {
            shared: self.shared.clone(),
            snapshot,
            ops: Vec::new(),
            written_accounts: BTreeSet::new(),
            written_tournaments: BTreeSet::new(),
        }))
    }
}

struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    snapshot: Tables,
    ops: Vec<Op>,
    written_accounts: BTreeSet<LicenseId>,
    written_tournaments: BTreeSet<TournamentId>,
}

impl MemoryUnitOfWork {
    fn record(&mut self, op: Op) -> StoreResult<()> {
        self.snapshot.apply(op.clone())?;
        self.ops.push(op);
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_tournament(&mut self, tournament: &NewTournament) -> StoreResult<Tournament> {
        let now = Utc::now();
        let row = Tournament {
            id: self.shared.next_id(),
            name: tournament.name.clone(),
            format: tournament.format,
            scoring: tournament.scoring,
            state: crate::tournament::TournamentState::Draft,
            max_participants: tournament.max_participants,
            enrollment_cost: tournament.enrollment_cost,
            reward_config: tournament.reward_config.clone(),
            group_stage: tournament.group_stage,
            allow_draws: tournament.allow_draws,
            third_place_match: tournament.third_place_match,
            cancel_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.written_tournaments.insert(row.id);
        self.record(Op::InsertTournament(row.clone()))?;
        Ok(row)
    }

    async fn tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        if !self.written_tournaments.contains(&id) {
            let latest = self.shared.committed().tournaments.get(&id).cloned();
            match latest {
                Some(row) => self.snapshot.tournaments.insert(id, row),
                None => self.snapshot.tournaments.remove(&id),
            };
        }
        Ok(self.snapshot.tournaments.get(&id).cloned())
    }

    async fn update_tournament(&mut self, tournament: &Tournament) -> StoreResult<Tournament> {
        let mut row = tournament.clone();
        row.version = tournament.version + 1;
        row.updated_at = Utc::now();
        self.record(Op::UpdateTournament {
            row: row.clone(),
            expected: tournament.version,
        })?;
        self.written_tournaments.insert(row.id);
        Ok(row)
    }

    async fn delete_tournament(&mut self, id: TournamentId) -> StoreResult<bool> {
        let existed = self.snapshot.tournaments.contains_key(&id);
        if existed {
            self.written_tournaments.insert(id);
            self.record(Op::DeleteTournament(id))?;
        }
        Ok(existed)
    }

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> StoreResult<TournamentAuditEntry> {
        let row = TournamentAuditEntry {
            id: self.shared.next_id(),
            tournament_id: entry.tournament_id,
            from_state: entry.from_state,
            to_state: entry.to_state,
            kind: entry.kind,
            reason: entry.reason.clone(),
            actor: entry.actor.clone(),
            created_at: Utc::now(),
        };
        self.record(Op::InsertAudit(row.clone()))?;
        Ok(row)
    }

    async fn audit_trail(&mut self, id: TournamentId) -> StoreResult<Vec<TournamentAuditEntry>> {
        Ok(self
            .snapshot
            .audit
            .values()
            .filter(|a| a.tournament_id == id)
            .cloned()
            .collect())
    }

    async fn insert_enrollment(&mut self, enrollment: &NewEnrollment) -> StoreResult<Enrollment> {
        let row = Enrollment {
            id: self.shared.next_id(),
            tournament_id: enrollment.tournament_id,
            license_id: enrollment.license_id,
            credits_charged: enrollment.credits_charged,
            enrolled_at: Utc::now(),
            withdrawn_at: None,
            refund_amount: None,
        };
        self.record(Op::InsertEnrollment(row.clone()))?;
        Ok(row)
    }

    async fn enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        Ok(self.snapshot.enrollments.get(&id).cloned())
    }

    async fn enrollments(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .snapshot
            .enrollments
            .values()
            .filter(|e| e.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        self.record(Op::UpdateEnrollment(enrollment.clone()))
    }

    async fn insert_session(&mut self, session: &NewSession) -> StoreResult<Session> {
        let row = Session {
            id: self.shared.next_id(),
            tournament_id: session.tournament_id,
            phase: session.phase,
            round: session.round,
            bracket_position: session.bracket_position,
            group_label: session.group_label.clone(),
            sources: session.sources.clone(),
            participant_filter: session.participant_filter.clone(),
            participants: session.participants.clone(),
            result: None,
            finalized: false,
            finalized_at: None,
            created_at: Utc::now(),
        };
        self.record(Op::InsertSession(row.clone()))?;
        Ok(row)
    }

    async fn session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        Ok(self.snapshot.sessions.get(&id).cloned())
    }

    async fn sessions(&mut self, tournament_id: TournamentId) -> StoreResult<Vec<Session>> {
        Ok(self
            .snapshot
            .sessions
            .values()
            .filter(|s| s.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn update_session(&mut self, session: &Session) -> StoreResult<()> {
        self.record(Op::UpdateSession(session.clone()))
    }

    async fn account(&mut self, license_id: LicenseId) -> StoreResult<Option<CreditAccount>> {
        if !self.written_accounts.contains(&license_id) {
            let latest = self.shared.committed().accounts.get(&license_id).cloned();
            match latest {
                Some(row) => self.snapshot.accounts.insert(license_id, row),
                None => self.snapshot.accounts.remove(&license_id),
            };
        }
        Ok(self.snapshot.accounts.get(&license_id).cloned())
    }

    async fn upsert_account(&mut self, license_id: LicenseId, balance: i64) -> StoreResult<CreditAccount> {
        let row = CreditAccount {
            license_id,
            balance,
            updated_at: Utc::now(),
        };
        self.written_accounts.insert(license_id);
        self.record(Op::UpsertAccount(row.clone()))?;
        Ok(row)
    }

    async fn insert_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> StoreResult<CreditTransaction> {
        let row = CreditTransaction {
            id: self.shared.next_id(),
            license_id: transaction.license_id,
            amount: transaction.amount,
            balance_after: transaction.balance_after,
            kind: transaction.kind,
            enrollment_id: transaction.enrollment_id,
            reference: transaction.reference.clone(),
            description: transaction.description.clone(),
            created_at: Utc::now(),
        };
        self.record(Op::InsertTransaction(row.clone()))?;
        Ok(row)
    }

    async fn transactions(&mut self, license_id: LicenseId) -> StoreResult<Vec<CreditTransaction>> {
        Ok(self
            .snapshot
            .transactions
            .values()
            .filter(|t| t.license_id == license_id)
            .cloned()
            .collect())
    }

    async fn insert_xp_entry(&mut self, entry: &NewXpEntry) -> StoreResult<XpEntry> {
        let row = XpEntry {
            id: self.shared.next_id(),
            license_id: entry.license_id,
            tournament_id: entry.tournament_id,
            amount: entry.amount,
            created_at: Utc::now(),
        };
        self.record(Op::InsertXp(row.clone()))?;
        Ok(row)
    }

    async fn xp_entries(&mut self, license_id: LicenseId) -> StoreResult<Vec<XpEntry>> {
        Ok(self
            .snapshot
            .xp
            .values()
            .filter(|x| x.license_id == license_id)
            .cloned()
            .collect())
    }

    async fn insert_skill_delta(&mut self, delta: &NewSkillDelta) -> StoreResult<SkillProgressionDelta> {
        let row = SkillProgressionDelta {
            license_id: delta.license_id,
            skill: delta.skill.clone(),
            tournament_id: delta.tournament_id,
            delta: delta.delta,
            created_at: Utc::now(),
        };
        let id = self.shared.next_id();
        self.record(Op::InsertSkillDelta(id, row.clone()))?;
        Ok(row)
    }

    async fn skill_deltas(&mut self, license_id: LicenseId) -> StoreResult<Vec<SkillProgressionDelta>> {
        Ok(self
            .snapshot
            .skill_deltas
            .values()
            .filter(|d| d.license_id == license_id)
            .cloned()
            .collect())
    }

    async fn reward_record(
        &mut self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<RewardDistributionRecord>> {
        Ok(self.snapshot.rewards.get(&tournament_id).cloned())
    }

    async fn insert_reward_record(&mut self, record: &RewardDistributionRecord) -> StoreResult<()> {
        self.record(Op::InsertRewardRecord(record.clone()))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        if this.ops.is_empty() {
            return Ok(());
        }
        let mut committed = this.shared.committed();
        let mut next = committed.clone();
        for op in this.ops {
            next.apply(op)?;
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
