//! Enrollment and withdrawal service.

use super::models::{Enrollment, EnrollmentId, EnrollmentPolicy, NewEnrollment, Withdrawal, WithdrawalCutoff};
use crate::ledger::{CreditLedger, LicenseId, Posting, TransactionKind};
use crate::locks::{LockKey, LockManager};
use crate::store::{Store, StoreError, constraints};
use crate::tournament::manager::load_tournament;
use crate::tournament::{TournamentError, TournamentId, TournamentResult, TournamentState};
use chrono::Utc;
use std::sync::Arc;

/// Enrollment manager
#[derive(Clone)]
pub struct EnrollmentManager {
    store: Arc<dyn Store>,
    locks: LockManager,
    policy: EnrollmentPolicy,
}

impl EnrollmentManager {
    /// Create a new enrollment manager
    pub fn new(store: Arc<dyn Store>, locks: LockManager, policy: EnrollmentPolicy) -> Self {
        Self {
            store,
            locks,
            policy,
        }
    }

    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    /// Enroll a license and charge the entry cost
    ///
    /// The enrollment row and the `Spend` transaction are written in one unit
    /// of work under the tournament and license locks.
    ///
    /// # Errors
    ///
    /// * `TournamentError::EnrollmentNotOpen` - Tournament is not accepting enrollments
    /// * `TournamentError::AlreadyEnrolled` - License already holds an active enrollment
    /// * `TournamentError::TournamentFull` - Capacity reached
    /// * `TournamentError::InsufficientCredits` - Balance below the entry cost
    pub async fn enroll(
        &self,
        tournament_id: TournamentId,
        license_id: LicenseId,
    ) -> TournamentResult<Enrollment> {
        let scope = self
            .locks
            .acquire(
                "enroll",
                [LockKey::Tournament(tournament_id), LockKey::License(license_id)],
            )
            .await?;
        let mut uow = self.store.begin().await?;

        let tournament = load_tournament(uow.as_mut(), tournament_id).await?;
        if !tournament.state.accepts_enrollments() {
            return Err(TournamentError::EnrollmentNotOpen {
                state: tournament.state,
            });
        }

        let active: Vec<_> = uow
            .enrollments(tournament_id)
            .await?
            .into_iter()
            .filter(Enrollment::is_active)
            .collect();
        if active.iter().any(|e| e.license_id == license_id) {
            return Err(TournamentError::AlreadyEnrolled {
                tournament: tournament_id,
                license: license_id,
            });
        }
        if active.len() >= tournament.max_participants as usize {
            return Err(TournamentError::TournamentFull {
                max: tournament.max_participants,
            });
        }

        let cost = tournament.enrollment_cost;
        let available = uow
            .account(license_id)
            .await?
            .map_or(0, |account| account.balance);
        if available < cost {
            return Err(TournamentError::InsufficientCredits {
                license: license_id,
                available,
                required: cost,
            });
        }

        let already_enrolled = |err: StoreError| {
            if err.violates(constraints::ACTIVE_ENROLLMENT) {
                TournamentError::AlreadyEnrolled {
                    tournament: tournament_id,
                    license: license_id,
                }
            } else {
                TournamentError::Store(err)
            }
        };

        let enrollment = uow
            .insert_enrollment(&NewEnrollment {
                tournament_id,
                license_id,
                credits_charged: cost,
            })
            .await
            .map_err(already_enrolled)?;

        if cost > 0 {
            let posting = Posting::new(license_id, cost, TransactionKind::Spend)
                .for_enrollment(enrollment.id)
                .with_reference(format!("enrollment:{}:spend", enrollment.id))
                .describe(format!("Enrollment in {}", tournament.name));
            CreditLedger::debit_in(uow.as_mut(), &scope, &posting).await?;
        }

        uow.commit().await.map_err(already_enrolled)?;
        drop(scope);

        log::info!(
            "license {license_id} enrolled in tournament {tournament_id} (enrollment {}, {cost} credits)",
            enrollment.id
        );
        Ok(enrollment)
    }

    /// Withdraw an active enrollment and refund part of its charge
    ///
    /// # Errors
    ///
    /// * `TournamentError::EnrollmentNotFound` - No such enrollment
    /// * `TournamentError::NoActiveEnrollment` - Already withdrawn
    /// * `TournamentError::WithdrawalWindowClosed` - Past the configured cutoff
    pub async fn withdraw(&self, enrollment_id: EnrollmentId) -> TournamentResult<Withdrawal> {
        // Lock keys depend on the enrollment's owner; read it before locking.
        let probe = {
            let mut uow = self.store.begin().await?;
            let enrollment = uow.enrollment(enrollment_id).await?;
            uow.rollback().await?;
            enrollment.ok_or(TournamentError::EnrollmentNotFound(enrollment_id))?
        };

        let scope = self
            .locks
            .acquire(
                "withdraw",
                [
                    LockKey::Tournament(probe.tournament_id),
                    LockKey::Enrollment(enrollment_id),
                    LockKey::License(probe.license_id),
                ],
            )
            .await?;
        let mut uow = self.store.begin().await?;

        let mut enrollment = uow
            .enrollment(enrollment_id)
            .await?
            .ok_or(TournamentError::EnrollmentNotFound(enrollment_id))?;
        if !enrollment.is_active() {
            return Err(TournamentError::NoActiveEnrollment(enrollment_id));
        }

        let tournament = load_tournament(uow.as_mut(), enrollment.tournament_id).await?;
        let window_open = match tournament.state {
            TournamentState::EnrollmentOpen => true,
            TournamentState::InProgress => {
                self.policy.cutoff == WithdrawalCutoff::SessionGeneration
                    && uow.sessions(tournament.id).await?.is_empty()
            }
            _ => false,
        };
        if !window_open {
            return Err(TournamentError::WithdrawalWindowClosed {
                state: tournament.state,
            });
        }

        let refund = self.policy.refund_for(enrollment.credits_charged);
        let balance_after = if refund > 0 {
            let posting = Posting::new(enrollment.license_id, refund, TransactionKind::Refund)
                .for_enrollment(enrollment.id)
                .with_reference(format!("enrollment:{}:refund", enrollment.id))
                .describe(format!("Withdrawal from {}", tournament.name));
            CreditLedger::credit_in(uow.as_mut(), &scope, &posting)
                .await?
                .balance_after
        } else {
            uow.account(enrollment.license_id)
                .await?
                .map_or(0, |account| account.balance)
        };

        enrollment.withdrawn_at = Some(Utc::now());
        enrollment.refund_amount = Some(refund);
        uow.update_enrollment(&enrollment).await?;
        uow.commit().await?;
        drop(scope);

        log::info!(
            "enrollment {enrollment_id} withdrawn from tournament {}, refunded {refund} of {}",
            enrollment.tournament_id,
            enrollment.credits_charged
        );
        Ok(Withdrawal {
            enrollment,
            refund,
            balance_after,
        })
    }

    /// Every enrollment of a tournament, withdrawn ones included
    pub async fn list_enrollments(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<Enrollment>> {
        let mut uow = self.store.begin().await?;
        load_tournament(uow.as_mut(), tournament_id).await?;
        let enrollments = uow.enrollments(tournament_id).await?;
        uow.rollback().await?;
        Ok(enrollments)
    }

    /// Active licenses in enrollment order, the default seeding
    pub async fn active_roster(&self, tournament_id: TournamentId) -> TournamentResult<Vec<LicenseId>> {
        Ok(self
            .list_enrollments(tournament_id)
            .await?
            .into_iter()
            .filter(Enrollment::is_active)
            .map(|e| e.license_id)
            .collect())
    }
}
