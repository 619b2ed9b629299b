//! Credit ledger implementation.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{AccountVerification, CreditTransaction, LicenseId, NewCreditTransaction, Posting, TransactionKind},
};
use crate::locks::{LockKey, LockManager, LockScope};
use crate::store::{Store, StoreError, UnitOfWork, constraints};
use std::sync::Arc;

/// Credit ledger
///
/// Every balance change writes the account row and one immutable
/// transaction row in the same unit of work, under the license lock.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn Store>,
    locks: LockManager,
}

impl CreditLedger {
    /// Create a new ledger
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional store
    /// * `locks` - Lock manager shared with the other services
    pub fn new(store: Arc<dyn Store>, locks: LockManager) -> Self {
        Self { store, locks }
    }

    /// Remove credits in a unit of work of its own
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::InsufficientCredits` - Balance would go negative
    /// * `LedgerError::AlreadyApplied` - The reference was already posted
    pub async fn debit(&self, posting: Posting) -> LedgerResult<CreditTransaction> {
        self.post_standalone("ledger_debit", posting, true).await
    }

    /// Add credits in a unit of work of its own
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is not positive
    /// * `LedgerError::BalanceOverflow` - Balance would overflow
    /// * `LedgerError::AlreadyApplied` - The reference was already posted
    pub async fn credit(&self, posting: Posting) -> LedgerResult<CreditTransaction> {
        self.post_standalone("ledger_credit", posting, false).await
    }

    /// Post in the direction implied by the posting's kind
    pub async fn post(&self, posting: Posting) -> LedgerResult<CreditTransaction> {
        if posting.kind.is_debit() {
            self.debit(posting).await
        } else {
            self.credit(posting).await
        }
    }

    /// Buy credits
    ///
    /// # Arguments
    ///
    /// * `license_id` - License receiving the credits
    /// * `amount` - Credits bought
    /// * `reference` - Optional payment reference; replays fail with `AlreadyApplied`
    pub async fn purchase(
        &self,
        license_id: LicenseId,
        amount: i64,
        reference: Option<String>,
    ) -> LedgerResult<CreditTransaction> {
        let mut posting = Posting::new(license_id, amount, TransactionKind::Purchase)
            .describe("Credit purchase");
        posting.reference = reference;
        self.credit(posting).await
    }

    /// Remove credits inside the caller's unit of work
    ///
    /// The caller's scope must hold the license lock.
    pub async fn debit_in(
        uow: &mut dyn UnitOfWork,
        scope: &LockScope,
        posting: &Posting,
    ) -> LedgerResult<CreditTransaction> {
        post_in(uow, scope, posting, true).await
    }

    /// Add credits inside the caller's unit of work
    ///
    /// The caller's scope must hold the license lock.
    pub async fn credit_in(
        uow: &mut dyn UnitOfWork,
        scope: &LockScope,
        posting: &Posting,
    ) -> LedgerResult<CreditTransaction> {
        post_in(uow, scope, posting, false).await
    }

    /// Current balance, zero for a license that never transacted
    pub async fn get_balance(&self, license_id: LicenseId) -> LedgerResult<i64> {
        let mut uow = self.store.begin().await?;
        let balance = uow
            .account(license_id)
            .await?
            .map_or(0, |account| account.balance);
        uow.rollback().await?;
        Ok(balance)
    }

    /// Every transaction of a license, oldest first
    pub async fn get_transaction_history(
        &self,
        license_id: LicenseId,
    ) -> LedgerResult<Vec<CreditTransaction>> {
        let mut uow = self.store.begin().await?;
        let transactions = uow.transactions(license_id).await?;
        uow.rollback().await?;
        Ok(transactions)
    }

    /// Compare the stored balance with the sum of the transactions
    pub async fn verify_account(&self, license_id: LicenseId) -> LedgerResult<AccountVerification> {
        let _scope = self
            .locks
            .acquire("ledger_verify", [LockKey::License(license_id)])
            .await?;
        let mut uow = self.store.begin().await?;
        let stored_balance = uow
            .account(license_id)
            .await?
            .map_or(0, |account| account.balance);
        let transactions = uow.transactions(license_id).await?;
        uow.rollback().await?;

        let verification = AccountVerification {
            license_id,
            stored_balance,
            transaction_sum: transactions.iter().map(|t| t.amount).sum(),
            transaction_count: transactions.len(),
        };
        if !verification.is_consistent() {
            log::error!(
                "ledger mismatch for license {license_id}: balance {} vs transaction sum {}",
                verification.stored_balance,
                verification.transaction_sum
            );
        }
        Ok(verification)
    }

    async fn post_standalone(
        &self,
        operation: &'static str,
        posting: Posting,
        debit: bool,
    ) -> LedgerResult<CreditTransaction> {
        if posting.amount <= 0 {
            return Err(LedgerError::InvalidAmount(posting.amount));
        }

        let scope = self
            .locks
            .acquire(operation, [LockKey::License(posting.license_id)])
            .await?;
        let mut uow = self.store.begin().await?;
        let transaction = post_in(uow.as_mut(), &scope, &posting, debit).await?;
        uow.commit()
            .await
            .map_err(|err| reference_conflict(err, &posting.reference))?;
        drop(scope);

        log::info!(
            "{} {} credits for license {} ({}), balance {}",
            if debit { "debited" } else { "credited" },
            posting.amount,
            posting.license_id,
            posting.kind,
            transaction.balance_after
        );
        Ok(transaction)
    }
}

async fn post_in(
    uow: &mut dyn UnitOfWork,
    scope: &LockScope,
    posting: &Posting,
    debit: bool,
) -> LedgerResult<CreditTransaction> {
    if posting.amount <= 0 {
        return Err(LedgerError::InvalidAmount(posting.amount));
    }
    let license_id = posting.license_id;
    if !scope.holds(&LockKey::License(license_id)) {
        return Err(LedgerError::LockNotHeld(license_id));
    }

    let available = uow
        .account(license_id)
        .await?
        .map_or(0, |account| account.balance);

    let signed = if debit { -posting.amount } else { posting.amount };
    let balance_after = available
        .checked_add(signed)
        .ok_or(LedgerError::BalanceOverflow(license_id))?;
    if balance_after < 0 {
        return Err(LedgerError::InsufficientCredits {
            license_id,
            available,
            required: posting.amount,
        });
    }

    // Account row first: transactions reference it.
    uow.upsert_account(license_id, balance_after).await?;
    let row = NewCreditTransaction {
        license_id,
        amount: signed,
        balance_after,
        kind: posting.kind,
        enrollment_id: posting.enrollment_id,
        reference: posting.reference.clone(),
        description: posting.description.clone(),
    };
    uow.insert_transaction(&row)
        .await
        .map_err(|err| reference_conflict(err, &posting.reference))
}

/// Translate a reference unique violation into `AlreadyApplied`
fn reference_conflict(err: StoreError, reference: &Option<String>) -> LedgerError {
    match reference {
        Some(reference) if err.violates(constraints::TRANSACTION_REFERENCE) => {
            LedgerError::AlreadyApplied {
                reference: reference.clone(),
            }
        }
        _ => LedgerError::Store(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::LockConfig;
    use crate::store::MemoryStore;
    use crate::telemetry::LogTelemetry;

    fn ledger() -> CreditLedger {
        let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
        CreditLedger::new(Arc::new(MemoryStore::new()), locks)
    }

    #[tokio::test]
    async fn test_purchase_then_spend() {
        let ledger = ledger();
        ledger.purchase(1, 300, None).await.unwrap();
        let spend = ledger
            .debit(Posting::new(1, 120, TransactionKind::Spend))
            .await
            .unwrap();
        assert_eq!(spend.amount, -120);
        assert_eq!(spend.balance_after, 180);
        assert_eq!(ledger.get_balance(1).await.unwrap(), 180);
    }

    #[tokio::test]
    async fn test_insufficient_credits_writes_nothing() {
        let ledger = ledger();
        ledger.purchase(1, 50, None).await.unwrap();
        let err = ledger
            .debit(Posting::new(1, 80, TransactionKind::Spend))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                available: 50,
                required: 80,
                ..
            }
        ));
        assert_eq!(ledger.get_balance(1).await.unwrap(), 50);
        assert_eq!(ledger.get_transaction_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_account_reads_zero() {
        let ledger = ledger();
        assert_eq!(ledger.get_balance(99).await.unwrap(), 0);
        let err = ledger
            .debit(Posting::new(99, 1, TransactionKind::Spend))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredits { available: 0, .. }));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let ledger = ledger();
        for amount in [0, -5] {
            let err = ledger.purchase(1, amount, None).await.unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(a) if a == amount));
        }
    }

    #[tokio::test]
    async fn test_reference_applies_once() {
        let ledger = ledger();
        ledger
            .purchase(1, 100, Some("order-17".to_string()))
            .await
            .unwrap();
        let err = ledger
            .purchase(1, 100, Some("order-17".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyApplied { ref reference } if reference == "order-17"));
        assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_in_unit_requires_license_lock() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockManager::new(LockConfig::default(), Arc::new(LogTelemetry));
        let scope = locks.acquire("test", [LockKey::License(1)]).await.unwrap();
        let mut uow = store.begin().await.unwrap();

        let err = CreditLedger::credit_in(
            uow.as_mut(),
            &scope,
            &Posting::new(2, 10, TransactionKind::Reward),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::LockNotHeld(2)));

        let ok = CreditLedger::credit_in(
            uow.as_mut(),
            &scope,
            &Posting::new(1, 10, TransactionKind::Reward),
        )
        .await
        .unwrap();
        assert_eq!(ok.balance_after, 10);
    }

    #[tokio::test]
    async fn test_verify_account_consistent() {
        let ledger = ledger();
        ledger.purchase(4, 500, None).await.unwrap();
        ledger
            .post(Posting::new(4, 200, TransactionKind::Spend))
            .await
            .unwrap();
        ledger
            .post(Posting::new(4, 100, TransactionKind::Refund))
            .await
            .unwrap();
        let verification = ledger.verify_account(4).await.unwrap();
        assert!(verification.is_consistent());
        assert_eq!(verification.stored_balance, 400);
        assert_eq!(verification.transaction_count, 3);
    }
}
