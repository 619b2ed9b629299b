//! Enrollment, withdrawal and cancellation through the public facade.
//!
//! Every credit movement is checked against the ledger history so that the
//! stored balance always equals the sum of the license's transactions.

use sports_academy::{
    Academy, ErrorKind, TournamentConfig, TournamentError, TournamentState, TransactionKind,
};

async fn open_league(academy: &Academy, cost: i64) -> i64 {
    let t = academy
        .create_tournament(TournamentConfig::league("Autumn League".to_string(), 8, cost))
        .await
        .unwrap();
    academy.open_enrollment(t.id, Some("coach")).await.unwrap();
    t.id
}

#[tokio::test]
async fn test_refund_example() {
    let academy = Academy::in_memory();
    academy.purchase_credits(7, 500, None).await.unwrap();
    let tid = open_league(&academy, 250).await;

    let enrollment = academy.enroll(tid, 7).await.unwrap();
    assert_eq!(enrollment.credits_charged, 250);
    assert_eq!(academy.get_balance(7).await.unwrap(), 250);

    let withdrawal = academy.withdraw(enrollment.id).await.unwrap();
    assert_eq!(withdrawal.refund, 125);
    assert_eq!(withdrawal.balance_after, 375);
    assert_eq!(withdrawal.enrollment.refund_amount, Some(125));
    assert_eq!(academy.get_balance(7).await.unwrap(), 375);

    let kinds: Vec<TransactionKind> = academy
        .get_transaction_history(7)
        .await
        .unwrap()
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Purchase,
            TransactionKind::Spend,
            TransactionKind::Refund
        ]
    );
    assert!(academy.verify_account(7).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_withdraw_is_idempotent() {
    let academy = Academy::in_memory();
    academy.purchase_credits(7, 500, None).await.unwrap();
    let tid = open_league(&academy, 250).await;
    let enrollment = academy.enroll(tid, 7).await.unwrap();

    academy.withdraw(enrollment.id).await.unwrap();
    let err = academy.withdraw(enrollment.id).await.unwrap_err();
    assert!(matches!(err, TournamentError::NoActiveEnrollment(id) if id == enrollment.id));
    assert_eq!(err.kind(), ErrorKind::Idempotency);

    // No second refund
    assert_eq!(academy.get_balance(7).await.unwrap(), 375);
    assert_eq!(academy.get_transaction_history(7).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_single_active_enrollment() {
    let academy = Academy::in_memory();
    academy.purchase_credits(3, 1000, None).await.unwrap();
    let tid = open_league(&academy, 100).await;

    let first = academy.enroll(tid, 3).await.unwrap();
    let err = academy.enroll(tid, 3).await.unwrap_err();
    assert!(matches!(err, TournamentError::AlreadyEnrolled { .. }));
    assert_eq!(academy.get_balance(3).await.unwrap(), 900);

    // Withdrawal frees the slot
    academy.withdraw(first.id).await.unwrap();
    academy.enroll(tid, 3).await.unwrap();
    let enrollments = academy.list_enrollments(tid).await.unwrap();
    assert_eq!(enrollments.len(), 2);
    assert_eq!(enrollments.iter().filter(|e| e.is_active()).count(), 1);
}

#[tokio::test]
async fn test_insufficient_credits_is_retriable() {
    let academy = Academy::in_memory();
    academy.purchase_credits(9, 40, None).await.unwrap();
    let tid = open_league(&academy, 100).await;

    let err = academy.enroll(tid, 9).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::InsufficientCredits {
            available: 40,
            required: 100,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(academy.list_enrollments(tid).await.unwrap().is_empty());

    academy.purchase_credits(9, 60, None).await.unwrap();
    academy.enroll(tid, 9).await.unwrap();
    assert_eq!(academy.get_balance(9).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_refunds_in_full() {
    let academy = Academy::in_memory();
    for license in [1, 2, 3] {
        academy.purchase_credits(license, 300, None).await.unwrap();
    }
    let tid = open_league(&academy, 120).await;
    let mut ids = Vec::new();
    for license in [1, 2, 3] {
        ids.push(academy.enroll(tid, license).await.unwrap().id);
    }
    // One withdrew already and keeps only the partial refund
    academy.withdraw(ids[2]).await.unwrap();

    let cancelled = academy
        .cancel_tournament(tid, "pitch flooded", Some("admin"))
        .await
        .unwrap();
    assert_eq!(cancelled.state, TournamentState::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("pitch flooded"));

    assert_eq!(academy.get_balance(1).await.unwrap(), 300);
    assert_eq!(academy.get_balance(2).await.unwrap(), 300);
    assert_eq!(academy.get_balance(3).await.unwrap(), 240);
    for license in [1, 2, 3] {
        assert!(academy.verify_account(license).await.unwrap().is_consistent());
    }
    assert!(
        academy
            .list_enrollments(tid)
            .await
            .unwrap()
            .iter()
            .all(|e| !e.is_active())
    );
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let academy = Academy::in_memory();
    let tid = open_league(&academy, 0).await;
    let err = academy.cancel_tournament(tid, "   ", None).await.unwrap_err();
    assert!(matches!(err, TournamentError::ReasonRequired));
    assert_eq!(
        academy.get_tournament(tid).await.unwrap().state,
        TournamentState::EnrollmentOpen
    );
}

#[tokio::test]
async fn test_withdrawal_closes_with_sessions() {
    let academy = Academy::in_memory();
    let tid = open_league(&academy, 0).await;
    let mut ids = Vec::new();
    for license in [1, 2, 3] {
        ids.push(academy.enroll(tid, license).await.unwrap().id);
    }
    academy.start_tournament(tid, None).await.unwrap();
    academy.generate_for_enrolled(tid).await.unwrap();

    let err = academy.withdraw(ids[0]).await.unwrap_err();
    assert!(matches!(
        err,
        TournamentError::WithdrawalWindowClosed {
            state: TournamentState::InProgress
        }
    ));
}
