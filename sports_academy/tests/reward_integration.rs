//! Reward distribution: payouts, skill progression and idempotency.

use sports_academy::rewards::RewardConfig;
use sports_academy::{
    Academy, Distribution, ErrorKind, ResultPayload, TournamentConfig, TournamentError,
    TournamentState, TransactionKind,
};

/// Four-player knockout with a third-place match, lower license id always wins
async fn completed_knockout(academy: &Academy) -> i64 {
    let mut rewards = RewardConfig::default();
    rewards.skill_weights.insert("passing".to_string(), 0.5);
    rewards.skill_weights.insert("shooting".to_string(), 0.5);
    let mut config = TournamentConfig::knockout("Bronze Cup".to_string(), 4, 0).with_rewards(rewards);
    config.third_place_match = true;

    let t = academy.create_tournament(config).await.unwrap();
    academy.open_enrollment(t.id, None).await.unwrap();
    for license in [1, 2, 3, 4] {
        academy.enroll(t.id, license).await.unwrap();
    }
    academy.start_tournament(t.id, None).await.unwrap();
    let generated = academy.generate_for_enrolled(t.id).await.unwrap();
    assert_eq!(generated.len(), 4);

    loop {
        let ready: Vec<_> = academy
            .list_sessions(t.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|s| !s.finalized)
            .filter_map(|s| s.participants.map(|p| (s.id, p)))
            .collect();
        if ready.is_empty() {
            break;
        }
        for (id, p) in ready {
            let (winner, loser) = (p[0].min(p[1]), p[0].max(p[1]));
            academy
                .submit_result(id, &ResultPayload::head_to_head((winner, 3), (loser, 1)))
                .await
                .unwrap();
        }
    }
    academy.complete_tournament(t.id, None).await.unwrap();
    t.id
}

#[tokio::test]
async fn test_third_place_match_decides_bronze() {
    let academy = Academy::in_memory();
    let tid = completed_knockout(&academy).await;

    let placements: Vec<(i64, u32)> = academy
        .get_rankings(tid)
        .await
        .unwrap()
        .iter()
        .map(|r| (r.license_id, r.placement))
        .collect();
    assert_eq!(placements, vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
}

#[tokio::test]
async fn test_payouts_and_skill_progression() {
    let academy = Academy::in_memory();
    let tid = completed_knockout(&academy).await;

    let summary = match academy.distribute_rewards(tid, Some("admin")).await.unwrap() {
        Distribution::Applied(summary) => summary,
        Distribution::AlreadyDistributed(_) => panic!("nothing was distributed before"),
    };
    assert_eq!(summary.total_credits, 500 + 300 + 200 + 50);
    assert_eq!(summary.total_xp, 300 + 200 + 100 + 50);

    let history = academy.get_transaction_history(1).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::Reward);
    assert_eq!(history[0].reference.as_deref(), Some(format!("reward:{tid}:1").as_str()));

    let winner = academy.skill_profile(1).await.unwrap();
    assert_eq!(winner.level("passing"), 2.5);
    assert_eq!(winner.level("shooting"), 2.5);
    assert_eq!(winner.tournaments, 1);
    let runner_up = academy.skill_profile(2).await.unwrap();
    assert_eq!(runner_up.level("passing"), 1.88);

    let stored = academy.get_distribution(tid).await.unwrap();
    assert_eq!(stored, Some(summary));
}

#[tokio::test]
async fn test_second_distribution_is_a_no_op() {
    let academy = Academy::in_memory();
    let tid = completed_knockout(&academy).await;

    let first = academy.distribute_rewards(tid, None).await.unwrap();
    let second = academy.distribute_rewards(tid, None).await.unwrap();
    assert!(first.was_applied());
    assert!(!second.was_applied());
    assert_eq!(first.summary(), second.summary());

    assert_eq!(academy.get_balance(1).await.unwrap(), 500);
    assert_eq!(academy.get_transaction_history(1).await.unwrap().len(), 1);
    assert_eq!(academy.xp_total(1).await.unwrap(), 300);
    assert_eq!(academy.skill_profile(1).await.unwrap().level("passing"), 2.5);
}

#[tokio::test]
async fn test_reset_keeps_distribution() {
    let academy = Academy::in_memory();
    let tid = completed_knockout(&academy).await;
    academy.distribute_rewards(tid, None).await.unwrap();

    let err = academy
        .reset_tournament(tid, TournamentState::InProgress, "", Some("admin"))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::ReasonRequired));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let reset = academy
        .reset_tournament(tid, TournamentState::InProgress, "wrong score in final", Some("admin"))
        .await
        .unwrap();
    assert_eq!(reset.state, TournamentState::InProgress);
    assert!(academy.get_distribution(tid).await.unwrap().is_some());

    academy.complete_tournament(tid, None).await.unwrap();
    assert!(!academy.distribute_rewards(tid, None).await.unwrap().was_applied());
    assert_eq!(academy.get_balance(2).await.unwrap(), 300);
    assert_eq!(
        academy.get_tournament(tid).await.unwrap().state,
        TournamentState::RewardsDistributed
    );
    assert!(!academy.distribute_rewards(tid, None).await.unwrap().was_applied());
}

#[tokio::test]
async fn test_distribution_requires_completion() {
    let academy = Academy::in_memory();
    let t = academy
        .create_tournament(TournamentConfig::league("Early".to_string(), 4, 0))
        .await
        .unwrap();
    let err = academy.distribute_rewards(t.id, None).await.unwrap_err();
    assert!(matches!(err, TournamentError::NotCompleted { .. }));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[tokio::test]
async fn test_unknown_skill_weight_is_rejected_at_creation() {
    let academy = Academy::in_memory();
    let mut rewards = RewardConfig::default();
    rewards.skill_weights.insert("juggling".to_string(), 1.0);
    let err = academy
        .create_tournament(TournamentConfig::league("Odd".to_string(), 4, 0).with_rewards(rewards))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::InvalidConfig(_)));
}
