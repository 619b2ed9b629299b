//! Individual-ranking tournaments and leaderboard tiers.

use proptest::prelude::*;
use sports_academy::results::{LeaderboardTier, Measurement, competition_ranks};
use sports_academy::tournament::{
    RankingDirection, RankingKind, RoundAggregation, ScoringMode,
};
use sports_academy::{Academy, ResultPayload, TournamentConfig, TournamentError, TournamentState};

async fn started_heat(academy: &Academy, config: TournamentConfig, licenses: &[i64]) -> (i64, i64) {
    let t = academy.create_tournament(config).await.unwrap();
    academy.open_enrollment(t.id, None).await.unwrap();
    for license in licenses {
        academy.enroll(t.id, *license).await.unwrap();
    }
    academy.start_tournament(t.id, None).await.unwrap();
    let sessions = academy.generate_for_enrolled(t.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    (t.id, sessions[0].id)
}

#[test]
fn test_sprint_times_share_first_place() {
    let ranks = competition_ranks(&[12.1, 11.8, 11.8, 13.0], RankingDirection::Ascending);
    assert_eq!(ranks, vec![3, 1, 1, 4]);
}

#[tokio::test]
async fn test_time_based_heat() {
    let academy = Academy::in_memory();
    let config = TournamentConfig::individual("100m".to_string(), RankingKind::TimeBased, 8, 0);
    let (tid, heat) = started_heat(&academy, config, &[1, 2, 3, 4]).await;

    academy
        .submit_result(
            heat,
            &ResultPayload::measured(&[(1, 12.1), (2, 11.8), (3, 11.8), (4, 13.0)]),
        )
        .await
        .unwrap();

    let rows = academy.get_rankings(tid).await.unwrap();
    let placements: Vec<(i64, u32)> = rows.iter().map(|r| (r.license_id, r.placement)).collect();
    assert_eq!(placements, vec![(2, 1), (3, 1), (1, 3), (4, 4)]);
    assert_eq!(rows[0].measured_value, Some(11.8));
    assert_eq!(rows[0].percentile, 25.0);
    assert_eq!(rows[0].tier, LeaderboardTier::Top25);
    assert_eq!(rows[3].tier, LeaderboardTier::Standard);

    academy.complete_tournament(tid, None).await.unwrap();
    assert_eq!(
        academy.get_tournament(tid).await.unwrap().state,
        TournamentState::Completed
    );
}

#[tokio::test]
async fn test_rounds_aggregation_is_configurable() {
    let values = [(1, vec![9.0, 1.0, 1.0]), (2, vec![4.0, 4.0, 4.0])];
    let payload = ResultPayload::Individual {
        measurements: values
            .iter()
            .map(|(license_id, values)| Measurement {
                license_id: *license_id,
                values: values.clone(),
            })
            .collect(),
    };

    let mut winners = Vec::new();
    for aggregation in [RoundAggregation::Sum, RoundAggregation::Best] {
        let academy = Academy::in_memory();
        let config = TournamentConfig::individual("Keepy-uppy".to_string(), RankingKind::RoundsBased, 4, 0)
            .with_scoring(ScoringMode::rounds(3, aggregation));
        let (tid, heat) = started_heat(&academy, config, &[1, 2]).await;
        academy.submit_result(heat, &payload).await.unwrap();
        let rows = academy.get_rankings(tid).await.unwrap();
        winners.push(rows[0].license_id);
    }
    // Sum: 11 vs 12. Best: 9 vs 4.
    assert_eq!(winners, vec![2, 1]);
}

#[tokio::test]
async fn test_heat_rejects_incomplete_measurements() {
    let academy = Academy::in_memory();
    let config = TournamentConfig::individual("Long jump".to_string(), RankingKind::DistanceBased, 4, 0);
    let (_, heat) = started_heat(&academy, config, &[1, 2, 3]).await;

    let err = academy
        .submit_result(heat, &ResultPayload::measured(&[(1, 5.2), (2, 4.9)]))
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::InvalidPayload(_)));

    let session = academy.get_session(heat).await.unwrap();
    assert!(!session.finalized);
}

proptest! {
    #[test]
    fn test_competition_ranks_properties(values in prop::collection::vec(0u32..20, 1..30)) {
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        let ranks = competition_ranks(&values, RankingDirection::Descending);
        prop_assert_eq!(ranks.len(), values.len());

        for (i, rank) in ranks.iter().enumerate() {
            // Rank is one more than the number of strictly better values
            let better = values.iter().filter(|v| **v > values[i]).count() as u32;
            prop_assert_eq!(*rank, better + 1);
        }
    }
}
