//! Eight-player group stage and knockout, from enrollment to rewards.

use sports_academy::{
    Academy, Distribution, ResultPayload, SessionPhase, TournamentConfig, TournamentError,
    TournamentFormat, TournamentState,
};

const LICENSES: [i64; 8] = [101, 102, 103, 104, 105, 106, 107, 108];

/// Lower license id wins 2-0
fn favourite_wins(participants: &[i64]) -> ResultPayload {
    let (a, b) = (participants[0], participants[1]);
    if a < b {
        ResultPayload::head_to_head((a, 2), (b, 0))
    } else {
        ResultPayload::head_to_head((a, 0), (b, 2))
    }
}

/// Submit every ready session until all are finalized
async fn play_out(academy: &Academy, tid: i64) -> usize {
    let mut submitted = 0;
    loop {
        let sessions = academy.list_sessions(tid).await.unwrap();
        let ready: Vec<_> = sessions
            .iter()
            .filter(|s| !s.finalized)
            .filter_map(|s| s.participants.clone().map(|p| (s.id, p)))
            .collect();
        if ready.is_empty() {
            return submitted;
        }
        for (id, participants) in ready {
            academy
                .submit_result(id, &favourite_wins(&participants))
                .await
                .unwrap();
            submitted += 1;
        }
    }
}

#[tokio::test]
async fn test_eight_player_group_plus_knockout() {
    let academy = Academy::in_memory();
    for license in LICENSES {
        academy.purchase_credits(license, 200, None).await.unwrap();
    }

    let config = TournamentConfig::group_plus_knockout("Academy Cup".to_string(), 8, 100);
    let t = academy.create_tournament(config).await.unwrap();
    academy.open_enrollment(t.id, Some("coach")).await.unwrap();
    for license in LICENSES {
        academy.enroll(t.id, license).await.unwrap();
    }
    academy.start_tournament(t.id, Some("coach")).await.unwrap();

    let sessions = academy
        .generate_sessions(t.id, &LICENSES, TournamentFormat::GroupPlusKnockout)
        .await
        .unwrap();
    let groups = sessions.iter().filter(|s| s.phase == SessionPhase::Group).count();
    let knockout: Vec<_> = sessions
        .iter()
        .filter(|s| s.phase == SessionPhase::Knockout)
        .collect();
    assert_eq!(groups, 12);
    assert_eq!(knockout.len(), 3);
    assert!(knockout.iter().all(|s| s.participants.is_none()));

    // Completing early is refused
    let err = academy.complete_tournament(t.id, None).await.unwrap_err();
    assert!(matches!(err, TournamentError::SessionsNotFinalized { pending: 15 }));

    assert_eq!(play_out(&academy, t.id).await, 15);
    academy.complete_tournament(t.id, Some("coach")).await.unwrap();

    let rows = academy.get_rankings(t.id).await.unwrap();
    let placements: Vec<(i64, u32)> = rows.iter().map(|r| (r.license_id, r.placement)).collect();
    assert_eq!(
        placements,
        vec![
            (101, 1),
            (102, 2),
            (103, 3),
            (104, 3),
            (105, 5),
            (106, 6),
            (107, 7),
            (108, 8),
        ]
    );
    assert_eq!(rows[0].group_label.as_deref(), Some("A"));
    assert_eq!(rows[1].group_label.as_deref(), Some("B"));

    let distribution = academy.distribute_rewards(t.id, Some("admin")).await.unwrap();
    let Distribution::Applied(summary) = distribution else {
        panic!("first distribution must apply");
    };
    assert_eq!(summary.participants.len(), 8);
    assert_eq!(summary.total_credits, 500 + 300 + 200 + 200 + 4 * 50);

    assert_eq!(academy.get_balance(101).await.unwrap(), 100 + 500);
    assert_eq!(academy.get_balance(104).await.unwrap(), 100 + 200);
    assert_eq!(academy.get_balance(108).await.unwrap(), 100 + 50);
    assert_eq!(academy.xp_total(101).await.unwrap(), 300);
    for license in LICENSES {
        assert!(academy.verify_account(license).await.unwrap().is_consistent());
    }

    let t = academy.get_tournament(t.id).await.unwrap();
    assert_eq!(t.state, TournamentState::RewardsDistributed);
    let trail: Vec<TournamentState> = academy
        .audit_trail(t.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.to_state)
        .collect();
    assert_eq!(
        trail,
        vec![
            TournamentState::EnrollmentOpen,
            TournamentState::InProgress,
            TournamentState::Completed,
            TournamentState::RewardsDistributed,
        ]
    );
}

#[tokio::test]
async fn test_knockout_waits_for_whole_group() {
    let academy = Academy::in_memory();
    let t = academy
        .create_tournament(TournamentConfig::group_plus_knockout("Mini Cup".to_string(), 8, 0))
        .await
        .unwrap();
    academy.open_enrollment(t.id, None).await.unwrap();
    for license in LICENSES {
        academy.enroll(t.id, license).await.unwrap();
    }
    academy.start_tournament(t.id, None).await.unwrap();
    let sessions = academy.generate_for_enrolled(t.id).await.unwrap();

    // Finish group A only
    for session in sessions
        .iter()
        .filter(|s| s.group_label.as_deref() == Some("A"))
    {
        let participants = session.participants.clone().unwrap();
        academy
            .submit_result(session.id, &favourite_wins(&participants))
            .await
            .unwrap();
    }

    let knockout: Vec<_> = academy
        .list_sessions(t.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.phase == SessionPhase::Knockout)
        .collect();
    assert!(knockout.iter().all(|s| s.participants.is_none()));

    let err = academy
        .submit_result(
            knockout[0].id,
            &ResultPayload::head_to_head((101, 1), (102, 0)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TournamentError::RosterNotReady(_)));
}
