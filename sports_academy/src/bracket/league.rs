//! Round-robin scheduling (circle method).

use super::models::SessionPhase;
use super::plan::{BracketPlan, PlannedSession, PlannedSource};
use crate::ledger::LicenseId;

/// Pairings per round
///
/// The first participant stays fixed while the others rotate one slot per
/// round. An odd roster gets an implicit bye slot; whoever meets it sits the
/// round out and no session is produced for it.
pub fn round_robin(roster: &[LicenseId]) -> Vec<Vec<(LicenseId, LicenseId)>> {
    if roster.len() < 2 {
        return Vec::new();
    }

    let mut slots: Vec<Option<LicenseId>> = roster.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();

    let mut rounds = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let pairs = (0..n / 2)
            .filter_map(|i| match (slots[i], slots[n - 1 - i]) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            })
            .collect();
        rounds.push(pairs);
        slots[1..].rotate_right(1);
    }
    rounds
}

/// Append round-robin sessions for `roster` to `plan`
pub fn plan_round_robin(
    plan: &mut BracketPlan,
    roster: &[LicenseId],
    phase: SessionPhase,
    group_label: Option<&str>,
) {
    for (round, pairs) in round_robin(roster).into_iter().enumerate() {
        for (position, (a, b)) in pairs.into_iter().enumerate() {
            plan.push(PlannedSession {
                phase,
                round: round as u32 + 1,
                bracket_position: position as u32 + 1,
                group_label: group_label.map(str::to_string),
                sources: vec![PlannedSource::Fixed(a), PlannedSource::Fixed(b)],
            });
        }
    }
}

/// League plan: every pair meets once
pub fn plan_league(roster: &[LicenseId]) -> BracketPlan {
    let mut plan = BracketPlan::new();
    plan_round_robin(&mut plan, roster, SessionPhase::LeagueRound, None);
    plan
}

/// Individual-ranking plan: one heat with the whole roster
pub fn plan_heat(roster: &[LicenseId]) -> BracketPlan {
    let mut plan = BracketPlan::new();
    plan.push(PlannedSession {
        phase: SessionPhase::Heat,
        round: 1,
        bracket_position: 1,
        group_label: None,
        sources: roster.iter().copied().map(PlannedSource::Fixed).collect(),
    });
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pairs(rounds: &[Vec<(LicenseId, LicenseId)>]) -> BTreeSet<(LicenseId, LicenseId)> {
        rounds
            .iter()
            .flatten()
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect()
    }

    #[test]
    fn test_four_players() {
        let rounds = round_robin(&[1, 2, 3, 4]);
        assert_eq!(rounds.len(), 3);
        assert!(rounds.iter().all(|r| r.len() == 2));
        assert_eq!(rounds[0], vec![(1, 4), (2, 3)]);
        assert_eq!(pairs(&rounds).len(), 6);
    }

    #[test]
    fn test_odd_roster_gets_byes() {
        let rounds = round_robin(&[1, 2, 3, 4, 5]);
        assert_eq!(rounds.len(), 5);
        assert!(rounds.iter().all(|r| r.len() == 2));
        assert_eq!(pairs(&rounds).len(), 10);
    }

    #[test]
    fn test_nobody_plays_twice_in_a_round() {
        for round in round_robin(&[10, 20, 30, 40, 50, 60]) {
            let mut seen = BTreeSet::new();
            for (a, b) in round {
                assert!(seen.insert(a));
                assert!(seen.insert(b));
            }
        }
    }

    #[test]
    fn test_too_small_roster() {
        assert!(round_robin(&[1]).is_empty());
        assert!(plan_league(&[]).is_empty());
    }

    #[test]
    fn test_heat_holds_whole_roster() {
        let plan = plan_heat(&[3, 1, 2]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.sessions()[0].fixed_participants(), vec![3, 1, 2]);
        assert_eq!(plan.sessions()[0].phase, SessionPhase::Heat);
    }
}
