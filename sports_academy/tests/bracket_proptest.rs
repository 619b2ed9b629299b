//! Property-based tests for session generation.
//!
//! Uses proptest to check that generated brackets are complete for any
//! roster size: every league pair meets exactly once and every knockout
//! converges on a single final.

use proptest::prelude::*;
use sports_academy::bracket::groups::{plan_groups, snake_groups};
use sports_academy::bracket::knockout::plan_knockout;
use sports_academy::bracket::league::{plan_league, round_robin};
use sports_academy::bracket::{PlannedSource, SessionPhase};
use sports_academy::tournament::GroupStageConfig;
use std::collections::{BTreeMap, BTreeSet};

fn roster(n: usize) -> Vec<i64> {
    (1..=n as i64).collect()
}

proptest! {
    #[test]
    fn test_round_robin_every_pair_once(n in 2usize..=20) {
        let roster = roster(n);
        let plan = plan_league(&roster);
        prop_assert_eq!(plan.len(), n * (n - 1) / 2);

        let mut pairs = BTreeSet::new();
        for session in plan.sessions() {
            let p = session.fixed_participants();
            prop_assert_eq!(p.len(), 2);
            prop_assert_ne!(p[0], p[1]);
            prop_assert!(pairs.insert((p[0].min(p[1]), p[0].max(p[1]))));
        }
    }

    #[test]
    fn test_round_robin_rounds_are_disjoint(n in 2usize..=20) {
        let rounds = round_robin(&roster(n));
        let expected = if n % 2 == 0 { n - 1 } else { n };
        prop_assert_eq!(rounds.len(), expected);

        for round in &rounds {
            let mut seen = BTreeSet::new();
            for (a, b) in round {
                prop_assert!(seen.insert(*a));
                prop_assert!(seen.insert(*b));
            }
        }
    }

    #[test]
    fn test_knockout_has_one_session_per_elimination(n in 2usize..=64) {
        let plan = plan_knockout(&roster(n), false);
        prop_assert_eq!(plan.len(), n - 1);
        prop_assert!(plan.check_feeders().is_ok());

        // Every session except the final feeds exactly one later session
        let mut fed: BTreeMap<usize, usize> = BTreeMap::new();
        for session in plan.sessions() {
            for source in &session.sources {
                if let PlannedSource::WinnerOf(index) = source {
                    *fed.entry(*index).or_default() += 1;
                }
            }
        }
        prop_assert_eq!(fed.len(), n - 2);
        prop_assert!(fed.values().all(|count| *count == 1));
        prop_assert!(!fed.contains_key(&(plan.len() - 1)));
    }

    #[test]
    fn test_knockout_places_every_entrant_once(n in 2usize..=64) {
        let plan = plan_knockout(&roster(n), false);
        let mut fixed = Vec::new();
        for session in plan.sessions() {
            fixed.extend(session.fixed_participants());
        }
        fixed.sort_unstable();
        prop_assert_eq!(fixed, roster(n));
    }

    #[test]
    fn test_snake_groups_partition(n in 4usize..=32, size in 2usize..=6) {
        let groups = snake_groups(&roster(n), size);
        let mut all: Vec<i64> = groups.iter().flatten().copied().collect();
        all.sort_unstable();
        prop_assert_eq!(all, roster(n));

        let largest = groups.iter().map(Vec::len).max().unwrap_or(0);
        let smallest = groups.iter().map(Vec::len).min().unwrap_or(0);
        prop_assert!(largest - smallest <= 1);
    }
}

#[test]
fn test_group_plus_knockout_shape() {
    let plan = plan_groups(&roster(8), GroupStageConfig::default(), false).unwrap();
    assert_eq!(plan.phase(SessionPhase::Group).count(), 12);
    assert_eq!(plan.phase(SessionPhase::Knockout).count(), 3);

    let labels: BTreeSet<_> = plan
        .phase(SessionPhase::Group)
        .filter_map(|s| s.group_label.clone())
        .collect();
    assert_eq!(labels.len(), 2);
}

#[test]
fn test_group_stage_needs_two_qualifiers() {
    let config = GroupStageConfig {
        group_size: 4,
        qualifiers_per_group: 1,
    };
    assert!(plan_groups(&roster(4), config, false).is_err());
}
