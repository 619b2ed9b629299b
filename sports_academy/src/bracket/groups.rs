//! Group stage feeding a knockout.

use super::knockout::plan_knockout_into;
use super::league::plan_round_robin;
use super::models::SessionPhase;
use super::plan::{BracketPlan, PlannedSource};
use crate::ledger::LicenseId;
use crate::tournament::GroupStageConfig;

/// Label of the group at `index`: A, B, ..., Z, AA, AB, ...
pub fn group_label(index: usize) -> String {
    let letter = char::from(b'A' + (index % 26) as u8);
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{letter}", group_label(index / 26 - 1))
    }
}

/// Split a seeded roster into groups, snake order
///
/// Seeds run left to right across the groups, then right to left, so every
/// group gets a comparable spread of seeds.
pub fn snake_groups(roster: &[LicenseId], group_size: usize) -> Vec<Vec<LicenseId>> {
    if roster.is_empty() || group_size == 0 {
        return Vec::new();
    }
    let count = roster.len().div_ceil(group_size);
    let mut groups = vec![Vec::with_capacity(group_size); count];
    for (i, license_id) in roster.iter().enumerate() {
        let row = i / count;
        let col = if row % 2 == 0 {
            i % count
        } else {
            count - 1 - i % count
        };
        groups[col].push(*license_id);
    }
    groups
}

/// Group-stage-then-knockout plan
///
/// Groups play isolated round robins. The top `qualifiers_per_group` of each
/// group enter the knockout seeded position-major (A1, B1, ..., A2, B2, ...),
/// so group winners meet runners-up of other groups first.
pub fn plan_groups(
    roster: &[LicenseId],
    config: GroupStageConfig,
    third_place_match: bool,
) -> Result<BracketPlan, String> {
    let groups = snake_groups(roster, config.group_size as usize);
    let qualifiers = config.qualifiers_per_group as usize;

    if let Some(small) = groups.iter().position(|g| g.len() < qualifiers.max(2)) {
        return Err(format!(
            "group {} would have {} participants, fewer than the {} needed",
            group_label(small),
            groups[small].len(),
            qualifiers.max(2)
        ));
    }
    if groups.len() * qualifiers < 2 {
        return Err("the group stage must send at least 2 participants to the knockout".to_string());
    }

    let mut plan = BracketPlan::new();
    for (index, members) in groups.iter().enumerate() {
        let label = group_label(index);
        plan_round_robin(&mut plan, members, SessionPhase::Group, Some(&label));
    }

    let entrants: Vec<_> = (1..=config.qualifiers_per_group)
        .flat_map(|position| {
            (0..groups.len()).map(move |index| PlannedSource::GroupQualifier {
                group: group_label(index),
                position,
            })
        })
        .collect();
    plan_knockout_into(&mut plan, &entrants, third_place_match);

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(group_label(0), "A");
        assert_eq!(group_label(25), "Z");
        assert_eq!(group_label(26), "AA");
        assert_eq!(group_label(27), "AB");
    }

    #[test]
    fn test_snake_seeding() {
        let groups = snake_groups(&[1, 2, 3, 4, 5, 6, 7, 8], 4);
        assert_eq!(groups, vec![vec![1, 4, 5, 8], vec![2, 3, 6, 7]]);
    }

    #[test]
    fn test_uneven_groups() {
        let groups = snake_groups(&[1, 2, 3, 4, 5], 4);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![1, 4, 5]);
        assert_eq!(groups[1], vec![2, 3]);
    }

    #[test]
    fn test_eight_player_plan() {
        let plan = plan_groups(&[1, 2, 3, 4, 5, 6, 7, 8], GroupStageConfig::default(), false).unwrap();
        assert_eq!(plan.phase(SessionPhase::Group).count(), 12);
        assert_eq!(plan.phase(SessionPhase::Knockout).count(), 3);

        let semis: Vec<_> = plan
            .phase(SessionPhase::Knockout)
            .filter(|s| s.round == 1)
            .collect();
        assert_eq!(
            semis[0].sources,
            vec![
                PlannedSource::GroupQualifier {
                    group: "A".to_string(),
                    position: 1
                },
                PlannedSource::GroupQualifier {
                    group: "B".to_string(),
                    position: 2
                },
            ]
        );
        assert!(plan.check_feeders().is_ok());
    }

    #[test]
    fn test_group_too_small_for_qualifiers() {
        let config = GroupStageConfig {
            group_size: 4,
            qualifiers_per_group: 3,
        };
        assert!(plan_groups(&[1, 2, 3, 4, 5], config, false).is_err());
    }

    #[test]
    fn test_single_qualifier_single_group_rejected() {
        let config = GroupStageConfig {
            group_size: 4,
            qualifiers_per_group: 1,
        };
        assert!(plan_groups(&[1, 2, 3], config, false).is_err());
    }
}
