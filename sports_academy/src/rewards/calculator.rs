//! Reward amounts from final standings.

use std::collections::BTreeMap;

use super::models::{ParticipantReward, RewardConfig};
use crate::results::StandingRow;
use crate::skills::round2;

/// Skill delta for a placement, rounded to two decimals
///
/// The winner receives `max_delta * weight`, last place `max_delta * weight / total`.
pub fn skill_delta(max_delta: f64, placement: u32, total: usize, weight: f64) -> f64 {
    if total == 0 || placement == 0 {
        return 0.0;
    }
    let total = total as f64;
    let placement = f64::from(placement).min(total);
    round2(max_delta * (total - placement + 1.0) / total * weight)
}

/// Credits, XP and skill deltas for every ranked participant
pub fn compute_rewards(
    config: &RewardConfig,
    standings: &[StandingRow],
    default_max_delta: f64,
) -> Vec<ParticipantReward> {
    let total = standings.len();
    let max_delta = config.max_skill_delta.unwrap_or(default_max_delta);

    standings
        .iter()
        .map(|row| {
            let skill_deltas: BTreeMap<String, f64> = config
                .skill_weights
                .iter()
                .map(|(skill, weight)| {
                    (skill.clone(), skill_delta(max_delta, row.placement, total, *weight))
                })
                .collect();
            ParticipantReward {
                license_id: row.license_id,
                placement: row.placement,
                credits: config.credits_for(row.placement),
                xp: config.xp_for(row.placement),
                skill_deltas,
            }
        })
        .collect()
}
