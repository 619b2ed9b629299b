//! Reward configuration and distribution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::LicenseId;
use crate::skills::SkillCatalog;
use crate::tournament::TournamentId;

/// Allowed distance of the weight sum from 1.0
pub const WEIGHT_EPSILON: f64 = 0.01;

/// Per-tournament reward configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Credits by placement, index 0 is first place
    pub placement_credits: Vec<i64>,
    /// Credits for placements past the table
    pub participation_credits: i64,
    /// XP by placement, index 0 is first place
    pub placement_xp: Vec<i64>,
    /// XP for placements past the table
    pub participation_xp: i64,
    /// Share of the skill delta each skill receives; sums to 1.0
    pub skill_weights: BTreeMap<String, f64>,
    /// Delta granted to the winner before weighting; falls back to the configured default
    pub max_skill_delta: Option<f64>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            placement_credits: vec![500, 300, 200],
            participation_credits: 50,
            placement_xp: vec![300, 200, 100],
            participation_xp: 50,
            skill_weights: BTreeMap::new(),
            max_skill_delta: None,
        }
    }
}

impl RewardConfig {
    /// Validate amounts and skill weights
    pub fn validate(&self, catalog: &SkillCatalog) -> Result<(), String> {
        let amounts = self
            .placement_credits
            .iter()
            .chain(self.placement_xp.iter())
            .chain([&self.participation_credits, &self.participation_xp]);
        for amount in amounts {
            if *amount < 0 {
                return Err(format!("reward amounts must not be negative, got {amount}"));
            }
        }

        if let Some(max) = self.max_skill_delta {
            if !max.is_finite() || max < 0.0 {
                return Err(format!("max_skill_delta must be a non-negative number, got {max}"));
            }
        }

        if self.skill_weights.is_empty() {
            return Ok(());
        }

        for (skill, weight) in &self.skill_weights {
            if !catalog.contains(skill) {
                return Err(format!("unknown skill: {skill}"));
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(format!("weight for {skill} must be positive, got {weight}"));
            }
        }

        let sum: f64 = self.skill_weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(format!("skill weights must sum to 1.0, got {sum:.4}"));
        }

        Ok(())
    }

    /// Credits for a 1-indexed placement
    pub fn credits_for(&self, placement: u32) -> i64 {
        lookup(&self.placement_credits, placement).unwrap_or(self.participation_credits)
    }

    /// XP for a 1-indexed placement
    pub fn xp_for(&self, placement: u32) -> i64 {
        lookup(&self.placement_xp, placement).unwrap_or(self.participation_xp)
    }
}

fn lookup(table: &[i64], placement: u32) -> Option<i64> {
    if placement == 0 {
        return None;
    }
    table.get(placement as usize - 1).copied()
}

/// Rewards granted to one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReward {
    pub license_id: LicenseId,
    pub placement: u32,
    pub credits: i64,
    pub xp: i64,
    pub skill_deltas: BTreeMap<String, f64>,
}

/// Everything one distribution granted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub tournament_id: TournamentId,
    pub participants: Vec<ParticipantReward>,
    pub total_credits: i64,
    pub total_xp: i64,
    pub distributed_at: DateTime<Utc>,
}

impl RewardSummary {
    /// Reward line for a license
    pub fn for_license(&self, license_id: LicenseId) -> Option<&ParticipantReward> {
        self.participants.iter().find(|p| p.license_id == license_id)
    }
}

/// Idempotency gate: one row per tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDistributionRecord {
    pub tournament_id: TournamentId,
    pub summary: RewardSummary,
    pub distributed_at: DateTime<Utc>,
}

/// Outcome of a distribution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "summary", rename_all = "snake_case")]
pub enum Distribution {
    /// This call wrote the rewards
    Applied(RewardSummary),
    /// An earlier call already did; nothing was written
    AlreadyDistributed(RewardSummary),
}

impl Distribution {
    pub fn summary(&self) -> &RewardSummary {
        match self {
            Distribution::Applied(s) | Distribution::AlreadyDistributed(s) => s,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Distribution::Applied(_))
    }
}

/// XP granted by a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpEntry {
    pub id: i64,
    pub license_id: LicenseId,
    pub tournament_id: TournamentId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// XP row before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewXpEntry {
    pub license_id: LicenseId,
    pub tournament_id: TournamentId,
    pub amount: i64,
}
