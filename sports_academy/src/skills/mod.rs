//! Skill progression store.
//!
//! Deltas are keyed by (license, skill, tournament) and written only by the
//! reward pipeline, inside its unit of work. Everything else reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::ledger::LicenseId;
use crate::store::{Store, StoreResult, UnitOfWork};
use crate::tournament::TournamentId;

/// Skills known to the academy when no catalog is configured
pub const DEFAULT_SKILLS: &[&str] = &[
    "agility",
    "ball_control",
    "defending",
    "dribbling",
    "passing",
    "shooting",
    "speed",
    "stamina",
    "tactical_awareness",
];

/// Set of skills reward weights may reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCatalog {
    skills: BTreeSet<String>,
}

impl SkillCatalog {
    /// Build from names; blanks are dropped and names are trimmed
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            skills: names
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.skills.contains(skill)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.skills.iter().map(String::as_str)
    }
}

impl Default for SkillCatalog {
    fn default() -> Self {
        Self::from_names(DEFAULT_SKILLS)
    }
}

/// Level change granted by one tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProgressionDelta {
    pub license_id: LicenseId,
    pub skill: String,
    pub tournament_id: TournamentId,
    pub delta: f64,
    pub created_at: DateTime<Utc>,
}

/// Delta row before insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewSkillDelta {
    pub license_id: LicenseId,
    pub skill: String,
    pub tournament_id: TournamentId,
    pub delta: f64,
}

/// Accumulated skill levels of a license
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProfile {
    pub license_id: LicenseId,
    pub levels: BTreeMap<String, f64>,
    pub tournaments: usize,
}

impl SkillProfile {
    pub fn from_deltas(license_id: LicenseId, deltas: &[SkillProgressionDelta]) -> Self {
        let mut levels: BTreeMap<String, f64> = BTreeMap::new();
        let mut tournaments = BTreeSet::new();
        for d in deltas.iter().filter(|d| d.license_id == license_id) {
            *levels.entry(d.skill.clone()).or_default() += d.delta;
            tournaments.insert(d.tournament_id);
        }
        for level in levels.values_mut() {
            *level = round2(*level);
        }
        Self {
            license_id,
            levels,
            tournaments: tournaments.len(),
        }
    }

    pub fn level(&self, skill: &str) -> f64 {
        self.levels.get(skill).copied().unwrap_or(0.0)
    }
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Write a delta; only the reward pipeline calls this
pub(crate) async fn record_delta(
    uow: &mut dyn UnitOfWork,
    delta: NewSkillDelta,
) -> StoreResult<SkillProgressionDelta> {
    uow.insert_skill_delta(&delta).await
}

/// Read side of the skill progression store
#[derive(Clone)]
pub struct SkillProgressionStore {
    store: Arc<dyn Store>,
}

impl SkillProgressionStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All deltas of a license, oldest first
    pub async fn deltas(&self, license_id: LicenseId) -> StoreResult<Vec<SkillProgressionDelta>> {
        let mut uow = self.store.begin().await?;
        let deltas = uow.skill_deltas(license_id).await?;
        uow.rollback().await?;
        Ok(deltas)
    }

    /// Summed levels per skill
    pub async fn profile(&self, license_id: LicenseId) -> StoreResult<SkillProfile> {
        let deltas = self.deltas(license_id).await?;
        Ok(SkillProfile::from_deltas(license_id, &deltas))
    }
}
