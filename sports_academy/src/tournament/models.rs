//! Tournament data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::TournamentState;
use crate::rewards::RewardConfig;
use crate::skills::SkillCatalog;

/// Tournament ID type
pub type TournamentId = i64;

/// Bracket format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    /// Round-robin, every pair meets once
    League,
    /// Single elimination
    Knockout,
    /// Isolated round-robin groups feeding a knockout
    GroupPlusKnockout,
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TournamentFormat::League => write!(f, "league"),
            TournamentFormat::Knockout => write!(f, "knockout"),
            TournamentFormat::GroupPlusKnockout => write!(f, "group_plus_knockout"),
        }
    }
}

impl FromStr for TournamentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "league" => Ok(TournamentFormat::League),
            "knockout" => Ok(TournamentFormat::Knockout),
            "group_plus_knockout" => Ok(TournamentFormat::GroupPlusKnockout),
            other => Err(format!("unknown tournament format: {other}")),
        }
    }
}

/// What an individual-ranking measurement represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKind {
    /// Judge-assigned placement, 1 is best
    Placement,
    TimeBased,
    ScoreBased,
    DistanceBased,
    /// Several rounds aggregated into one value
    RoundsBased,
}

impl RankingKind {
    /// Natural ordering for this kind
    pub fn default_direction(self) -> RankingDirection {
        match self {
            RankingKind::Placement | RankingKind::TimeBased => RankingDirection::Ascending,
            RankingKind::ScoreBased | RankingKind::DistanceBased | RankingKind::RoundsBased => {
                RankingDirection::Descending
            }
        }
    }
}

/// Sort direction for measured values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingDirection {
    /// Lower is better
    Ascending,
    /// Higher is better
    Descending,
}

/// How per-round values collapse into one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundAggregation {
    Sum,
    /// Best single round in the ranking direction
    Best,
}

/// How sessions are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    /// Two participants, higher score wins
    HeadToHead,
    /// Every participant is measured and placed
    IndividualRanking {
        kind: RankingKind,
        direction: RankingDirection,
        aggregation: RoundAggregation,
        rounds: u32,
    },
}

impl ScoringMode {
    /// Individual ranking with the kind's natural direction
    pub fn individual(kind: RankingKind) -> Self {
        ScoringMode::IndividualRanking {
            kind,
            direction: kind.default_direction(),
            aggregation: RoundAggregation::Sum,
            rounds: if kind == RankingKind::RoundsBased { 3 } else { 1 },
        }
    }

    /// Rounds-based individual ranking
    pub fn rounds(rounds: u32, aggregation: RoundAggregation) -> Self {
        ScoringMode::IndividualRanking {
            kind: RankingKind::RoundsBased,
            direction: RankingDirection::Descending,
            aggregation,
            rounds,
        }
    }

    pub fn is_head_to_head(&self) -> bool {
        matches!(self, ScoringMode::HeadToHead)
    }
}

/// Group stage shape for `GroupPlusKnockout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStageConfig {
    /// Target participants per group
    pub group_size: u32,
    /// Finishers per group advancing to the knockout
    pub qualifiers_per_group: u32,
}

impl Default for GroupStageConfig {
    fn default() -> Self {
        Self {
            group_size: 4,
            qualifiers_per_group: 2,
        }
    }
}

/// Tournament configuration supplied at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub format: TournamentFormat,
    #[serde(default = "default_scoring")]
    pub scoring: ScoringMode,
    pub max_participants: u32,
    /// Falls back to the configured default cost
    #[serde(default)]
    pub enrollment_cost: Option<i64>,
    #[serde(default)]
    pub reward_config: RewardConfig,
    #[serde(default)]
    pub group_stage: GroupStageConfig,
    /// Round-robin sessions may end level; defaults to true for league formats
    #[serde(default)]
    pub allow_draws: Option<bool>,
    #[serde(default)]
    pub third_place_match: bool,
}

fn default_scoring() -> ScoringMode {
    ScoringMode::HeadToHead
}

impl TournamentConfig {
    fn base(name: String, format: TournamentFormat, max_participants: u32, cost: i64) -> Self {
        Self {
            name,
            format,
            scoring: ScoringMode::HeadToHead,
            max_participants,
            enrollment_cost: Some(cost),
            reward_config: RewardConfig::default(),
            group_stage: GroupStageConfig::default(),
            allow_draws: None,
            third_place_match: false,
        }
    }

    /// Round-robin league
    pub fn league(name: String, max_participants: u32, cost: i64) -> Self {
        Self::base(name, TournamentFormat::League, max_participants, cost)
    }

    /// Single-elimination knockout
    pub fn knockout(name: String, max_participants: u32, cost: i64) -> Self {
        Self::base(name, TournamentFormat::Knockout, max_participants, cost)
    }

    /// Groups of four, top two advance
    pub fn group_plus_knockout(name: String, max_participants: u32, cost: i64) -> Self {
        Self::base(name, TournamentFormat::GroupPlusKnockout, max_participants, cost)
    }

    /// Single heat ranked by measurement
    pub fn individual(name: String, kind: RankingKind, max_participants: u32, cost: i64) -> Self {
        let mut config = Self::base(name, TournamentFormat::League, max_participants, cost);
        config.scoring = ScoringMode::individual(kind);
        config
    }

    pub fn with_rewards(mut self, reward_config: RewardConfig) -> Self {
        self.reward_config = reward_config;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringMode) -> Self {
        self.scoring = scoring;
        self
    }

    /// Draw policy after defaults
    pub fn draws_allowed(&self) -> bool {
        self.allow_draws
            .unwrap_or(self.format != TournamentFormat::Knockout)
    }

    /// Validate before anything is persisted
    ///
    /// Reward weights are checked here rather than at distribution time.
    pub fn validate(&self, catalog: &SkillCatalog) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.max_participants < 2 {
            return Err(format!(
                "max_participants must be at least 2, got {}",
                self.max_participants
            ));
        }
        if let Some(cost) = self.enrollment_cost {
            if cost < 0 {
                return Err(format!("enrollment_cost must not be negative, got {cost}"));
            }
        }

        if let ScoringMode::IndividualRanking { rounds, kind, .. } = self.scoring {
            if self.format != TournamentFormat::League {
                return Err("individual ranking tournaments use the league format".to_string());
            }
            if rounds == 0 {
                return Err("rounds must be at least 1".to_string());
            }
            if kind != RankingKind::RoundsBased && rounds != 1 {
                return Err(format!("{kind:?} scoring takes exactly one round"));
            }
        }

        if self.format == TournamentFormat::GroupPlusKnockout {
            let groups = self.group_stage;
            if groups.group_size < 2 {
                return Err("group_size must be at least 2".to_string());
            }
            if groups.qualifiers_per_group == 0 || groups.qualifiers_per_group > groups.group_size
            {
                return Err(format!(
                    "qualifiers_per_group must be between 1 and {}",
                    groups.group_size
                ));
            }
        }

        self.reward_config.validate(catalog)
    }
}

/// Persisted tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: TournamentFormat,
    pub scoring: ScoringMode,
    pub state: TournamentState,
    pub max_participants: u32,
    pub enrollment_cost: i64,
    pub reward_config: RewardConfig,
    pub group_stage: GroupStageConfig,
    pub allow_draws: bool,
    pub third_place_match: bool,
    pub cancel_reason: Option<String>,
    /// Bumped on every update; writes must present the version they read
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tournament row before the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct NewTournament {
    pub name: String,
    pub format: TournamentFormat,
    pub scoring: ScoringMode,
    pub max_participants: u32,
    pub enrollment_cost: i64,
    pub reward_config: RewardConfig,
    pub group_stage: GroupStageConfig,
    pub allow_draws: bool,
    pub third_place_match: bool,
}

impl NewTournament {
    /// Resolve config defaults
    pub fn from_config(config: TournamentConfig, default_cost: i64) -> Self {
        let allow_draws = config.draws_allowed();
        Self {
            name: config.name,
            format: config.format,
            scoring: config.scoring,
            max_participants: config.max_participants,
            enrollment_cost: config.enrollment_cost.unwrap_or(default_cost),
            reward_config: config.reward_config,
            group_stage: config.group_stage,
            allow_draws,
            third_place_match: config.third_place_match,
        }
    }
}

/// Normal transition or admin reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Transition,
    Reset,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::Transition => write!(f, "transition"),
            AuditKind::Reset => write!(f, "reset"),
        }
    }
}

impl FromStr for AuditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transition" => Ok(AuditKind::Transition),
            "reset" => Ok(AuditKind::Reset),
            other => Err(format!("unknown audit kind: {other}")),
        }
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentAuditEntry {
    pub id: i64,
    pub tournament_id: TournamentId,
    pub from_state: TournamentState,
    pub to_state: TournamentState,
    pub kind: AuditKind,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit row before insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub tournament_id: TournamentId,
    pub from_state: TournamentState,
    pub to_state: TournamentState,
    pub kind: AuditKind,
    pub reason: Option<String>,
    pub actor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::RewardConfig;
    use std::collections::BTreeMap;

    fn catalog() -> SkillCatalog {
        SkillCatalog::default()
    }

    #[test]
    fn test_default_directions() {
        assert_eq!(
            RankingKind::TimeBased.default_direction(),
            RankingDirection::Ascending
        );
        assert_eq!(
            RankingKind::DistanceBased.default_direction(),
            RankingDirection::Descending
        );
        assert_eq!(
            RankingKind::Placement.default_direction(),
            RankingDirection::Ascending
        );
    }

    #[test]
    fn test_draw_defaults() {
        let league = TournamentConfig::league("L".to_string(), 8, 100);
        assert!(league.draws_allowed());
        let knockout = TournamentConfig::knockout("K".to_string(), 8, 100);
        assert!(!knockout.draws_allowed());
        let mut no_draws = league.clone();
        no_draws.allow_draws = Some(false);
        assert!(!no_draws.draws_allowed());
    }

    #[test]
    fn test_validate_rejects_individual_knockout() {
        let mut config = TournamentConfig::individual(
            "Sprint".to_string(),
            RankingKind::TimeBased,
            16,
            50,
        );
        assert!(config.validate(&catalog()).is_ok());
        config.format = TournamentFormat::Knockout;
        assert!(config.validate(&catalog()).is_err());
    }

    #[test]
    fn test_validate_group_stage() {
        let mut config = TournamentConfig::group_plus_knockout("G".to_string(), 16, 100);
        assert!(config.validate(&catalog()).is_ok());
        config.group_stage.qualifiers_per_group = 5;
        assert!(config.validate(&catalog()).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_reward_weights() {
        let mut weights = BTreeMap::new();
        weights.insert("dribbling".to_string(), 0.5);
        weights.insert("passing".to_string(), 0.3);
        let config = TournamentConfig::league("L".to_string(), 8, 100).with_rewards(RewardConfig {
            skill_weights: weights,
            ..RewardConfig::default()
        });
        let err = config.validate(&catalog()).unwrap_err();
        assert!(err.contains("sum"));
    }

    #[test]
    fn test_config_from_minimal_json() {
        let json = r#"{"name":"Spring Cup","format":"knockout","max_participants":8}"#;
        let config: TournamentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scoring, ScoringMode::HeadToHead);
        assert_eq!(config.enrollment_cost, None);
        let new = NewTournament::from_config(config, 120);
        assert_eq!(new.enrollment_cost, 120);
        assert!(!new.allow_draws);
    }

    #[test]
    fn test_scoring_json_shape() {
        let json = r#"{"mode":"individual_ranking","kind":"time_based","direction":"ascending","aggregation":"sum","rounds":1}"#;
        let scoring: ScoringMode = serde_json::from_str(json).unwrap();
        assert_eq!(scoring, ScoringMode::individual(RankingKind::TimeBased));
    }
}
