//! Reward calculation and distribution.

pub mod calculator;
pub mod models;
pub mod pipeline;

pub use calculator::{compute_rewards, skill_delta};
pub use models::{
    Distribution, NewXpEntry, ParticipantReward, RewardConfig, RewardDistributionRecord,
    RewardSummary, WEIGHT_EPSILON, XpEntry,
};
pub use pipeline::RewardPipeline;
