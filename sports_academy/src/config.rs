//! Academy configuration.
//!
//! Consolidates the environment variable reads of the core services and
//! validates them before anything is constructed.

use std::time::Duration;

use crate::enrollment::{EnrollmentPolicy, WithdrawalCutoff};
use crate::locks::LockConfig;
use crate::skills::SkillCatalog;

/// Skill delta granted to the winner when neither the tournament nor the
/// environment sets one
pub const DEFAULT_MAX_SKILL_DELTA: f64 = 5.0;

/// Core service configuration
#[derive(Debug, Clone)]
pub struct AcademyConfig {
    /// Lock wait and hold thresholds
    pub locks: LockConfig,
    /// Enrollment cost fallback and withdrawal policy
    pub enrollment: EnrollmentPolicy,
    /// Skills reward weights may reference
    pub skills: SkillCatalog,
    /// Default winner skill delta before weighting
    pub max_skill_delta: f64,
    /// Deadline for each database statement
    pub query_timeout: Duration,
}

impl AcademyConfig {
    /// Load configuration from environment variables
    ///
    /// - `LOCK_WAIT_TIMEOUT_MS` (default: 5000)
    /// - `LOCK_HOLD_WARNING_MS` (default: 500)
    /// - `DEFAULT_ENROLLMENT_COST` (default: 100)
    /// - `WITHDRAWAL_REFUND_PERCENT` (default: 50)
    /// - `WITHDRAWAL_CUTOFF`: `enrollment_close` or `session_generation` (default)
    /// - `MAX_SKILL_DELTA` (default: 5.0)
    /// - `SKILL_CATALOG`: comma-separated skill names (default: built-in list)
    /// - `DB_QUERY_TIMEOUT_SECS` (default: 5)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a set variable cannot be parsed
    /// where silently falling back would change money or progression rules.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cutoff = match std::env::var("WITHDRAWAL_CUTOFF") {
            Ok(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "WITHDRAWAL_CUTOFF".to_string(),
                reason,
            })?,
            Err(_) => WithdrawalCutoff::SessionGeneration,
        };

        let refund_percent = parse_env_strict("WITHDRAWAL_REFUND_PERCENT", 50u8)?;
        let default_cost = parse_env_strict("DEFAULT_ENROLLMENT_COST", 100i64)?;

        let skills = match std::env::var("SKILL_CATALOG") {
            Ok(list) => SkillCatalog::from_names(list.split(',')),
            Err(_) => SkillCatalog::default(),
        };

        let config = Self {
            locks: LockConfig::from_env(),
            enrollment: EnrollmentPolicy {
                default_cost,
                refund_percent,
                cutoff,
            },
            skills,
            max_skill_delta: parse_env_strict("MAX_SKILL_DELTA", DEFAULT_MAX_SKILL_DELTA)?,
            query_timeout: Duration::from_secs(parse_env_or("DB_QUERY_TIMEOUT_SECS", 5)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locks.wait_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LOCK_WAIT_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.enrollment.default_cost < 0 {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_ENROLLMENT_COST".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.enrollment.refund_percent > 100 {
            return Err(ConfigError::Invalid {
                var: "WITHDRAWAL_REFUND_PERCENT".to_string(),
                reason: format!("Must be at most 100, got {}", self.enrollment.refund_percent),
            });
        }

        if !self.max_skill_delta.is_finite() || self.max_skill_delta < 0.0 {
            return Err(ConfigError::Invalid {
                var: "MAX_SKILL_DELTA".to_string(),
                reason: "Must be a non-negative number".to_string(),
            });
        }

        if self.skills.is_empty() {
            return Err(ConfigError::Invalid {
                var: "SKILL_CATALOG".to_string(),
                reason: "Must name at least one skill".to_string(),
            });
        }

        if self.query_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "DB_QUERY_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for AcademyConfig {
    fn default() -> Self {
        Self {
            locks: LockConfig::default(),
            enrollment: EnrollmentPolicy::default(),
            skills: SkillCatalog::default(),
            max_skill_delta: DEFAULT_MAX_SKILL_DELTA,
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset or invalid
pub fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse an environment variable, falling back to `default` only when unset
fn parse_env_strict<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {value:?}"),
        }),
        Err(_) => Ok(default),
    }
}
