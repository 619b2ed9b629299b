//! Admin tool configuration.
//!
//! Consolidates the environment variable reads of the binary on top of the
//! core's [`AcademyConfig`].

use sports_academy::db::DatabaseConfig;
use sports_academy::{AcademyConfig, ConfigError};
use std::net::SocketAddr;

/// Complete admin configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Core service configuration
    pub academy: AcademyConfig,
    /// Database configuration, `None` in memory mode
    pub database: Option<DatabaseConfig>,
    /// Prometheus scrape endpoint
    pub metrics_bind: Option<SocketAddr>,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `memory` - Run against an in-process store; no database is configured
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `metrics_override` - Optional metrics address override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        memory: bool,
        database_url_override: Option<String>,
        metrics_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let academy = AcademyConfig::from_env()?;
        academy.validate()?;

        let database = if memory {
            None
        } else {
            Some(DatabaseConfig::from_env(database_url_override)?)
        };

        let metrics_bind = match metrics_override {
            Some(addr) => Some(addr),
            None => match std::env::var("METRICS_BIND") {
                Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("Not a socket address: {value:?}"),
                })?),
                Err(_) => None,
            },
        };

        Ok(Self {
            academy,
            database,
            metrics_bind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mode_needs_no_database() {
        let config = AdminConfig::from_env(true, None, Some("127.0.0.1:9100".parse().unwrap()))
            .unwrap();
        assert!(config.database.is_none());
        assert_eq!(config.metrics_bind, Some("127.0.0.1:9100".parse().unwrap()));
    }

    #[test]
    fn test_database_url_override() {
        let config = AdminConfig::from_env(
            false,
            Some("postgres://academy@localhost/academy_test".to_string()),
            None,
        )
        .unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.database_url, "postgres://academy@localhost/academy_test");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "DATABASE_URL".to_string(),
            hint: "postgres://...".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATABASE_URL"));
        assert!(msg.contains("postgres://"));
    }
}
