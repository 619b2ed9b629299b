//! Structured logging setup.
//!
//! The core logs through the `log` facade; the subscriber installed here
//! bridges those records into `tracing`. Logs go to stderr so that command
//! output on stdout stays machine-readable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// Levels are configurable via the `RUST_LOG` env var
/// (default: `info,sqlx=warn`).
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Log the outcome of one admin command
pub fn log_command(command: &str, actor: Option<&str>, duration_ms: u64, success: bool) {
    if success {
        tracing::info!(
            command = command,
            actor = actor,
            duration_ms = duration_ms,
            "Command completed"
        );
    } else {
        tracing::warn!(
            command = command,
            actor = actor,
            duration_ms = duration_ms,
            "Command failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_command() {
        // Without a subscriber this is a no-op; it must not panic.
        log_command("enroll", Some("admin"), 12, true);
        log_command("distribute", None, 3400, false);
    }
}
