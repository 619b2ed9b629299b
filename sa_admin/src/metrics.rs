//! Prometheus metrics for the admin tool.
//!
//! When enabled, the core's [`sports_academy::MetricsTelemetry`] records lock
//! and operation metrics; this module installs the exporter and adds
//! per-command counters.
//!
//! # Metrics
//!
//! - `academy_lock_wait_ms`, `academy_lock_hold_ms`: lock timings by entity/operation
//! - `academy_operations_total`, `academy_operation_duration_ms`: facade calls
//! - `academy_admin_commands_total`: admin commands by name and outcome

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

/// Increment the admin command counter.
pub fn command_total(command: &str, success: bool) {
    metrics::counter!("academy_admin_commands_total",
        "command" => command.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}
