//! Metrics implementation using Prometheus.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use browzee_core::{Error, Result};

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::gateway(format!("Failed to install Prometheus recorder: {}", e)))?;

    describe_metrics();
    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!("browzee_tasks_started_total", "Browser tasks started");
    metrics::describe_counter!(
        "browzee_tasks_finished_total",
        "Browser tasks finished, by terminal state"
    );
    metrics::describe_counter!("browzee_agent_steps_total", "Agent steps recorded");
    metrics::describe_counter!("browzee_questions_total", "Questions sent to an operator");
}
