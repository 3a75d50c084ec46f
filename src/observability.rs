//! Metrics collection using metrics-rs.
//!
//! Purely observational: nothing here affects scheduling decisions or the
//! status a node reports.

use crate::status::StepStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const NODE_STEPS: &str = "stepline_node_steps";
const NODE_STEP_TIME_MS: &str = "stepline_node_step_time_ms";
const PIPELINE_CYCLES: &str = "stepline_pipeline_cycles";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        NODE_STEPS,
        metrics::Unit::Count,
        "Total number of executed node steps, labeled by resulting status"
    );
    metrics::describe_histogram!(
        NODE_STEP_TIME_MS,
        metrics::Unit::Milliseconds,
        "Wall time of a single node step"
    );
    metrics::describe_counter!(
        PIPELINE_CYCLES,
        metrics::Unit::Count,
        "Total number of pipeline cycles, labeled by overall status"
    );
}

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Success => "success",
        StepStatus::Failure => "failure",
        StepStatus::Skip => "skip",
    }
}

/// Record one executed node step.
#[inline]
pub fn record_node_step(pipeline: &str, node: &str, status: StepStatus, elapsed: Duration) {
    metrics::counter!(
        NODE_STEPS,
        "pipeline" => pipeline.to_string(),
        "node" => node.to_string(),
        "status" => status_label(status)
    )
    .increment(1);
    metrics::histogram!(
        NODE_STEP_TIME_MS,
        "pipeline" => pipeline.to_string(),
        "node" => node.to_string()
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

/// Record one completed pipeline cycle.
#[inline]
pub fn record_cycle(pipeline: &str, status: StepStatus) {
    metrics::counter!(
        PIPELINE_CYCLES,
        "pipeline" => pipeline.to_string(),
        "status" => status_label(status)
    )
    .increment(1);
}
