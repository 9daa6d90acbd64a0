//! Prometheus metrics for the notification service.
//!
//! Covers the whole trigger path: accepted/rejected triggers, fan-out
//! size, materialized notifications and messages, job lifecycle, and
//! execution-log volume.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "pulse";

lazy_static! {
    // ============================================================================
    // Trigger Metrics
    // ============================================================================

    /// Accepted trigger requests
    pub static ref TRIGGERS_ACCEPTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_triggers_accepted_total", METRIC_PREFIX),
        "Total trigger requests accepted and enqueued"
    ).unwrap();

    /// Rejected trigger requests
    pub static ref TRIGGERS_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_triggers_rejected_total", METRIC_PREFIX),
        "Total trigger requests rejected before enqueue"
    ).unwrap();

    /// Deduplicated fan-out size per trigger
    pub static ref FANOUT_SUBSCRIBERS: Histogram = register_histogram!(
        format!("{}_fanout_subscribers", METRIC_PREFIX),
        "Distribution of deduplicated subscribers per trigger",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]
    ).unwrap();

    // ============================================================================
    // Materialization Metrics
    // ============================================================================

    /// Notifications created
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications created"
    ).unwrap();

    /// Messages created by channel
    pub static ref MESSAGES_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_created_total", METRIC_PREFIX),
        "Total messages created",
        &["channel"]
    ).unwrap();

    /// Execution log entries appended
    pub static ref LOG_ENTRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_log_entries_total", METRIC_PREFIX),
        "Total execution log entries appended"
    ).unwrap();

    // ============================================================================
    // Job Metrics
    // ============================================================================

    /// Jobs handed to the runner
    pub static ref JOBS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_enqueued_total", METRIC_PREFIX),
        "Total jobs enqueued to the async runner"
    ).unwrap();

    /// Jobs completed by the runner
    pub static ref JOBS_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_completed_total", METRIC_PREFIX),
        "Total jobs completed by the async runner"
    ).unwrap();

    /// Jobs failed in the runner
    pub static ref JOBS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_failed_total", METRIC_PREFIX),
        "Total jobs that failed during execution"
    ).unwrap();

    // ============================================================================
    // Registry Metrics
    // ============================================================================

    /// Topics created
    pub static ref TOPICS_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_topics_created_total", METRIC_PREFIX),
        "Total topics created"
    ).unwrap();

    /// Subscribers registered (including lazy trigger-time registration)
    pub static ref SUBSCRIBERS_REGISTERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_subscribers_registered_total", METRIC_PREFIX),
        "Total subscribers registered"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families)
}
