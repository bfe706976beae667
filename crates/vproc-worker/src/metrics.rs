//! Worker metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed (see `main`).

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

pub mod names {
    pub const MESSAGES_RECEIVED_TOTAL: &str = "vproc_messages_received_total";
    pub const MESSAGES_DELETED_TOTAL: &str = "vproc_messages_deleted_total";
    pub const MESSAGES_POISON_TOTAL: &str = "vproc_messages_poison_total";
    pub const MESSAGES_DROPPED_TOTAL: &str = "vproc_messages_dropped_total";
    pub const RECEIVE_ERRORS_TOTAL: &str = "vproc_receive_errors_total";
    pub const JOBS_TOTAL: &str = "vproc_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "vproc_job_duration_seconds";
    pub const JOBS_IN_FLIGHT: &str = "vproc_jobs_in_flight";
}

/// Start the Prometheus scrape endpoint on `port`.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_received(count: usize) {
    counter!(names::MESSAGES_RECEIVED_TOTAL).increment(count as u64);
}

pub fn record_deleted() {
    counter!(names::MESSAGES_DELETED_TOTAL).increment(1);
}

pub fn record_poison() {
    counter!(names::MESSAGES_POISON_TOTAL).increment(1);
}

pub fn record_dropped() {
    counter!(names::MESSAGES_DROPPED_TOTAL).increment(1);
}

pub fn record_receive_error() {
    counter!(names::RECEIVE_ERRORS_TOTAL).increment(1);
}

/// Record a finished job by outcome label.
pub fn record_job(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn set_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}
