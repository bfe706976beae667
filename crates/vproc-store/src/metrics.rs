//! Store metrics collection.
//!
//! - Query counters by operation and outcome
//! - Latency histograms

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total store queries by operation and outcome.
    pub const QUERIES_TOTAL: &str = "vproc_store_queries_total";

    /// Query latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vproc_store_latency_seconds";
}

/// Record metrics for a completed store operation.
pub fn record_query(operation: &'static str, ok: bool, latency_secs: f64) {
    counter!(
        names::QUERIES_TOTAL,
        "operation" => operation,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}
