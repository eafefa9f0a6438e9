//! Metrics sink
//!
//! Extractors receive a `Metrics` implementation through their constructors
//! instead of reaching for a global. `LogMetrics` reproduces the Singer
//! convention of `METRIC: {json}` log lines.

use serde_json::json;
use std::time::Duration;
use tracing::info;

/// Timer and counter sink for extraction metrics
pub trait Metrics: Send + Sync {
    /// One HTTP attempt finished. `status` is `None` when no response arrived.
    fn http_request(&self, endpoint: &str, status: Option<u16>, elapsed: Duration);

    /// `count` records were written for `endpoint`
    fn record_count(&self, endpoint: &str, count: usize);
}

/// Emits Singer-style metric lines through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetrics;

impl Metrics for LogMetrics {
    fn http_request(&self, endpoint: &str, status: Option<u16>, elapsed: Duration) {
        let succeeded = status.is_some_and(|s| (200..300).contains(&s));
        let metric = json!({
            "type": "timer",
            "metric": "http_request_duration",
            "value": elapsed.as_secs_f64(),
            "tags": {
                "endpoint": endpoint,
                "http_status_code": status,
                "status": if succeeded { "succeeded" } else { "failed" },
            }
        });
        info!(target: "metrics", "METRIC: {}", metric);
    }

    fn record_count(&self, endpoint: &str, count: usize) {
        let metric = json!({
            "type": "counter",
            "metric": "record_count",
            "value": count,
            "tags": { "endpoint": endpoint }
        });
        info!(target: "metrics", "METRIC: {}", metric);
    }
}
