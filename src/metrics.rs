//! Metrics collection and statistics.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Collects metrics during load test execution.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    bytes_total: u64,
    failures_by_label: BTreeMap<String, u64>,
    first_request_time: Option<Instant>,
    last_request_time: Option<Instant>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("Failed to create histogram"),
            requests_total: 0,
            requests_success: 0,
            requests_failed: 0,
            bytes_total: 0,
            failures_by_label: BTreeMap::new(),
            first_request_time: None,
            last_request_time: None,
        }
    }

    /// Record a successful request.
    pub fn record_success(&mut self, latency_us: u64, bytes: usize) {
        self.requests_total += 1;
        self.requests_success += 1;
        self.bytes_total += bytes as u64;
        self.histogram.record(latency_us).ok();

        let now = Instant::now();
        if self.first_request_time.is_none() {
            self.first_request_time = Some(now);
        }
        self.last_request_time = Some(now);
    }

    /// Record a failed request under its request-class label,
    /// e.g. `WMS-GetMap-roads-0.40m`.
    pub fn record_failure(&mut self, label: &str) {
        self.requests_total += 1;
        self.requests_failed += 1;
        *self.failures_by_label.entry(label.to_string()).or_insert(0) += 1;
    }

    /// Generate final test results.
    pub fn results(&self, config_name: String, layers: Vec<String>, concurrency: u32) -> TestResults {
        let duration = self
            .last_request_time
            .and_then(|last| self.first_request_time.map(|first| last.duration_since(first)))
            .unwrap_or_default();

        let duration_secs = duration.as_secs_f64();
        let rps = if duration_secs > 0.0 {
            self.requests_total as f64 / duration_secs
        } else {
            0.0
        };

        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            config_name,
            duration_secs,
            total_requests: self.requests_total,
            successful_requests: self.requests_success,
            failed_requests: self.requests_failed,
            requests_per_second: rps,
            latency_p50: self.histogram.value_at_percentile(50.0) as f64 / 1000.0,
            latency_p75: self.histogram.value_at_percentile(75.0) as f64 / 1000.0,
            latency_p90: self.histogram.value_at_percentile(90.0) as f64 / 1000.0,
            latency_p95: self.histogram.value_at_percentile(95.0) as f64 / 1000.0,
            latency_p99: self.histogram.value_at_percentile(99.0) as f64 / 1000.0,
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            bytes_per_second: if duration_secs > 0.0 {
                self.bytes_total as f64 / duration_secs
            } else {
                0.0
            },
            failures_by_label: self.failures_by_label.clone(),
            layers,
            concurrency,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Final test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub config_name: String,
    pub duration_secs: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,

    // Latency percentiles (ms)
    pub latency_p50: f64,
    pub latency_p75: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    // Throughput
    pub bytes_per_second: f64,

    // Failures broken down by request-class label
    #[serde(default)]
    pub failures_by_label: BTreeMap<String, u64>,

    // Test configuration
    pub layers: Vec<String>,
    pub concurrency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_counts() {
        let mut m = MetricsCollector::new();
        m.record_success(1_000, 4096);
        m.record_success(3_000, 8192);
        m.record_failure("WMS-GetMap-roads-0.40m");
        m.record_failure("WMS-GetMap-roads-0.40m");
        m.record_failure("WMS-GetMap-roads-1.60m");

        let results = m.results("test".to_string(), vec!["roads".to_string()], 4);
        assert_eq!(results.total_requests, 5);
        assert_eq!(results.successful_requests, 2);
        assert_eq!(results.failed_requests, 3);
        assert_eq!(results.failures_by_label["WMS-GetMap-roads-0.40m"], 2);
        assert_eq!(results.failures_by_label["WMS-GetMap-roads-1.60m"], 1);
    }

    #[test]
    fn test_empty_collector_produces_zeroed_results() {
        let m = MetricsCollector::new();
        let results = m.results("empty".to_string(), vec![], 1);
        assert_eq!(results.total_requests, 0);
        assert_eq!(results.requests_per_second, 0.0);
        assert_eq!(results.bytes_per_second, 0.0);
        assert!(results.failures_by_label.is_empty());
    }
}
