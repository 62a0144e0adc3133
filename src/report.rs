//! Results reporting and formatting.

use crate::metrics::TestResults;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(results: &TestResults) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.config_name)]);

        table.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        table.add_row(vec![
            "Total Requests:",
            &format!("{}", results.total_requests),
        ]);
        let success_rate = if results.total_requests > 0 {
            (results.successful_requests as f64 / results.total_requests as f64) * 100.0
        } else {
            0.0
        };
        table.add_row(vec!["Success Rate:", &format!("{:.1}%", success_rate)]);
        table.add_row(vec![
            "Requests/sec:",
            &format!("{:.1}", results.requests_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Throughput:",
            &format!("{:.1} MB/s", results.bytes_per_second / 1_000_000.0),
        ]);

        if !results.failures_by_label.is_empty() {
            table.add_row(vec!["", ""]);
            table.add_row(vec!["Failures", "count"]);
            for (label, count) in &results.failures_by_label {
                table.add_row(vec![label.as_str(), &format!("{}", count)]);
            }
        }

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(results: &TestResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &TestResults) -> String {
        format!(
            "{},{},{},{},{},{:.1},{:.1},{:.1},{:.1}",
            results.timestamp,
            results.config_name,
            results.duration_secs,
            results.total_requests,
            results.failed_requests,
            results.requests_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,config,duration,requests,failures,rps,p50,p90,p99"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn results() -> TestResults {
        TestResults {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            config_name: "browse".to_string(),
            duration_secs: 10.0,
            total_requests: 100,
            successful_requests: 97,
            failed_requests: 3,
            requests_per_second: 10.0,
            latency_p50: 12.0,
            latency_p75: 15.0,
            latency_p90: 21.0,
            latency_p95: 30.0,
            latency_p99: 55.0,
            latency_min: 4.0,
            latency_max: 80.0,
            latency_avg: 14.0,
            bytes_per_second: 1_500_000.0,
            failures_by_label: BTreeMap::from([("WMS-GetMap-roads-0.40m".to_string(), 3)]),
            layers: vec!["roads".to_string()],
            concurrency: 8,
        }
    }

    #[test]
    fn test_csv_row_matches_header_arity() {
        let row = ResultsReport::format_csv(&results());
        assert_eq!(
            row.split(',').count(),
            ResultsReport::csv_header().split(',').count()
        );
    }

    #[test]
    fn test_table_lists_failure_labels() {
        let table = ResultsReport::format_table(&results());
        assert!(table.contains("WMS-GetMap-roads-0.40m"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = ResultsReport::format_json(&results()).unwrap();
        let parsed: TestResults = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_requests, 100);
        assert_eq!(parsed.failures_by_label.len(), 1);
    }
}
