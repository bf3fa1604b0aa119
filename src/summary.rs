//! End-of-run summary, rendered as text or JSON.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::args::OutputFormat;
use crate::error::MetricsError;
use crate::metrics::{AggregateStats, FailureBreakdown, LatencyStats};
use crate::scheduler::{RunOutcome, StopReason};

/// Identifies what was load tested.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunTarget {
    pub method: String,
    pub url: String,
    pub vus: usize,
    pub expected_status: u16,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub target: RunTarget,
    /// RFC 3339 wall-clock start.
    pub started_at: String,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    /// Percent with two decimals, e.g. "20.00".
    pub error_rate: String,
    /// Iterations per second with two decimals.
    pub throughput: String,
    pub latency_ms: LatencyStats,
    pub failures: FailureBreakdown,
    pub status_counts: BTreeMap<u16, u64>,
    pub body_bytes: u64,
}

impl RunSummary {
    #[must_use]
    pub fn new(target: RunTarget, outcome: &RunOutcome) -> Self {
        let stats: &AggregateStats = &outcome.stats;
        let started_at = chrono::DateTime::from_timestamp_millis(outcome.started_at_ms)
            .map(|time| time.to_rfc3339())
            .unwrap_or_default();
        Self {
            target,
            started_at,
            stop_reason: outcome.stop_reason,
            elapsed_ms: stats.elapsed_ms,
            total: stats.total,
            passed: stats.passed,
            failed: stats.failed,
            error_rate: format_x100(stats.error_rate_x100),
            throughput: format_x100(stats.throughput_x100),
            latency_ms: stats.latency,
            failures: stats.failures,
            status_counts: stats.status_counts.clone(),
            body_bytes: stats.body_bytes,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the summary cannot be serialized.
    pub fn to_json(&self) -> Result<String, MetricsError> {
        serde_json::to_string_pretty(self).map_err(|source| MetricsError::EncodeSummary { source })
    }

    /// Renders in `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn render(&self, format: OutputFormat) -> Result<String, MetricsError> {
        match format {
            OutputFormat::Text => Ok(self.to_string()),
            OutputFormat::Json => self.to_json(),
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Target: {} {}", self.target.method, self.target.url)?;
        writeln!(f, "Started: {}", self.started_at)?;
        writeln!(f, "Stop Reason: {}", self.stop_reason)?;
        writeln!(
            f,
            "Duration: {}.{:03}s",
            self.elapsed_ms / 1000,
            self.elapsed_ms % 1000
        )?;
        writeln!(f, "Virtual Users: {}", self.target.vus)?;
        writeln!(f, "Total Iterations: {}", self.total)?;
        writeln!(f, "Passed: {}", self.passed)?;
        writeln!(f, "Failed: {} ({}%)", self.failed, self.error_rate)?;
        writeln!(
            f,
            "Non-Expected Status: {} (expected {})",
            self.failures.unexpected_status, self.target.expected_status
        )?;
        writeln!(f, "Timeouts: {}", self.failures.timeout)?;
        writeln!(f, "Connect Errors: {}", self.failures.connect)?;
        writeln!(f, "Request Errors: {}", self.failures.request)?;
        writeln!(f, "Cancelled: {}", self.failures.cancelled)?;
        let statuses: Vec<String> = self
            .status_counts
            .iter()
            .map(|(status, count)| format!("{}={}", status, count))
            .collect();
        writeln!(f, "Status Codes: {}", statuses.join(", "))?;
        writeln!(
            f,
            "Min/Avg/Max Latency: {}ms / {}ms / {}ms",
            self.latency_ms.min_ms, self.latency_ms.avg_ms, self.latency_ms.max_ms
        )?;
        writeln!(
            f,
            "P50/P90/P99 Latency: {}ms / {}ms / {}ms",
            self.latency_ms.p50_ms, self.latency_ms.p90_ms, self.latency_ms.p99_ms
        )?;
        writeln!(f, "Throughput: {} it/s", self.throughput)
    }
}

fn format_x100(value: u64) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

/// Prints the summary to stdout, or writes it to `output` when set.
///
/// # Errors
///
/// Returns an error if encoding or writing the file fails.
pub async fn emit_summary(
    summary: &RunSummary,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), MetricsError> {
    let rendered = summary.render(format)?;
    let Some(path) = output else {
        print!("{}", rendered);
        if matches!(format, OutputFormat::Json) {
            println!();
        }
        return Ok(());
    };

    let write_error = |source| MetricsError::WriteSummary {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(path).await.map_err(write_error)?;
    file.write_all(rendered.as_bytes())
        .await
        .map_err(write_error)?;
    file.flush().await.map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AggregateStats;

    fn outcome() -> RunOutcome {
        let mut status_counts = BTreeMap::new();
        status_counts.insert(200, 4);
        status_counts.insert(500, 1);
        RunOutcome {
            stats: AggregateStats {
                elapsed_ms: 2500,
                total: 5,
                passed: 4,
                failed: 1,
                failures: FailureBreakdown {
                    unexpected_status: 1,
                    ..FailureBreakdown::default()
                },
                status_counts,
                latency: LatencyStats {
                    min_ms: 3,
                    max_ms: 40,
                    avg_ms: 12,
                    p50_ms: 10,
                    p90_ms: 30,
                    p99_ms: 40,
                },
                body_bytes: 120,
                throughput_x100: 200,
                error_rate_x100: 2000,
            },
            stop_reason: StopReason::IterationsCompleted,
            started_at_ms: 0,
        }
    }

    fn target() -> RunTarget {
        RunTarget {
            method: "POST".to_owned(),
            url: "http://localhost:8082/orders".to_owned(),
            vus: 1,
            expected_status: 200,
        }
    }

    #[test]
    fn text_summary_reports_rates_and_percentiles() -> Result<(), String> {
        let text = RunSummary::new(target(), &outcome()).to_string();
        for expected in [
            "Total Iterations: 5",
            "Failed: 1 (20.00%)",
            "P50/P90/P99 Latency: 10ms / 30ms / 40ms",
            "Throughput: 2.00 it/s",
            "Status Codes: 200=4, 500=1",
            "Stop Reason: iterations completed",
            "Duration: 2.500s",
        ] {
            if !text.contains(expected) {
                return Err(format!("Missing '{}' in:\n{}", expected, text));
            }
        }
        Ok(())
    }

    #[test]
    fn json_summary_is_machine_readable() -> Result<(), String> {
        let summary = RunSummary::new(target(), &outcome());
        let json = summary.to_json().map_err(|err| err.to_string())?;
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|err| format!("invalid json: {}", err))?;
        if value.get("error_rate").and_then(|v| v.as_str()) != Some("20.00") {
            return Err(format!("Unexpected error_rate in {}", json));
        }
        if value.get("stop_reason").and_then(|v| v.as_str()) != Some("iterations-completed") {
            return Err(format!("Unexpected stop_reason in {}", json));
        }
        if value.pointer("/latency_ms/p99_ms").and_then(|v| v.as_u64()) != Some(40) {
            return Err(format!("Unexpected p99 in {}", json));
        }
        if value.pointer("/status_counts/500").and_then(|v| v.as_u64()) != Some(1) {
            return Err(format!("Unexpected status counts in {}", json));
        }
        if value.get("started_at").and_then(|v| v.as_str()) != Some("1970-01-01T00:00:00+00:00") {
            return Err(format!("Unexpected start time in {}", json));
        }
        Ok(())
    }

    #[test]
    fn summary_is_written_to_output_file() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let path = dir.path().join("summary.json");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime
            .block_on(emit_summary(
                &RunSummary::new(target(), &outcome()),
                OutputFormat::Json,
                Some(&path),
            ))
            .map_err(|err| err.to_string())?;
        let written =
            std::fs::read_to_string(&path).map_err(|err| format!("read failed: {}", err))?;
        if !written.contains("\"total\": 5") {
            return Err(format!("Unexpected file contents: {}", written));
        }
        Ok(())
    }
}
