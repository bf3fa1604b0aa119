use std::collections::BTreeMap;
use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{info, warn};

use crate::error::MetricsError;
use crate::evaluator::{FailureReason, ResultRecord};
use crate::transport::TransportErrorKind;

use super::{AggregateStats, FailureBreakdown, LatencyHistogram, LatencyStats};

/// Bound on records buffered between workers and the collector.
pub const RECORD_CHANNEL_CAPACITY: usize = 4096;
/// How often snapshots are refreshed.
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(250);
/// How often progress is logged.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Running totals. Only the collector task mutates it.
#[derive(Debug)]
pub(crate) struct AggregateState {
    total: u64,
    passed: u64,
    failures: FailureBreakdown,
    status_counts: BTreeMap<u16, u64>,
    histogram: LatencyHistogram,
    latency_sum_ms: u128,
    min_latency_ms: u64,
    max_latency_ms: u64,
    body_bytes: u64,
}

impl AggregateState {
    pub(crate) fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            total: 0,
            passed: 0,
            failures: FailureBreakdown::default(),
            status_counts: BTreeMap::new(),
            histogram: LatencyHistogram::new()?,
            latency_sum_ms: 0,
            min_latency_ms: u64::MAX,
            max_latency_ms: 0,
            body_bytes: 0,
        })
    }

    pub(crate) fn record(&mut self, record: &ResultRecord) {
        self.total = self.total.saturating_add(1);
        if record.passed() {
            self.passed = self.passed.saturating_add(1);
        }
        if let Some(reason) = record.failure {
            let counter = match reason {
                FailureReason::UnexpectedStatus { .. } => &mut self.failures.unexpected_status,
                FailureReason::Transport(TransportErrorKind::Timeout) => &mut self.failures.timeout,
                FailureReason::Transport(TransportErrorKind::Connect) => &mut self.failures.connect,
                FailureReason::Transport(TransportErrorKind::Request) => &mut self.failures.request,
                FailureReason::Transport(TransportErrorKind::Cancelled) => {
                    &mut self.failures.cancelled
                }
            };
            *counter = counter.saturating_add(1);
        }
        if let Some(status) = record.status {
            let count = self.status_counts.entry(status).or_insert(0);
            *count = count.saturating_add(1);
        }

        // Sub-millisecond responses count as 1ms, the histogram's floor.
        let latency_ms = u64::try_from(record.latency.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self.latency_sum_ms = self.latency_sum_ms.saturating_add(u128::from(latency_ms));
        self.min_latency_ms = self.min_latency_ms.min(latency_ms);
        self.max_latency_ms = self.max_latency_ms.max(latency_ms);
        self.body_bytes = self.body_bytes.saturating_add(record.body_bytes);
        if let Err(err) = self.histogram.record(latency_ms) {
            warn!("{}", err);
        }
    }

    pub(crate) fn snapshot(&self, elapsed: Duration) -> AggregateStats {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let failed = self.total.saturating_sub(self.passed);
        let (p50_ms, p90_ms, p99_ms) = self.histogram.percentiles();
        let avg_ms = if self.total > 0 {
            let avg = self
                .latency_sum_ms
                .checked_div(u128::from(self.total))
                .unwrap_or(0);
            u64::try_from(avg).unwrap_or(u64::MAX)
        } else {
            0
        };

        AggregateStats {
            elapsed_ms,
            total: self.total,
            passed: self.passed,
            failed,
            failures: self.failures,
            status_counts: self.status_counts.clone(),
            latency: LatencyStats {
                min_ms: if self.total > 0 { self.min_latency_ms } else { 0 },
                max_ms: self.max_latency_ms,
                avg_ms,
                p50_ms,
                p90_ms,
                p99_ms,
            },
            body_bytes: self.body_bytes,
            throughput_x100: scaled_ratio(self.total, 100_000, u128::from(elapsed_ms.max(1))),
            error_rate_x100: scaled_ratio(failed, 10_000, u128::from(self.total)),
        }
    }
}

/// `value * scale / divisor`, 0 when the divisor is 0.
fn scaled_ratio(value: u64, scale: u128, divisor: u128) -> u64 {
    let scaled = u128::from(value)
        .saturating_mul(scale)
        .checked_div(divisor)
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Read side of the collector; cheap to clone and safe to use while
/// recording continues.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    snapshot_rx: watch::Receiver<AggregateStats>,
}

impl MetricsHandle {
    /// Latest published snapshot (refreshed every 250ms and at run end).
    #[must_use]
    pub fn snapshot(&self) -> AggregateStats {
        self.snapshot_rx.borrow().clone()
    }
}

/// Spawns the collector task. It records until every sender of `records_rx`
/// is dropped and then returns the final stats, so no record sent before
/// that point is lost.
///
/// # Errors
///
/// Returns an error if the latency histogram cannot be created.
pub fn setup_metrics_collector(
    run_start: Instant,
    mut records_rx: mpsc::Receiver<ResultRecord>,
) -> Result<(JoinHandle<AggregateStats>, MetricsHandle), MetricsError> {
    let mut state = AggregateState::new()?;
    let (snapshot_tx, snapshot_rx) = watch::channel(AggregateStats::default());

    let handle = tokio::spawn(async move {
        let mut snapshot_interval = tokio::time::interval(SNAPSHOT_INTERVAL);
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let first_progress = run_start
            .checked_add(PROGRESS_LOG_INTERVAL)
            .unwrap_or(run_start);
        let mut progress_interval = tokio::time::interval_at(first_progress, PROGRESS_LOG_INTERVAL);
        progress_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_record = records_rx.recv() => {
                    match maybe_record {
                        Some(record) => state.record(&record),
                        None => break,
                    }
                },
                _ = snapshot_interval.tick() => {
                    snapshot_tx.send_replace(state.snapshot(run_start.elapsed()));
                },
                _ = progress_interval.tick() => {
                    let stats = state.snapshot(run_start.elapsed());
                    info!(
                        "{}s elapsed: {} iterations, {} failed, p99 {}ms",
                        stats.elapsed_ms.checked_div(1000).unwrap_or(0),
                        stats.total,
                        stats.failed,
                        stats.latency.p99_ms
                    );
                },
            }
        }

        let final_stats = state.snapshot(run_start.elapsed());
        snapshot_tx.send_replace(final_stats.clone());
        final_stats
    });

    Ok((handle, MetricsHandle { snapshot_rx }))
}
