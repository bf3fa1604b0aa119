use std::collections::BTreeMap;

use serde::Serialize;

/// Failed iterations split by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureBreakdown {
    pub unexpected_status: u64,
    pub timeout: u64,
    pub connect: u64,
    pub request: u64,
    pub cancelled: u64,
}

impl FailureBreakdown {
    #[must_use]
    pub const fn transport_errors(&self) -> u64 {
        self.timeout
            .saturating_add(self.connect)
            .saturating_add(self.request)
            .saturating_add(self.cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: u64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p99_ms: u64,
}

/// Immutable copy of the aggregated results at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub elapsed_ms: u64,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub failures: FailureBreakdown,
    pub status_counts: BTreeMap<u16, u64>,
    pub latency: LatencyStats,
    pub body_bytes: u64,
    /// Iterations per second, times 100.
    pub throughput_x100: u64,
    /// Failed share of all iterations in percent, times 100 (2000 = 20.00%).
    pub error_rate_x100: u64,
}
