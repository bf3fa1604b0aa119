//! Result aggregation: counters, latency histogram, and run snapshots.
mod collector;
mod histogram;
mod types;


pub use collector::{MetricsHandle, RECORD_CHANNEL_CAPACITY, setup_metrics_collector};
pub use histogram::LatencyHistogram;
pub use types::{AggregateStats, FailureBreakdown, LatencyStats};
