//! Pass/fail classification of a single iteration.
use std::time::Duration;

use tracing::debug;

use crate::template::IterationContext;
use crate::transport::{TransportErrorKind, TransportFailure, TransportResponse};

pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// A response arrived with a status other than the expected one.
    UnexpectedStatus { expected: u16, actual: u16 },
    /// No usable response.
    Transport(TransportErrorKind),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::UnexpectedStatus { expected, actual } => {
                write!(f, "expected status {}, got {}", expected, actual)
            }
            FailureReason::Transport(kind) => write!(f, "transport {}", kind.as_str()),
        }
    }
}

/// Outcome of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultRecord {
    pub worker: usize,
    pub iteration: u64,
    pub status: Option<u16>,
    pub latency: Duration,
    pub verdict: Verdict,
    pub failure: Option<FailureReason>,
    pub body_bytes: u64,
    pub timestamp_ms: i64,
}

impl ResultRecord {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseEvaluator {
    expected_status: u16,
}

impl Default for ResponseEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_STATUS)
    }
}

impl ResponseEvaluator {
    #[must_use]
    pub const fn new(expected_status: u16) -> Self {
        Self { expected_status }
    }

    #[must_use]
    pub const fn expected_status(&self) -> u16 {
        self.expected_status
    }

    /// Classifies one transport outcome. Never fails: every outcome becomes a
    /// record.
    #[must_use]
    pub fn evaluate(
        &self,
        ctx: &IterationContext,
        outcome: Result<TransportResponse, TransportFailure>,
        latency: Duration,
    ) -> ResultRecord {
        let (status, failure, body_bytes) = match outcome {
            Ok(response) if response.status == self.expected_status => {
                (Some(response.status), None, response.body_bytes)
            }
            Ok(response) => (
                Some(response.status),
                Some(FailureReason::UnexpectedStatus {
                    expected: self.expected_status,
                    actual: response.status,
                }),
                response.body_bytes,
            ),
            Err(failure) => {
                debug!(
                    worker = ctx.worker,
                    iteration = ctx.iteration,
                    "Request failed: {}",
                    failure
                );
                (None, Some(FailureReason::Transport(failure.kind)), 0)
            }
        };

        ResultRecord {
            worker: ctx.worker,
            iteration: ctx.iteration,
            status,
            latency,
            verdict: if failure.is_some() {
                Verdict::Fail
            } else {
                Verdict::Pass
            },
            failure,
            body_bytes,
            timestamp_ms: ctx.timestamp_ms,
        }
    }
}
