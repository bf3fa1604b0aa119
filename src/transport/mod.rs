//! Transport seam: the scheduler only sees [`Transport`], the reqwest client
//! lives behind it.
mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::template::MaterializedRequest;

pub use http::{HttpClientSettings, ReqwestTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// No response within the request timeout.
    Timeout,
    /// Connection refused, reset, or DNS resolution failed.
    Connect,
    /// Any other I/O or protocol failure.
    Request,
    /// Abandoned at the drain deadline after stop.
    Cancelled,
}

impl TransportErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body_bytes: u64,
}

#[derive(Debug, Clone, Error)]
#[error("{} error: {message}", .kind.as_str())]
pub struct TransportFailure {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportFailure {
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Executes one request. Implementations must not retry: a failed attempt is
/// reported as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: MaterializedRequest)
    -> Result<TransportResponse, TransportFailure>;
}
