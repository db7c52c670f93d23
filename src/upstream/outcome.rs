//! Typed results for upstream calls.
//!
//! Upstream bodies are decoded exactly once, at the client boundary. Callers
//! match on [`ApiOutcome`] instead of probing ad hoc JSON shapes.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an upstream call did not produce a usable payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// Connection refused, DNS failure, reset, TLS error.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    /// The bounded client timeout elapsed.
    #[error("upstream request timed out")]
    Timeout,
    /// Upstream answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    /// Body was not JSON, or not the JSON we expected.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl FailureReason {
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Result of one upstream round trip.
#[derive(Debug)]
#[must_use]
pub enum ApiOutcome<T> {
    Success(T),
    Failure(FailureReason),
}

impl<T> ApiOutcome<T> {
    /// Discard the failure reason.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// # Errors
    /// Returns the failure reason when the call did not succeed.
    pub fn into_result(self) -> Result<T, FailureReason> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(reason) => Err(reason),
        }
    }
}

impl<T> From<Result<T, FailureReason>> for ApiOutcome<T> {
    fn from(result: Result<T, FailureReason>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(reason) => Self::Failure(reason),
        }
    }
}

/// Resource envelope used by every `/api/v1` endpoint: `{ data, pagination? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    /// Pagination as sent by upstream, or the first-page default.
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.pagination.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            total_pages: 0,
            total_count: 0,
        }
    }
}
