//! Bill extraction pipeline
//!
//! Takes a stored receipt image through the AI gateway call, tolerant
//! response normalization, and state reconciliation against the live
//! bill session.

pub mod gateway_client;
pub mod normalizer;
pub mod orchestrator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extraction pipeline errors
///
/// Rate-limit and quota conditions carry the exact user-facing messages the
/// gateway contract defines, so callers can surface them verbatim.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Gateway returned HTTP 429
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    /// Gateway returned HTTP 402
    #[error("Payment required. Please add credits to your workspace.")]
    QuotaExceeded,

    /// Gateway returned another non-2xx status
    #[error("AI gateway error: {0}")]
    Api(u16),

    /// Request never completed (transport failure or timeout)
    #[error("Gateway request failed: {0}")]
    Network(String),

    /// 2xx response body was not a chat completion
    #[error("Failed to parse gateway response: {0}")]
    Parse(String),

    /// Client-side configuration problem (e.g. missing API key)
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl ExtractionError {
    /// Classify this error for the session failure record
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ExtractionError::RateLimited => FailureKind::RateLimited,
            ExtractionError::QuotaExceeded => FailureKind::QuotaExceeded,
            _ => FailureKind::Generic,
        }
    }
}

/// Failure classification stored on a Failed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Gateway rate limit (HTTP 429)
    RateLimited,
    /// Gateway quota / payment required (HTTP 402)
    QuotaExceeded,
    /// Any other gateway, network, or configuration failure
    Generic,
}

impl FailureKind {
    /// Stable string form used in events
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::Generic => "generic",
        }
    }
}

/// Failure record kept on the session while in the Failed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    /// Failure classification
    pub kind: FailureKind,
    /// User-facing message
    pub message: String,
}

impl ExtractionFailure {
    /// Build a failure record from a pipeline error
    pub fn from_error(error: &ExtractionError) -> Self {
        Self {
            kind: error.failure_kind(),
            message: error.to_string(),
        }
    }
}
