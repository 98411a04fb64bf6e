// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use reqwest::{Method, StatusCode};

/// Errors surfaced to callers of [`crate::ApiClient`].
///
/// Cloneable so a single terminal error can be handed to every request
/// waiting on the same refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Network or timeout failure unrelated to authentication.
    #[error("transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    /// The server rejected the request's credentials. Only reaches callers
    /// for requests that opted out of refresh.
    #[error("authentication expired (HTTP {status})")]
    AuthenticationExpired { status: StatusCode },

    /// Credential refresh failed; the session is over.
    #[error("credential refresh failed: {reason}")]
    RefreshFailed { reason: String },

    /// A request that was already retried after a refresh failed
    /// authentication again.
    #[error("authentication failed again after refresh: {method} {path}")]
    RetryLoopDetected { method: Method, path: String },

    /// The request could not be built (bad URL or header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response body did not match the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(Arc<serde_json::Error>),
}

impl ClientError {
    /// True when the session has ended and the caller should re-authenticate.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. } | Self::RetryLoopDetected { .. })
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT",
            Self::AuthenticationExpired { .. } => "AUTHENTICATION_EXPIRED",
            Self::RefreshFailed { .. } => "REFRESH_FAILED",
            Self::RetryLoopDetected { .. } => "RETRY_LOOP_DETECTED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Decode(_) => "DECODE",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(Arc::new(e))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
