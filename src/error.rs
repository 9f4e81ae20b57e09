use std::time::Duration;

use thiserror::Error;

/// Longest upstream body excerpt carried in a status error.
pub const BODY_SNIPPET_LEN: usize = 200;

/// Failures surfaced by the upstream fetch layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("upstream request to {url} timed out")]
    Timeout { url: String },

    #[error("upstream {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("fetch of {url} cancelled after {after:?}")]
    Cancelled { url: String, after: Duration },
}

impl UpstreamError {
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: truncate_body(body),
        }
    }

    /// Whether re-running the whole fetch later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport { .. } => true,
            UpstreamError::Timeout { .. } => true,
            UpstreamError::Cancelled { .. } => true,
            UpstreamError::Status { status, .. } => *status >= 500,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            UpstreamError::Transport { url, .. }
            | UpstreamError::Timeout { url }
            | UpstreamError::Status { url, .. }
            | UpstreamError::Cancelled { url, .. } => url,
        }
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}
