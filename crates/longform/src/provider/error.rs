//! Generation provider errors and their transient/fatal split.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider request timed out after {}s", duration.as_secs_f64())]
    Timeout { duration: Duration },

    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider outage: {0}")]
    Outage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Invalid provider output: {0}")]
    InvalidOutput(String),

    #[error("Provider misconfigured: {0}")]
    Misconfiguration(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed. Drives [`RetryPolicy`](super::RetryPolicy).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited(_) | Self::Outage(_) | Self::Transport(_)
        )
    }
}
