use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much fallback machinery the dispatcher brings to bear on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplayProfile {
    /// Handler map, recognizers, context tracking and unmapped-action errors.
    #[default]
    Full,
    /// Skip rules, route table, generic click; anything else is skipped.
    Simple,
}

impl ReplayProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Simple => "simple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    FailFast,
    ContinueOnError,
}

/// Timeouts handed to collaborator operations and polling waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayTimeouts {
    pub preview: Duration,
    pub export: Duration,
    pub success: Duration,
    pub locate: Duration,
    pub connections: Duration,
    pub poll_interval: Duration,
}

impl Default for ReplayTimeouts {
    fn default() -> Self {
        Self {
            preview: Duration::from_secs(60),
            export: Duration::from_secs(60),
            success: Duration::from_secs(30),
            locate: Duration::from_secs(10),
            connections: Duration::from_secs(100),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    pub prepare_home: bool,
    /// Accepted for compatibility; replay always uses full file order.
    pub use_last_session: bool,
    pub policy: ErrorPolicy,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            prepare_home: true,
            use_last_session: false,
            policy: ErrorPolicy::FailFast,
        }
    }
}
