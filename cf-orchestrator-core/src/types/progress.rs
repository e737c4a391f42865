//! Progress events streamed while a bulk run executes

use serde::{Deserialize, Serialize};

use super::bulk::{BulkOperationResult, BulkSummary};

/// Terminal error message for a cancelled run
pub const CANCELLED_MESSAGE: &str = "Operation cancelled by user";

/// Stage of a bulk run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ApiCalls,
    Verification,
    CacheRefresh,
}

impl Phase {
    /// `(start, span)` of the phase on the 0-100 scale.
    pub fn weight(self) -> (u8, u8) {
        match self {
            Self::ApiCalls => (0, 20),
            Self::Verification => (20, 60),
            Self::CacheRefresh => (80, 20),
        }
    }

    /// Overall progress after `done` of `total` items of this phase.
    pub fn scaled(self, done: usize, total: usize) -> u8 {
        let (start, span) = self.weight();
        if total == 0 {
            return start + span;
        }
        let done = done.min(total);
        let offset = usize::from(span) * done / total;
        start + u8::try_from(offset).unwrap_or(span)
    }

    /// Progress within the phase only.
    pub fn local(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        u8::try_from(done.min(total) * 100 / total).unwrap_or(100)
    }
}

/// Phase information attached to progress events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub current: Phase,
    pub description: String,
    /// 0-100 within the phase
    pub progress: u8,
}

impl PhaseInfo {
    pub fn new(current: Phase, description: impl Into<String>, progress: u8) -> Self {
        Self {
            current,
            description: description.into(),
            progress,
        }
    }
}

/// One event of the progress stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Progress {
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_domain: Option<String>,
        completed_domains: usize,
        total_domains: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<PhaseInfo>,
    },
    DomainComplete {
        progress: u8,
        domain: BulkOperationResult,
        completed_domains: usize,
        total_domains: usize,
    },
    PhaseUpdate {
        progress: u8,
        phase: PhaseInfo,
    },
    Complete {
        progress: u8,
        summary: BulkSummary,
    },
    Error {
        progress: u8,
        error: String,
    },
}

impl ProgressEvent {
    pub fn progress(&self) -> u8 {
        match self {
            Self::Progress { progress, .. }
            | Self::DomainComplete { progress, .. }
            | Self::PhaseUpdate { progress, .. }
            | Self::Complete { progress, .. }
            | Self::Error { progress, .. } => *progress,
        }
    }

    pub(crate) fn set_progress(&mut self, value: u8) {
        match self {
            Self::Progress { progress, .. }
            | Self::DomainComplete { progress, .. }
            | Self::PhaseUpdate { progress, .. }
            | Self::Complete { progress, .. }
            | Self::Error { progress, .. } => *progress = value,
        }
    }

    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Error { error, .. } if error == CANCELLED_MESSAGE)
    }

    pub fn cancelled(progress: u8) -> Self {
        Self::Error {
            progress,
            error: CANCELLED_MESSAGE.to_string(),
        }
    }
}
