//! Local job state and the service-reported status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one work item as seen by the dispatcher.
///
/// Transitions only move forward: `Submitted → Running → {terminal}`, or
/// straight to a terminal state. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
    SubmissionError,
}

impl JobState {
    pub const ALL: [JobState; 7] = [
        JobState::Submitted,
        JobState::Running,
        JobState::Succeeded,
        JobState::Failed,
        JobState::Canceled,
        JobState::TimedOut,
        JobState::SubmissionError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::TimedOut => "timed_out",
            JobState::SubmissionError => "submission_error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Submitted | JobState::Running)
    }

    fn rank(self) -> u8 {
        match self {
            JobState::Submitted => 0,
            JobState::Running => 1,
            _ => 2,
        }
    }

    /// Moves to `next` if that is a forward transition. Returns false (and
    /// leaves `self` unchanged) when already terminal or `next` is earlier.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.is_terminal() || next.rank() < self.rank() {
            return false;
        }
        *self = next;
        true
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status as reported by the de-identification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl ExternalStatus {
    /// Parses the service's `status` field (case-insensitive).
    pub fn from_service(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "notstarted" => Some(ExternalStatus::NotStarted),
            "running" => Some(ExternalStatus::Running),
            "succeeded" => Some(ExternalStatus::Succeeded),
            "failed" => Some(ExternalStatus::Failed),
            "canceled" | "cancelled" => Some(ExternalStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExternalStatus::Succeeded | ExternalStatus::Failed | ExternalStatus::Canceled
        )
    }

    /// Local state that mirrors this status.
    pub fn job_state(self) -> JobState {
        match self {
            ExternalStatus::NotStarted => JobState::Submitted,
            ExternalStatus::Running => JobState::Running,
            ExternalStatus::Succeeded => JobState::Succeeded,
            ExternalStatus::Failed => JobState::Failed,
            ExternalStatus::Canceled => JobState::Canceled,
        }
    }
}

impl fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExternalStatus::NotStarted => "NotStarted",
            ExternalStatus::Running => "Running",
            ExternalStatus::Succeeded => "Succeeded",
            ExternalStatus::Failed => "Failed",
            ExternalStatus::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}
