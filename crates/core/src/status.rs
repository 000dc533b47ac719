//! Schedule lifecycle status and its forward-only state machine.
//!
//! Statuses are persisted as upper-case text (`PENDING`, `RUNNING`, ...) and
//! travel in status-update payloads with the same spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Execution status of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 4] = [
        ScheduleStatus::Pending,
        ScheduleStatus::Running,
        ScheduleStatus::Completed,
        ScheduleStatus::Failed,
    ];

    /// Return the persisted / wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Completed and Failed admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses reachable from `self`.
    ///
    /// Pending may jump straight to a terminal state because the start
    /// notification can be lost or arrive after the finish notification.
    pub fn valid_transitions(self) -> &'static [ScheduleStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Completed, Self::Failed],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition(self, to: ScheduleStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning a [`CoreError::Conflict`] for
    /// anything that is not a forward move.
    pub fn validate_transition(self, to: ScheduleStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid schedule transition: {self} -> {to}"
            )))
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown schedule status: {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for ScheduleStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
