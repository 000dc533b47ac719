//! Flow construction and execution errors.

use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

/// Boxed underlying cause carried by a [`FlowExecError`].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Error type tag used when a step does not supply its own.
pub const INTERNAL_ERROR_TYPE: &str = "internal";

/// Error type tag for an unresolvable [`StepOutputRef`](crate::StepOutputRef).
pub const INVALID_REFERENCE_ERROR_TYPE: &str = "invalid_reference";

/// Which half of a step raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Forward,
    Backward,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

/// Error raised while building a flow.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlowError {
    /// A step input refers to a step that is not strictly earlier.
    #[error("Step {step_index} references output of step {referenced}, which does not precede it")]
    InvalidReference { step_index: usize, referenced: usize },
}

/// A failure of a step's forward or backward action.
///
/// Steps construct these with [`FlowExecError::new`]; the [`Executor`]
/// stamps `step_index`, `phase` and `failing_function` before recording it
/// on the flow.
///
/// [`Executor`]: crate::Executor
#[derive(Debug, thiserror::Error)]
#[error("{description}: {error}")]
pub struct FlowExecError {
    /// Human-readable summary suitable for diagnostics (and for users when
    /// `is_user_facing` is set).
    pub description: String,
    /// The underlying cause.
    #[source]
    pub error: BoxError,
    /// Stable machine-readable tag, e.g. `"no_cluster_available"`.
    pub error_type: String,
    /// Whether the caller may show `description` to an end user.
    pub is_user_facing: bool,
    /// `"<step name>::<phase>"` of the action that failed.
    pub failing_function: Option<String>,
    /// Index of the step the action belongs to.
    pub step_index: Option<usize>,
    pub phase: Option<StepPhase>,
}

impl FlowExecError {
    pub fn new(
        error_type: impl Into<String>,
        description: impl Into<String>,
        error: impl Into<BoxError>,
    ) -> Self {
        Self {
            description: description.into(),
            error: error.into(),
            error_type: error_type.into(),
            is_user_facing: false,
            failing_function: None,
            step_index: None,
            phase: None,
        }
    }

    /// Shorthand for an internal, non user-facing failure.
    pub fn internal(description: impl Into<String>, error: impl Into<BoxError>) -> Self {
        Self::new(INTERNAL_ERROR_TYPE, description, error)
    }

    /// Mark the error as safe to surface to the end user.
    pub fn user_facing(mut self) -> Self {
        self.is_user_facing = true;
        self
    }

    pub(crate) fn located(mut self, step_index: usize, step_name: &str, phase: StepPhase) -> Self {
        self.step_index = Some(step_index);
        self.phase = Some(phase);
        self.failing_function = Some(format!("{step_name}::{phase}"));
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_description_and_cause() {
        let err = FlowExecError::internal("Unable to save schedule", "connection reset");
        assert_eq!(err.to_string(), "Unable to save schedule: connection reset");
        assert_eq!(err.error_type, INTERNAL_ERROR_TYPE);
        assert!(!err.is_user_facing);
    }

    #[test]
    fn located_stamps_function_name() {
        let err = FlowExecError::new("publish", "Unable to dispatch", "timeout")
            .user_facing()
            .located(2, "dispatch_schedule", StepPhase::Forward);
        assert_eq!(err.step_index, Some(2));
        assert_eq!(err.failing_function.as_deref(), Some("dispatch_schedule::forward"));
        assert!(err.is_user_facing);
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = FlowExecError::internal("Unable to write", io);
        let source = StdError::source(&err).expect("source");
        assert_eq!(source.to_string(), "disk full");
    }
}
