//! Step parameters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A described JSON value passed into or out of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    /// What the value is, for diagnostics (e.g. `"selected cluster"`).
    pub description: String,
    pub data: serde_json::Value,
}

impl Prop {
    pub fn new(description: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            description: description.into(),
            data,
        }
    }

    /// Serialize `value` into a prop.
    pub fn from_serialize<T: Serialize>(
        description: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(description, serde_json::to_value(value)?))
    }

    /// Deserialize the prop's data into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Reference to the forward output of an earlier step.
///
/// With `output_index` unset the reference expands to every prop the step
/// produced, in order; otherwise to the single prop at that position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutputRef {
    pub step_index: usize,
    pub output_index: Option<usize>,
    pub description: String,
}

/// A declared step input: a concrete value or a reference resolved at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    Value(Prop),
    StepOutput(StepOutputRef),
}

impl StepInput {
    /// All outputs of step `step_index`.
    pub fn output_of(step_index: usize, description: impl Into<String>) -> Self {
        Self::StepOutput(StepOutputRef {
            step_index,
            output_index: None,
            description: description.into(),
        })
    }

    /// The `output_index`-th output of step `step_index`.
    pub fn output_at(step_index: usize, output_index: usize, description: impl Into<String>) -> Self {
        Self::StepOutput(StepOutputRef {
            step_index,
            output_index: Some(output_index),
            description: description.into(),
        })
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Value(prop) => &prop.description,
            Self::StepOutput(reference) => &reference.description,
        }
    }

    /// Index of the step this input depends on, if any.
    pub fn dependency(&self) -> Option<usize> {
        match self {
            Self::Value(_) => None,
            Self::StepOutput(reference) => Some(reference.step_index),
        }
    }
}

impl From<Prop> for StepInput {
    fn from(prop: Prop) -> Self {
        Self::Value(prop)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
