//! Flow: an ordered list of steps and everything recorded while running them.

use std::fmt;

use crate::error::{FlowError, FlowExecError};
use crate::prop::{Prop, StepInput};
use crate::step::Step;

/// Execution status of a [`Flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Created,
    Executing,
    Passed,
    Failed,
}

/// Outputs of one successful backward call.
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    pub step_index: usize,
    pub outputs: Vec<Prop>,
}

/// An ordered saga of steps.
///
/// `inputs` always has one entry per step. `forward_outputs` grows by one
/// entry per successful forward call, so its length is the number of steps
/// that completed.
pub struct Flow {
    name: String,
    steps: Vec<Box<dyn Step>>,
    inputs: Vec<Vec<StepInput>>,
    pub(crate) resolved_inputs: Vec<Vec<Prop>>,
    pub(crate) forward_outputs: Vec<Vec<Prop>>,
    pub(crate) backward_outputs: Vec<Compensation>,
    pub(crate) errors: Vec<FlowExecError>,
    pub(crate) status: FlowStatus,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            inputs: Vec::new(),
            resolved_inputs: Vec::new(),
            forward_outputs: Vec::new(),
            backward_outputs: Vec::new(),
            errors: Vec::new(),
            status: FlowStatus::Created,
        }
    }

    /// Append a step and return its index.
    ///
    /// Every [`StepInput::StepOutput`] must reference a step added before
    /// this one.
    pub fn add_step<S: Step + 'static>(
        &mut self,
        step: S,
        inputs: Vec<StepInput>,
    ) -> Result<usize, FlowError> {
        let step_index = self.steps.len();
        if let Some(referenced) = inputs
            .iter()
            .filter_map(StepInput::dependency)
            .find(|&referenced| referenced >= step_index)
        {
            return Err(FlowError::InvalidReference {
                step_index,
                referenced,
            });
        }

        self.steps.push(Box::new(step));
        self.inputs.push(inputs);
        Ok(step_index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the step at `index`.
    pub fn step_name(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(|step| step.name())
    }

    /// Declared inputs, one entry per step.
    pub fn inputs(&self) -> &[Vec<StepInput>] {
        &self.inputs
    }

    /// Inputs as actually passed to each step that was invoked.
    pub fn resolved_inputs(&self) -> &[Vec<Prop>] {
        &self.resolved_inputs
    }

    /// Outputs of each step whose forward call succeeded, in step order.
    pub fn forward_outputs(&self) -> &[Vec<Prop>] {
        &self.forward_outputs
    }

    /// Outputs of each successful compensation, in the order they ran.
    pub fn backward_outputs(&self) -> &[Compensation] {
        &self.backward_outputs
    }

    /// The forward failure (if any) followed by compensation failures.
    pub fn errors(&self) -> &[FlowExecError] {
        &self.errors
    }

    /// The error that made the flow fail.
    pub fn first_error(&self) -> Option<&FlowExecError> {
        self.errors.first()
    }

    pub(crate) fn step(&self, index: usize) -> &dyn Step {
        self.steps[index].as_ref()
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step_names: Vec<&str> = self.steps.iter().map(|step| step.name()).collect();
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("steps", &step_names)
            .field("forward_outputs", &self.forward_outputs.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
