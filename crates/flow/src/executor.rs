//! Saga executor.
//!
//! Runs a [`Flow`]'s forward actions strictly one after another. When the
//! forward action of step `k` fails, the flow is marked failed and the
//! backward actions of steps `k-1` down to `0` run in that order. Step `k`
//! itself is never compensated. Compensation failures are recorded on the
//! flow and never stop the unwind.

use crate::error::{FlowExecError, StepPhase, INVALID_REFERENCE_ERROR_TYPE};
use crate::flow::{Compensation, Flow, FlowStatus};
use crate::prop::{Prop, StepInput};

#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Run `flow` to completion and hand it back with its outputs, errors
    /// and final status recorded.
    ///
    /// A flow that is not in [`FlowStatus::Created`] is returned untouched.
    pub async fn run(&self, mut flow: Flow) -> Flow {
        if flow.status != FlowStatus::Created {
            tracing::warn!(
                flow = %flow.name(),
                status = ?flow.status,
                "Refusing to run flow that has already been executed"
            );
            return flow;
        }

        flow.status = FlowStatus::Executing;
        tracing::debug!(flow = %flow.name(), steps = flow.len(), "Executing flow");

        for step_index in 0..flow.len() {
            if let Err(err) = Self::run_forward(&mut flow, step_index).await {
                let step_name = flow.step(step_index).name().to_string();
                let err = err.located(step_index, &step_name, StepPhase::Forward);
                tracing::error!(
                    flow = %flow.name(),
                    step_index,
                    failing_function = err.failing_function.as_deref().unwrap_or_default(),
                    error_type = %err.error_type,
                    error = %err,
                    "Flow step failed, compensating",
                );
                flow.status = FlowStatus::Failed;
                flow.errors.push(err);
                Self::compensate(&mut flow, step_index).await;
                return flow;
            }
        }

        flow.status = FlowStatus::Passed;
        tracing::debug!(flow = %flow.name(), "Flow passed");
        flow
    }

    async fn run_forward(flow: &mut Flow, step_index: usize) -> Result<(), FlowExecError> {
        let resolved = resolve_inputs(flow, step_index)?;
        flow.resolved_inputs.push(resolved);

        let outputs = flow
            .step(step_index)
            .forward(&flow.resolved_inputs[step_index])
            .await?;
        flow.forward_outputs.push(outputs);
        Ok(())
    }

    /// Invoke backward for every step before `failed_index`, newest first.
    async fn compensate(flow: &mut Flow, failed_index: usize) {
        for step_index in (0..failed_index).rev() {
            let step = flow.step(step_index);
            let result = step
                .backward(
                    &flow.resolved_inputs[step_index],
                    &flow.forward_outputs[step_index],
                )
                .await;

            match result {
                Ok(outputs) => {
                    tracing::debug!(flow = %flow.name(), step_index, "Step compensated");
                    flow.backward_outputs.push(Compensation {
                        step_index,
                        outputs,
                    });
                }
                Err(err) => {
                    let step_name = step.name().to_string();
                    let err = err.located(step_index, &step_name, StepPhase::Backward);
                    tracing::error!(
                        flow = %flow.name(),
                        step_index,
                        failing_function = err.failing_function.as_deref().unwrap_or_default(),
                        error = %err,
                        "Compensation failed, continuing unwind",
                    );
                    flow.errors.push(err);
                }
            }
        }
    }
}

/// Materialize the declared inputs of `step_index` from earlier outputs.
fn resolve_inputs(flow: &Flow, step_index: usize) -> Result<Vec<Prop>, FlowExecError> {
    let mut resolved = Vec::new();
    for input in &flow.inputs()[step_index] {
        match input {
            StepInput::Value(prop) => resolved.push(prop.clone()),
            StepInput::StepOutput(reference) => {
                let outputs = flow.forward_outputs().get(reference.step_index).ok_or_else(|| {
                    invalid_reference(format!(
                        "Step {} has no recorded outputs",
                        reference.step_index
                    ))
                })?;
                match reference.output_index {
                    None => resolved.extend(outputs.iter().cloned()),
                    Some(output_index) => {
                        let prop = outputs.get(output_index).ok_or_else(|| {
                            invalid_reference(format!(
                                "Step {} produced {} outputs, index {output_index} requested",
                                reference.step_index,
                                outputs.len()
                            ))
                        })?;
                        resolved.push(prop.clone());
                    }
                }
            }
        }
    }
    Ok(resolved)
}

fn invalid_reference(message: String) -> FlowExecError {
    FlowExecError::new(
        INVALID_REFERENCE_ERROR_TYPE,
        "Unable to resolve step input",
        message,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
