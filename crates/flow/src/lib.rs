//! Saga-style flow engine.
//!
//! A [`Flow`] is an ordered list of [`Step`]s, each with a forward action and
//! a compensating backward action. The [`Executor`] runs the forward actions
//! in order; when one fails it unwinds every previously-succeeded step by
//! calling its backward action in reverse order.
//!
//! Steps exchange data through [`Prop`]s. A step may declare that one of its
//! inputs is the output of an earlier step via [`StepOutputRef`]; the
//! executor resolves those references right before the step runs.

pub mod error;
pub mod executor;
pub mod flow;
pub mod prop;
pub mod step;

pub use error::{FlowError, FlowExecError, StepPhase};
pub use executor::Executor;
pub use flow::{Compensation, Flow, FlowStatus};
pub use prop::{Prop, StepInput, StepOutputRef};
pub use step::Step;
