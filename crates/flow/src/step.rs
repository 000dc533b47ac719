use async_trait::async_trait;

use crate::error::FlowExecError;
use crate::prop::Prop;

/// One unit of forward work plus its compensation.
///
/// `backward` is a compensation, not an inverse: it receives the resolved
/// inputs the forward call was given together with everything the forward
/// call produced, and must be safe to invoke with exactly those.
#[async_trait]
pub trait Step: Send + Sync {
    /// Short identifier used in logs and in `failing_function`.
    fn name(&self) -> &str;

    async fn forward(&self, inputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError>;

    /// Defaults to a no-op for steps without side effects to undo.
    async fn backward(&self, _inputs: &[Prop], _outputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError> {
        Ok(Vec::new())
    }
}
