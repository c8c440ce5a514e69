//! Result of one reconcile step or one whole invocation

use std::time::Duration;

use kube::runtime::controller::Action;

/// What the engine wants the trigger source to do next.
///
/// Errors travel separately as `Err(Error)`; only `Converged` lets the
/// pipeline continue with the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Everything this step manages matches the expected state
    Converged,
    /// Something was created or deleted; look again after the delay
    Requeue(Duration),
}

impl Outcome {
    /// True when the pipeline may proceed
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Map to a controller action; converged instances are resynced periodically
    pub fn into_action(self, resync: Duration) -> Action {
        match self {
            Self::Converged => Action::requeue(resync),
            Self::Requeue(delay) => Action::requeue(delay),
        }
    }
}
