//! The IBMLicensing reconciliation engine
//!
//! One invocation runs an ordered [`Pipeline`] of steps. Each step pushes its
//! resource kind through the existence gate, the kind's comparator and the
//! convergence applier, and the first step that does not converge ends the
//! invocation with its outcome. Status is aggregated only after every step
//! converged.

mod apply;
mod compare;
mod gate;
mod licensing;
mod outcome;
mod owner;
mod pipeline;
mod runner;
mod status;
mod steps;

pub use apply::{apply_update, delete_resource};
pub use compare::{compare, Comparison};
pub use gate::{ensure_exists, Existence};
pub use licensing::{error_policy, reconcile, reconcile_instance, Context};
pub use outcome::Outcome;
pub use owner::{bind, OwnerCandidate};
pub use pipeline::Pipeline;
pub use runner::run;
pub use status::{compute_status, sync_status};
pub use steps::{
    instance_owner, AbsentStep, BuildFn, ConvergeStep, IdentitiesFn, OwnerFn, ReconcileStep,
    StepContext,
};
