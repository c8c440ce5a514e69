//! Reconcile steps
//!
//! A step owns one resource kind. [`ConvergeStep`] drives its objects through
//! gate, compare and apply; [`AbsentStep`] removes objects that the current
//! configuration does not want.

use async_trait::async_trait;
use tracing::{debug, info};

use super::apply::{apply_update, delete_resource};
use super::compare::{compare, Comparison};
use super::gate::{ensure_exists, Existence};
use super::outcome::Outcome;
use super::owner::OwnerCandidate;
use crate::config::ReconcileTimings;
use crate::crd::ResolvedSpec;
use crate::resources::{ObjectIdentity, ResourceKind, ResourceObject};
use crate::store::ClusterStore;
use crate::Error;

/// Produces the expected objects of a step
pub type BuildFn = fn(&ResolvedSpec) -> Vec<ResourceObject>;

/// Produces the owner of a step's objects
pub type OwnerFn = fn(&ResolvedSpec) -> OwnerCandidate;

/// Produces the identities of objects that must not exist
pub type IdentitiesFn = fn(&ResolvedSpec) -> Vec<ObjectIdentity>;

/// Collaborators shared by all steps of one invocation
pub struct StepContext<'a> {
    /// Cluster access
    pub store: &'a dyn ClusterStore,
    /// Requeue and settle delays
    pub timings: &'a ReconcileTimings,
}

/// One resource kind's unit of work within the pipeline
#[async_trait]
pub trait ReconcileStep: Send + Sync {
    /// Kind tag used in logs
    fn kind(&self) -> ResourceKind;

    /// Converge this step's objects; anything but `Converged` stops the pipeline
    async fn run(&self, ctx: &StepContext<'_>, spec: &ResolvedSpec) -> Result<Outcome, Error>;
}

/// Owner of objects bound directly to the IBMLicensing
pub fn instance_owner(spec: &ResolvedSpec) -> OwnerCandidate {
    OwnerCandidate::Instance(spec.instance.clone())
}

/// Create missing objects and correct drifted ones
pub struct ConvergeStep {
    kind: ResourceKind,
    build: BuildFn,
    owner: OwnerFn,
}

impl ConvergeStep {
    /// Step for `kind` whose objects are owned by the IBMLicensing
    pub fn new(kind: ResourceKind, build: BuildFn) -> Self {
        Self {
            kind,
            build,
            owner: instance_owner,
        }
    }

    /// Use a different owner for this step's objects
    pub fn owned_by(mut self, owner: OwnerFn) -> Self {
        self.owner = owner;
        self
    }
}

#[async_trait]
impl ReconcileStep for ConvergeStep {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn run(&self, ctx: &StepContext<'_>, spec: &ResolvedSpec) -> Result<Outcome, Error> {
        let owner = (self.owner)(spec);

        for mut expected in (self.build)(spec) {
            if expected.kind() != self.kind {
                return Err(Error::build(
                    self.kind.as_str(),
                    format!("builder produced a {}", expected.kind()),
                ));
            }

            let observed = match ensure_exists(ctx, &owner, &mut expected).await? {
                Existence::Exists(observed) => observed,
                Existence::Requeue(delay) => return Ok(Outcome::Requeue(delay)),
            };

            let id = expected.identity();
            match compare(&expected, &observed)? {
                Comparison::Equal => {
                    debug!(kind = %self.kind, name = %id, "resource up to date");
                }
                Comparison::Differs(reason) => {
                    info!(kind = %self.kind, name = %id, %reason, "resource drifted, updating");
                    let outcome = apply_update(ctx, expected, &observed).await?;
                    if !outcome.is_converged() {
                        return Ok(outcome);
                    }
                }
                Comparison::Incompatible(reason) => {
                    info!(kind = %self.kind, name = %id, %reason, "resource incompatible, recreating");
                    return delete_resource(ctx, self.kind, &id).await;
                }
            }
        }
        Ok(Outcome::Converged)
    }
}

/// Delete objects that should not exist under the current configuration
pub struct AbsentStep {
    kind: ResourceKind,
    identities: IdentitiesFn,
}

impl AbsentStep {
    /// Step removing the `kind` objects named by `identities`
    pub fn new(kind: ResourceKind, identities: IdentitiesFn) -> Self {
        Self { kind, identities }
    }
}

#[async_trait]
impl ReconcileStep for AbsentStep {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn run(&self, ctx: &StepContext<'_>, spec: &ResolvedSpec) -> Result<Outcome, Error> {
        for id in (self.identities)(spec) {
            if ctx.store.get(self.kind, &id).await?.is_some() {
                info!(kind = %self.kind, name = %id, "resource no longer wanted, deleting");
                return delete_resource(ctx, self.kind, &id).await;
            }
        }
        Ok(Outcome::Converged)
    }
}
