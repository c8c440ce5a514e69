//! IBMLicensing reconciliation entry point

use std::sync::Arc;

use kube::runtime::controller::Action;
use tracing::{error, info, instrument, warn};

use super::outcome::Outcome;
use super::pipeline::Pipeline;
use super::status::sync_status;
use super::steps::StepContext;
use crate::capabilities::{CapabilityCache, CapabilityProbe, CapabilitySnapshot};
use crate::config::ControllerConfig;
use crate::crd::{resolve, IBMLicensing, ResolvedSpec};
use crate::resources::ObjectIdentity;
use crate::store::ClusterStore;
use crate::Error;

/// Shared state of the IBMLicensing controller
pub struct Context {
    /// Cluster access (trait object for testability)
    pub store: Arc<dyn ClusterStore>,
    /// Probe for optional cluster APIs
    pub probe: Arc<dyn CapabilityProbe>,
    /// Last known capabilities
    pub capabilities: CapabilityCache,
    /// Operator configuration
    pub config: ControllerConfig,
}

impl Context {
    /// Context starting with no known capabilities
    pub fn new(
        store: Arc<dyn ClusterStore>,
        probe: Arc<dyn CapabilityProbe>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            probe,
            capabilities: CapabilityCache::default(),
            config,
        }
    }
}

fn log_capabilities(caps: &CapabilitySnapshot, spec: &ResolvedSpec) {
    info!(
        route = caps.route_api,
        service_ca = caps.service_ca_api,
        odlm = caps.odlm_present,
        rhmp = spec.rhmp_enabled,
        usage = spec.usage.enabled,
        version = %spec.version,
        "features in effect"
    );
}

/// Run one reconciliation of the IBMLicensing `id`.
///
/// A missing instance has already been deleted; its dependents are garbage
/// collected and there is nothing to do.
pub async fn reconcile_instance(ctx: &Context, id: &ObjectIdentity) -> Result<Outcome, Error> {
    let caps = ctx.capabilities.refresh(ctx.probe.as_ref()).await;

    let Some(instance) = ctx.store.get_licensing(id).await? else {
        info!("IBMLicensing not found, nothing to reconcile");
        return Ok(Outcome::Converged);
    };

    let operand_version = &ctx.config.operand_version;
    let mut spec = instance.spec.clone();
    if spec.version.as_deref() != Some(operand_version.as_str()) {
        info!(from = ?spec.version, to = %operand_version, "stamping operand version");
        if let Err(e) = ctx.store.patch_licensing_version(id, operand_version).await {
            warn!(error = %e, "failed to update version in IBMLicensing");
        }
        spec.version = Some(operand_version.clone());
    }

    let resolved = resolve(&spec, id, &caps, operand_version)?;
    log_capabilities(&caps, &resolved);

    let step_ctx = StepContext {
        store: ctx.store.as_ref(),
        timings: &ctx.config.timings,
    };
    let outcome = Pipeline::for_instance(&resolved, &caps)
        .run(&step_ctx, &resolved)
        .await?;
    if !outcome.is_converged() {
        return Ok(outcome);
    }

    // Status goes onto the stored object, not the defaulted copy
    sync_status(ctx.store.as_ref(), &instance, &resolved).await?;
    info!("reconcile complete");
    Ok(Outcome::Converged)
}

/// Reconcile an IBMLicensing delivered by the controller runtime
#[instrument(skip(licensing, ctx), fields(licensing = %ObjectIdentity::of(licensing.as_ref())))]
pub async fn reconcile(licensing: Arc<IBMLicensing>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling IBMLicensing");
    let id = ObjectIdentity::of(licensing.as_ref());
    let outcome = reconcile_instance(&ctx, &id).await?;
    Ok(outcome.into_action(ctx.config.timings.resync))
}

/// Error policy for the controller
///
/// Validation and configuration errors wait for the object to change; all
/// other errors are retried after a fixed delay.
pub fn error_policy(licensing: Arc<IBMLicensing>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        licensing = %ObjectIdentity::of(licensing.as_ref()),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.config.timings.error_requeue)
    } else {
        Action::await_change()
    }
}
