//! Convergence applier
//!
//! Updates always carry the resourceVersion that was observed. A rejected
//! update is never retried or merged locally: the live object is deleted and
//! the existence gate recreates it on a later invocation.

use tracing::{info, warn};

use super::outcome::Outcome;
use super::steps::StepContext;
use crate::resources::{ObjectIdentity, ResourceKind, ResourceObject};
use crate::Error;

/// Replace `observed` with `expected`, falling back to delete on rejection
pub async fn apply_update(
    ctx: &StepContext<'_>,
    mut expected: ResourceObject,
    observed: &ResourceObject,
) -> Result<Outcome, Error> {
    let kind = expected.kind();
    let id = expected.identity();

    expected.set_resource_version(observed.resource_version().map(String::from));
    expected.adopt_server_assigned(observed);

    match ctx.store.update(&expected).await {
        Ok(_) => {
            info!(%kind, name = %id, "updated resource");
            Ok(Outcome::Converged)
        }
        Err(e) if e.is_update_rejection() || e.is_not_found() => {
            warn!(%kind, name = %id, error = %e, "update rejected, deleting for recreation");
            delete_resource(ctx, kind, &id).await
        }
        Err(e) => Err(e),
    }
}

/// Delete an object; already gone counts as deleted
pub async fn delete_resource(
    ctx: &StepContext<'_>,
    kind: ResourceKind,
    id: &ObjectIdentity,
) -> Result<Outcome, Error> {
    match ctx.store.delete(kind, id).await {
        Ok(()) => info!(%kind, name = %id, "deleted resource"),
        Err(e) if e.is_not_found() => info!(%kind, name = %id, "resource already deleted"),
        Err(e) => return Err(e),
    }
    Ok(Outcome::Requeue(ctx.timings.delete_requeue))
}
