//! Resource existence gate
//!
//! Separates "make sure it exists" from "make sure it matches": callers only
//! ever compare against an object that was read back from the cluster.

use std::time::Duration;

use tracing::{debug, info};

use super::owner::{bind, OwnerCandidate};
use super::steps::StepContext;
use crate::resources::ResourceObject;
use crate::Error;

/// Result of [`ensure_exists`]
#[derive(Debug)]
pub enum Existence {
    /// The object was already present; here is the live copy
    Exists(ResourceObject),
    /// The object was just created; read it back after the delay
    Requeue(Duration),
}

/// Bind the owner onto `expected`, then create it if nothing with the same
/// identity exists.
///
/// A create that loses a race (`AlreadyExists`) counts as created.
pub async fn ensure_exists(
    ctx: &StepContext<'_>,
    owner: &OwnerCandidate,
    expected: &mut ResourceObject,
) -> Result<Existence, Error> {
    bind(ctx.store, owner, expected).await?;

    let kind = expected.kind();
    let id = expected.identity();

    if let Some(observed) = ctx.store.get(kind, &id).await? {
        debug!(%kind, name = %id, "resource exists");
        return Ok(Existence::Exists(observed));
    }

    info!(%kind, name = %id, "creating resource");
    match ctx.store.create(expected).await {
        Ok(_) => {}
        Err(e) if e.is_already_exists() => {
            debug!(%kind, name = %id, "resource created concurrently");
        }
        Err(e) => return Err(e),
    }

    if !ctx.timings.post_create_settle.is_zero() {
        tokio::time::sleep(ctx.timings.post_create_settle).await;
    }
    Ok(Existence::Requeue(ctx.timings.create_requeue))
}
