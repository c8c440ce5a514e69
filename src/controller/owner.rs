//! Owner-reference binding
//!
//! Dependent objects are garbage collected through controller owner
//! references. The owner is re-read from the cluster before every bind so the
//! reference always carries the UID of the live object.

use kube::Resource;
use tracing::debug;

use crate::resources::{ObjectIdentity, ResourceKind, ResourceObject};
use crate::store::ClusterStore;
use crate::Error;

/// The object a dependent resource should be owned by
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerCandidate {
    /// The IBMLicensing instance itself
    Instance(ObjectIdentity),
    /// Another dependent resource (the metrics service for marketplace objects)
    Resource(ResourceKind, ObjectIdentity),
}

impl OwnerCandidate {
    fn describe(&self) -> (String, String) {
        match self {
            Self::Instance(id) => ("IBMLicensing".to_string(), id.to_string()),
            Self::Resource(kind, id) => (kind.to_string(), id.to_string()),
        }
    }
}

/// Make the live `owner` the controller of `expected`.
///
/// Fails when the owner cannot be read, does not exist or has no UID yet.
pub async fn bind(
    store: &dyn ClusterStore,
    owner: &OwnerCandidate,
    expected: &mut ResourceObject,
) -> Result<(), Error> {
    let (kind, name) = owner.describe();

    let reference = match owner {
        OwnerCandidate::Instance(id) => store
            .get_licensing(id)
            .await?
            .ok_or_else(|| Error::owner(&kind, &name, "not found"))?
            .controller_owner_ref(&()),
        OwnerCandidate::Resource(owner_kind, id) => store
            .get(*owner_kind, id)
            .await?
            .ok_or_else(|| Error::owner(&kind, &name, "not found"))?
            .controller_owner_ref(),
    }
    .ok_or_else(|| Error::owner(&kind, &name, "has no uid"))?;

    debug!(owner_kind = %kind, owner = %name, uid = %reference.uid, "binding owner");
    expected.set_controller(reference);
    Ok(())
}
