//! Status aggregation
//!
//! The IBMLicensing status is a snapshot of the licensing pods' statuses. It
//! is only written when it changed, otherwise every write would trigger
//! another reconcile.

use chrono::{DateTime, Datelike, Utc};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tracing::{debug, info, warn};

use crate::builders::selector_labels;
use crate::crd::{IBMLicensing, IBMLicensingStatus, ResolvedSpec};
use crate::store::ClusterStore;
use crate::Error;

/// Stand-in for unset or zero probe times, which the API server drops
fn probe_time_sentinel() -> Time {
    Time(DateTime::<Utc>::default())
}

fn normalize(pod: Pod) -> PodStatus {
    let mut status = pod.status.unwrap_or_default();
    for condition in status.conditions.iter_mut().flatten() {
        let unset = match &condition.last_probe_time {
            None => true,
            Some(Time(t)) => t.year() <= 1,
        };
        if unset {
            condition.last_probe_time = Some(probe_time_sentinel());
        }
    }
    status
}

/// Status the instance should carry given the current pods
pub async fn compute_status(
    store: &dyn ClusterStore,
    spec: &ResolvedSpec,
) -> Result<IBMLicensingStatus, Error> {
    let pods = store
        .list_pods(&spec.instance.namespace, &selector_labels(spec))
        .await?;
    Ok(IBMLicensingStatus {
        licensing_pods: Some(pods.into_iter().map(normalize).collect()),
    })
}

/// Write the pod snapshot onto `instance` if it differs from the stored one.
///
/// Listing pods is fatal; a failed status write is only logged.
pub async fn sync_status(
    store: &dyn ClusterStore,
    instance: &IBMLicensing,
    spec: &ResolvedSpec,
) -> Result<(), Error> {
    let computed = compute_status(store, spec).await?;

    if instance.status.as_ref() == Some(&computed) {
        debug!("status up to date");
        return Ok(());
    }

    let pods = computed.licensing_pods.as_ref().map_or(0, Vec::len);
    info!(pods, "updating IBMLicensing status");
    if let Err(e) = store.patch_licensing_status(&spec.instance, &computed).await {
        warn!(error = %e, "failed to update status, License Service is not affected");
    }
    Ok(())
}
