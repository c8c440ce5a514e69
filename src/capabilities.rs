//! Optional cluster capability detection
//!
//! Several dependent resources only make sense when the cluster serves an
//! optional API (OpenShift routes, the service CA, the marketplace). The
//! probe answers "is this API usable from the watch namespace" with a cheap
//! list call; the cache keeps the last good answer so a failed probe never
//! blocks reconciliation.

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::Client;
use parking_lot::RwLock;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Optional APIs detected on the cluster
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    /// `route.openshift.io` Routes are served
    pub route_api: bool,
    /// The OpenShift service CA operator is present
    pub service_ca_api: bool,
    /// The Operand Deployment Lifecycle Manager is installed
    pub odlm_present: bool,
    /// Red Hat Marketplace metering (MeterDefinitions) is available
    pub metering_marketplace: bool,
}

/// Source of capability snapshots
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Detect the current capabilities.
    ///
    /// An individual API that cannot be listed is reported as absent; an
    /// error means the probe could not run at all.
    async fn probe(&self) -> Result<CapabilitySnapshot, Error>;
}

/// Probe backed by list calls against the API server
pub struct KubeCapabilityProbe {
    client: Client,
    namespace: Option<String>,
}

impl KubeCapabilityProbe {
    /// Create a probe listing in `namespace` (the watch namespace)
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    async fn namespaced_api_available(&self, namespace: &str, gvk: GroupVersionKind) -> bool {
        let resource = ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        self.list_one(api, &gvk).await
    }

    async fn cluster_api_available(&self, gvk: GroupVersionKind) -> bool {
        let resource = ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        self.list_one(api, &gvk).await
    }

    async fn list_one(&self, api: Api<DynamicObject>, gvk: &GroupVersionKind) -> bool {
        match api.list(&ListParams::default().limit(1)).await {
            Ok(_) => true,
            Err(e) => {
                debug!(kind = %gvk.kind, group = %gvk.group, error = %e, "optional API not available");
                false
            }
        }
    }
}

#[async_trait]
impl CapabilityProbe for KubeCapabilityProbe {
    async fn probe(&self) -> Result<CapabilitySnapshot, Error> {
        let namespace = self
            .namespace
            .as_deref()
            .ok_or_else(|| Error::config("WATCH_NAMESPACE not set, cannot probe optional APIs"))?;

        Ok(CapabilitySnapshot {
            route_api: self
                .namespaced_api_available(
                    namespace,
                    GroupVersionKind::gvk("route.openshift.io", "v1", "Route"),
                )
                .await,
            // ServiceCA is cluster scoped
            service_ca_api: self
                .cluster_api_available(GroupVersionKind::gvk(
                    "operator.openshift.io",
                    "v1",
                    "ServiceCA",
                ))
                .await,
            odlm_present: self
                .namespaced_api_available(
                    namespace,
                    GroupVersionKind::gvk("operator.ibm.com", "v1alpha1", "OperandBindInfo"),
                )
                .await,
            metering_marketplace: self
                .namespaced_api_available(
                    namespace,
                    GroupVersionKind::gvk("marketplace.redhat.com", "v1beta1", "MeterDefinition"),
                )
                .await,
        })
    }
}

/// Last known capability snapshot, shared by all reconciliations
#[derive(Debug, Default)]
pub struct CapabilityCache {
    current: RwLock<CapabilitySnapshot>,
}

impl CapabilityCache {
    /// Cache starting from `initial`
    pub fn new(initial: CapabilitySnapshot) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Copy of the last known snapshot
    pub fn snapshot(&self) -> CapabilitySnapshot {
        *self.current.read()
    }

    /// Re-probe the cluster.
    ///
    /// On failure the previous snapshot is kept and returned.
    pub async fn refresh(&self, probe: &dyn CapabilityProbe) -> CapabilitySnapshot {
        match probe.probe().await {
            Ok(snapshot) => {
                *self.current.write() = snapshot;
                snapshot
            }
            Err(e) => {
                let prior = self.snapshot();
                warn!(error = %e, ?prior, "capability probe failed, keeping previous values");
                prior
            }
        }
    }
}
