//! Kind-polymorphic model of the dependent resources
//!
//! [`ResourceObject`] wraps every kind the operator manages behind one enum so
//! the reconciliation engine can create, compare, update and delete them
//! without knowing which concrete type it holds. [`ResourceKind`] is the
//! explicit tag used in logs and for store dispatch.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

use crate::crd::{MeterDefinition, Route, ServiceMonitor};

/// Kind tag of a dependent resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// core/v1 Secret
    Secret,
    /// core/v1 ConfigMap
    ConfigMap,
    /// apps/v1 Deployment
    Deployment,
    /// core/v1 Service
    Service,
    /// networking.k8s.io/v1 Ingress
    Ingress,
    /// route.openshift.io/v1 Route
    Route,
    /// marketplace.redhat.com/v1beta1 MeterDefinition
    MeterDefinition,
    /// monitoring.coreos.com/v1 ServiceMonitor
    ServiceMonitor,
    /// networking.k8s.io/v1 NetworkPolicy
    NetworkPolicy,
}

impl ResourceKind {
    /// Kind name as the API server spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::Ingress => "Ingress",
            Self::Route => "Route",
            Self::MeterDefinition => "MeterDefinition",
            Self::ServiceMonitor => "ServiceMonitor",
            Self::NetworkPolicy => "NetworkPolicy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace and name of an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentity {
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
}

impl ObjectIdentity {
    /// Identity from namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of any namespaced kube object
    pub fn of<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A dependent object of any managed kind
#[derive(Clone, Debug)]
pub enum ResourceObject {
    /// Token secret
    Secret(Secret),
    /// Configuration map
    ConfigMap(ConfigMap),
    /// Licensing workload
    Deployment(Deployment),
    /// Licensing or metrics service
    Service(Service),
    /// Ingress exposure
    Ingress(Ingress),
    /// OpenShift route exposure
    Route(Route),
    /// Marketplace meter definition
    MeterDefinition(MeterDefinition),
    /// Prometheus scrape configuration
    ServiceMonitor(ServiceMonitor),
    /// Metrics network isolation
    NetworkPolicy(NetworkPolicy),
}

/// Run `$body` with `$obj` bound to the wrapped object, whatever its kind
macro_rules! dispatch {
    ($value:expr, $obj:ident => $body:expr) => {
        match $value {
            ResourceObject::Secret($obj) => $body,
            ResourceObject::ConfigMap($obj) => $body,
            ResourceObject::Deployment($obj) => $body,
            ResourceObject::Service($obj) => $body,
            ResourceObject::Ingress($obj) => $body,
            ResourceObject::Route($obj) => $body,
            ResourceObject::MeterDefinition($obj) => $body,
            ResourceObject::ServiceMonitor($obj) => $body,
            ResourceObject::NetworkPolicy($obj) => $body,
        }
    };
}
pub(crate) use dispatch;

macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for ResourceObject {
                fn from(obj: $variant) -> Self {
                    Self::$variant(obj)
                }
            }
        )*
    };
}

impl_from!(
    Secret,
    ConfigMap,
    Deployment,
    Service,
    Ingress,
    Route,
    MeterDefinition,
    ServiceMonitor,
    NetworkPolicy,
);

impl ResourceObject {
    /// Kind tag of the wrapped object
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Secret(_) => ResourceKind::Secret,
            Self::ConfigMap(_) => ResourceKind::ConfigMap,
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::Service(_) => ResourceKind::Service,
            Self::Ingress(_) => ResourceKind::Ingress,
            Self::Route(_) => ResourceKind::Route,
            Self::MeterDefinition(_) => ResourceKind::MeterDefinition,
            Self::ServiceMonitor(_) => ResourceKind::ServiceMonitor,
            Self::NetworkPolicy(_) => ResourceKind::NetworkPolicy,
        }
    }

    /// Namespace and name of the wrapped object
    pub fn identity(&self) -> ObjectIdentity {
        dispatch!(self, obj => ObjectIdentity::of(obj))
    }

    /// Object metadata
    pub fn meta(&self) -> &ObjectMeta {
        dispatch!(self, obj => obj.meta())
    }

    /// Mutable object metadata
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        dispatch!(self, obj => obj.meta_mut())
    }

    /// Optimistic concurrency token
    pub fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }

    /// Replace the optimistic concurrency token
    pub fn set_resource_version(&mut self, version: Option<String>) {
        self.meta_mut().resource_version = version;
    }

    /// Controller owner reference pointing at this object.
    ///
    /// `None` until the object has been persisted and carries a UID.
    pub fn controller_owner_ref(&self) -> Option<OwnerReference> {
        dispatch!(self, obj => obj.controller_owner_ref(&()))
    }

    /// Make `owner` the single controller of this object
    pub fn set_controller(&mut self, owner: OwnerReference) {
        let refs = self.meta_mut().owner_references.get_or_insert_with(Vec::new);
        refs.retain(|r| r.controller != Some(true));
        refs.push(owner);
    }

    /// Copy fields the API server assigns and that must survive an update.
    ///
    /// Services keep their cluster IP(s); other kinds have none.
    pub fn adopt_server_assigned(&mut self, observed: &ResourceObject) {
        if let (Self::Service(expected), Self::Service(found)) = (self, observed) {
            if let (Some(spec), Some(found_spec)) = (expected.spec.as_mut(), found.spec.as_ref()) {
                spec.cluster_ip = found_spec.cluster_ip.clone();
                spec.cluster_ips = found_spec.cluster_ips.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;

    fn service(name: &str, cluster_ip: Option<&str>) -> ResourceObject {
        ResourceObject::Service(Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                uid: Some(format!("uid-{name}")),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(String::from),
                cluster_ips: cluster_ip.map(|ip| vec![ip.to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    #[test]
    fn identity_and_kind_come_from_the_wrapped_object() {
        let obj = service("metrics", None);
        assert_eq!(obj.kind(), ResourceKind::Service);
        assert_eq!(obj.identity(), ObjectIdentity::new("ns", "metrics"));
        assert_eq!(obj.identity().to_string(), "ns/metrics");
    }

    #[test]
    fn resource_version_round_trips() {
        let mut obj = service("svc", None);
        assert_eq!(obj.resource_version(), None);
        obj.set_resource_version(Some("42".to_string()));
        assert_eq!(obj.resource_version(), Some("42"));
    }

    #[test]
    fn service_keeps_server_assigned_cluster_ip() {
        let mut expected = service("svc", None);
        let observed = service("svc", Some("10.0.0.7"));
        expected.adopt_server_assigned(&observed);

        let ResourceObject::Service(svc) = expected else {
            panic!("expected a service");
        };
        let spec = svc.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(spec.cluster_ips, Some(vec!["10.0.0.7".to_string()]));
    }

    #[test]
    fn set_controller_replaces_previous_controller() {
        let owner_a = service("a", None).controller_owner_ref().unwrap();
        let owner_b = service("b", None).controller_owner_ref().unwrap();
        assert_eq!(owner_a.controller, Some(true));

        let mut obj = service("dependent", None);
        obj.set_controller(owner_a);
        obj.set_controller(owner_b.clone());

        let refs = obj.meta().owner_references.clone().unwrap();
        assert_eq!(refs, vec![owner_b]);
    }
}
