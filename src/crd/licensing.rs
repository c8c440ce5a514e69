//! IBMLicensing Custom Resource Definition
//!
//! An IBMLicensing object describes one License Service instance. The spec is
//! user intent with every field optional; [`super::resolve`] turns it into a
//! fully concrete [`super::ResolvedSpec`] before any dependent resource is
//! built. The status is owned by the operator and only records the health of
//! the licensing pods.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PodStatus, ResourceRequirements};
use k8s_openapi::api::networking::v1::IngressTLS;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::thirdparty::{InsecureEdgeTerminationPolicy, TlsTermination};

/// Specification for an IBMLicensing instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.ibm.com",
    version = "v1alpha1",
    kind = "IBMLicensing",
    plural = "ibmlicensings",
    shortname = "ibml",
    status = "IBMLicensingStatus",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMLicensingSpec {
    /// License Service version, stamped by the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Registry the License Service image is pulled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<String>,

    /// License Service image name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    /// Suffix appended to the image tag (e.g. `-amd64`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag_postfix: Option<String>,

    /// Pull policy for every container of the workload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Names of secrets used to pull images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<String>>,

    /// Where License Service collects usage data from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,

    /// Serve the API over HTTPS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_enable: Option<bool>,

    /// Origin of the HTTPS certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_certs_source: Option<HttpsCertsSource>,

    /// Expose the API through an Ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_enabled: Option<bool>,

    /// Ingress tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_options: Option<IngressOptions>,

    /// Expose the API through an OpenShift Route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_enabled: Option<bool>,

    /// Route tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_options: Option<RouteOptions>,

    /// Report usage to Red Hat Marketplace (metrics service, meter definitions, monitoring)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhmp_enabled: Option<bool>,

    /// Run the usage sidecar container
    #[serde(default)]
    pub usage_enabled: bool,

    /// Usage sidecar overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_container: Option<UsageContainer>,

    /// Name of the secret holding the API token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret_token: Option<String>,

    /// License Service log level (`INFO`, `DEBUG`, `VERBOSE`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Resource requirements of the License Service container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Origin of the License Service HTTPS certificate
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpsCertsSource {
    /// Generated by License Service on startup
    SelfSigned,
    /// Provided by the user in the `ibm-license-service-cert` secret
    Custom,
    /// Issued by the OpenShift service CA
    Ocp,
}

impl std::fmt::Display for HttpsCertsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfSigned => write!(f, "self-signed"),
            Self::Custom => write!(f, "custom"),
            Self::Ocp => write!(f, "ocp"),
        }
    }
}

/// Ingress settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressOptions {
    /// HTTP path routed to License Service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Host the rule applies to; any host when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Extra annotations for the ingress controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// TLS sections copied to the Ingress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Vec<IngressTLS>>,
}

/// Route settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptions {
    /// Route TLS overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTlsOptions>,
}

/// Route TLS overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTlsOptions {
    /// TLS termination mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TlsTermination>,

    /// Policy for plain HTTP connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<InsecureEdgeTerminationPolicy>,
}

/// Usage sidecar overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageContainer {
    /// Registry of the usage image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<String>,

    /// Usage image name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    /// Suffix appended to the usage image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag_postfix: Option<String>,

    /// Resource requirements of the usage container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// Observed state of an IBMLicensing instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMLicensingStatus {
    /// Status of every License Service pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licensing_pods: Option<Vec<PodStatus>>,
}
