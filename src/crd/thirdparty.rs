//! Third-party custom resources the operator manages
//!
//! Only the fields the builders set or the comparators read are declared;
//! everything else the API server returns is ignored on deserialization.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// OpenShift Route (route.openshift.io/v1)
// =============================================================================

/// Route exposing the licensing service on OpenShift
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    plural = "routes",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Externally reachable host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Path the router watches for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Backend the route points at
    pub to: RouteTargetReference,

    /// Target port on the backend service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Route backend reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// Referent kind, always `Service` here
    pub kind: String,
    /// Referent name
    pub name: String,
    /// Relative weight among backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// Route target port
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port name or number on the backend service
    pub target_port: IntOrString,
}

/// Route TLS settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Where TLS is terminated
    pub termination: TlsTermination,

    /// What to do with plain HTTP traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<InsecureEdgeTerminationPolicy>,

    /// CA certificate used to validate the backend for reencrypt routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ca_certificate: Option<String>,
}

/// Route TLS termination mode
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsTermination {
    /// Terminate at the router
    #[default]
    Edge,
    /// Pass encrypted traffic straight to the backend
    Passthrough,
    /// Terminate at the router and re-encrypt towards the backend
    Reencrypt,
}

impl std::fmt::Display for TlsTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Edge => write!(f, "edge"),
            Self::Passthrough => write!(f, "passthrough"),
            Self::Reencrypt => write!(f, "reencrypt"),
        }
    }
}

/// Route policy for insecure (HTTP) connections
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum InsecureEdgeTerminationPolicy {
    /// Serve HTTP alongside HTTPS
    Allow,
    /// Reject HTTP
    None,
    /// Redirect HTTP to HTTPS
    #[default]
    Redirect,
}

// =============================================================================
// Red Hat Marketplace MeterDefinition (marketplace.redhat.com/v1beta1)
// =============================================================================

/// Marketplace metering rule for License Service metrics
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "marketplace.redhat.com",
    version = "v1beta1",
    kind = "MeterDefinition",
    plural = "meterdefinitions",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MeterDefinitionSpec {
    /// API group of the metered workload owner
    pub group: String,

    /// Kind of the metered workload owner
    pub kind: String,

    /// Filters selecting the workloads to meter
    #[serde(default)]
    pub resource_filters: Vec<ResourceFilter>,

    /// Meters reported for the selected workloads
    #[serde(default)]
    pub meters: Vec<MeterWorkload>,
}

/// Workload filter of a MeterDefinition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFilter {
    /// Restrict to the operator group namespaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceFilter>,

    /// Restrict to workloads carrying these labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelFilter>,

    /// Workload type (`Service`, `Pod`, ...)
    pub workload_type: String,
}

/// Namespace part of a resource filter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceFilter {
    /// Use the namespaces of the operator group
    pub use_operator_group: bool,
}

/// Label part of a resource filter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelFilter {
    /// Selector the workload labels must match
    pub label_selector: LabelSelector,
}

/// A single meter of a MeterDefinition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeterWorkload {
    /// Meter name
    pub name: String,
    /// Aggregation function over the period
    pub aggregation: String,
    /// Aggregation period
    pub period: String,
    /// PromQL query producing the metered value
    pub query: String,
    /// Metric identifier reported to the marketplace
    pub metric_id: String,
    /// Workload type the query applies to
    pub workload_type: String,
    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Prometheus Operator ServiceMonitor (monitoring.coreos.com/v1)
// =============================================================================

/// Scrape configuration for the License Service metrics endpoint
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    plural = "servicemonitors",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    /// Services to scrape
    pub selector: LabelSelector,

    /// Namespaces the selector applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<NamespaceSelector>,

    /// Scrape endpoints
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// ServiceMonitor namespace selector
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    /// Explicit namespace names
    #[serde(default)]
    pub match_names: Vec<String>,
}

/// ServiceMonitor scrape endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Service port name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// `http` or `https`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// HTTP path to scrape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Scrape interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// TLS settings for https scrapes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<EndpointTlsConfig>,
}

/// TLS settings of a scrape endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTlsConfig {
    /// CA bundle path inside the Prometheus pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    /// Expected server name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}
