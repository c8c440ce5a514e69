//! Expected-object builders
//!
//! Pure functions from a [`ResolvedSpec`] to the objects the reconciliation
//! engine should find in the cluster. Apart from the random token secrets
//! (reconciled for existence only) every builder is deterministic, so two
//! calls with the same spec produce equal objects.

mod configmaps;
mod deployment;
mod exposure;
mod metering;
mod secrets;
mod services;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::crd::ResolvedSpec;

pub use configmaps::{info_config_map, upload_config_map};
pub use deployment::licensing_deployment;
pub use exposure::{licensing_ingress, licensing_route};
pub use metering::{meter_definition_identities, meter_definitions, network_policy, service_monitor};
pub use secrets::{api_token_secret, random_token, upload_token_secret};
pub use services::{licensing_service, metrics_service, metrics_service_identity};

/// Port License Service serves its API on
pub const LICENSING_PORT: i32 = 8080;
/// Port License Service exposes Prometheus metrics on
pub const METRICS_PORT: i32 = 8081;

/// Metrics ("prometheus") service name
pub const METRICS_SERVICE_NAME: &str = "ibm-licensing-service-prometheus";
/// Upload token secret name
pub const UPLOAD_TOKEN_NAME: &str = "ibm-licensing-upload-token";
/// Upload configuration map name
pub const UPLOAD_CONFIG_NAME: &str = "ibm-licensing-upload-config";
/// Info configuration map name
pub const INFO_CONFIG_NAME: &str = "ibm-licensing-info";
/// Secret holding the API certificate (service CA issued or user provided)
pub const CERT_SECRET_NAME: &str = "ibm-license-service-cert";
/// Secret holding the metrics endpoint certificate
pub const METRICS_CERT_SECRET_NAME: &str = "ibm-license-service-prometheus-cert";
/// ServiceMonitor name
pub const SERVICE_MONITOR_NAME: &str = "ibm-licensing-service-monitor";
/// NetworkPolicy name
pub const NETWORK_POLICY_NAME: &str = "ibm-licensing-service-prometheus";
/// Service account the workload runs as
pub const SERVICE_ACCOUNT_NAME: &str = "ibm-license-service";

/// Key of the API token in its secret
pub const API_TOKEN_KEY: &str = "token";
/// Key of the upload token in its secret
pub const UPLOAD_TOKEN_KEY: &str = "token-upload";

/// Annotation asking the OpenShift service CA for a serving certificate
pub const SERVING_CERT_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";

const COMPONENT: &str = "ibm-licensing-service-svc";
const METRICS_RELEASE: &str = "ibm-licensing-service-prometheus";

/// Name of the Deployment, Service, Ingress and Route of an instance
pub fn licensing_name(spec: &ResolvedSpec) -> String {
    format!("ibm-licensing-service-{}", spec.instance.name)
}

/// Labels selecting the licensing pods
pub fn selector_labels(spec: &ResolvedSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), licensing_name(spec)),
        ("component".to_string(), COMPONENT.to_string()),
        ("licensing_cr".to_string(), spec.instance.name.clone()),
    ])
}

/// Labels put on every dependent object
pub fn resource_labels(spec: &ResolvedSpec) -> BTreeMap<String, String> {
    let mut labels = selector_labels(spec);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        crate::FIELD_MANAGER.to_string(),
    );
    labels
}

/// Labels of the metrics service, matched by the ServiceMonitor
pub fn metrics_labels(spec: &ResolvedSpec) -> BTreeMap<String, String> {
    let mut labels = resource_labels(spec);
    labels.insert("release".to_string(), METRICS_RELEASE.to_string());
    labels
}

/// Annotations marking the licensing pods as a licensed product
pub fn product_annotations() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "productName".to_string(),
            "IBM Cloud Platform Common Services".to_string(),
        ),
        (
            "productID".to_string(),
            "068a62892a1e4db39641342e592daa25".to_string(),
        ),
        ("productMetric".to_string(), "FREE".to_string()),
    ])
}

/// Whether the service CA issues the certificates for this instance
pub fn uses_service_ca(spec: &ResolvedSpec) -> bool {
    spec.https_enable
        && spec.service_ca
        && spec.https_certs_source == crate::crd::HttpsCertsSource::Ocp
}

fn object_meta(spec: &ResolvedSpec, name: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(spec.instance.namespace.clone()),
        labels: Some(labels),
        ..Default::default()
    }
}
