//! Licensing and metrics services

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{
    licensing_name, metrics_labels, object_meta, resource_labels, selector_labels,
    uses_service_ca, CERT_SECRET_NAME, LICENSING_PORT, METRICS_CERT_SECRET_NAME, METRICS_PORT,
    METRICS_SERVICE_NAME, SERVING_CERT_ANNOTATION,
};
use crate::crd::ResolvedSpec;
use crate::resources::ObjectIdentity;

fn service(
    spec: &ResolvedSpec,
    name: &str,
    labels: BTreeMap<String, String>,
    cert_secret: &str,
    port_name: &str,
    port: i32,
) -> Service {
    let mut metadata = object_meta(spec, name, labels);
    if uses_service_ca(spec) {
        metadata.annotations = Some(BTreeMap::from([(
            SERVING_CERT_ANNOTATION.to_string(),
            cert_secret.to_string(),
        )]));
    }

    Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(spec)),
            ports: Some(vec![ServicePort {
                name: Some(port_name.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service in front of the License Service API
pub fn licensing_service(spec: &ResolvedSpec) -> Service {
    service(
        spec,
        &licensing_name(spec),
        resource_labels(spec),
        CERT_SECRET_NAME,
        "api-port",
        LICENSING_PORT,
    )
}

/// Service exposing License Service metrics to Prometheus
pub fn metrics_service(spec: &ResolvedSpec) -> Service {
    service(
        spec,
        METRICS_SERVICE_NAME,
        metrics_labels(spec),
        METRICS_CERT_SECRET_NAME,
        "metrics",
        METRICS_PORT,
    )
}

/// Identity of the metrics service, which also owns the marketplace objects
pub fn metrics_service_identity(spec: &ResolvedSpec) -> ObjectIdentity {
    ObjectIdentity::new(spec.instance.namespace.clone(), METRICS_SERVICE_NAME)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{openshift, resolved, resolved_with};
    use super::*;
    use crate::crd::IBMLicensingSpec;

    #[test]
    fn service_ca_annotation_requests_certificate() {
        let svc = licensing_service(&resolved());
        let annotations = svc.metadata.annotations.unwrap();
        assert_eq!(annotations[SERVING_CERT_ANNOTATION], CERT_SECRET_NAME);

        let metrics = metrics_service(&resolved());
        assert_eq!(
            metrics.metadata.annotations.unwrap()[SERVING_CERT_ANNOTATION],
            METRICS_CERT_SECRET_NAME
        );
    }

    #[test]
    fn http_services_carry_no_annotations() {
        let spec = resolved_with(
            IBMLicensingSpec {
                https_enable: Some(false),
                ..Default::default()
            },
            openshift(),
        );
        assert!(licensing_service(&spec).metadata.annotations.is_none());
    }

    #[test]
    fn metrics_service_identity_matches_built_service() {
        let spec = resolved();
        let svc = metrics_service(&spec);
        assert_eq!(ObjectIdentity::of(&svc), metrics_service_identity(&spec));
    }
}
