//! External exposure: Ingress and OpenShift Route

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{licensing_name, object_meta, resource_labels, LICENSING_PORT};
use crate::crd::{ResolvedSpec, Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};

/// Ingress routing the configured path to the licensing service
pub fn licensing_ingress(spec: &ResolvedSpec) -> Ingress {
    let name = licensing_name(spec);
    let mut metadata = object_meta(spec, &name, resource_labels(spec));
    if !spec.ingress.annotations.is_empty() {
        metadata.annotations = Some(spec.ingress.annotations.clone());
    }

    let rule = IngressRule {
        host: (!spec.ingress.host.is_empty()).then(|| spec.ingress.host.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some(spec.ingress.path.clone()),
                path_type: "ImplementationSpecific".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: name.clone(),
                        port: Some(ServiceBackendPort {
                            number: Some(LICENSING_PORT),
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
            }],
        }),
    };

    Ingress {
        metadata,
        spec: Some(IngressSpec {
            rules: Some(vec![rule]),
            tls: if spec.ingress.tls.is_empty() {
                None
            } else {
                Some(spec.ingress.tls.clone())
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Route exposing the licensing service on OpenShift
pub fn licensing_route(spec: &ResolvedSpec) -> Route {
    let name = licensing_name(spec);
    let mut route = Route::new(
        &name,
        RouteSpec {
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: name.clone(),
                weight: Some(100),
            },
            port: Some(RoutePort {
                target_port: IntOrString::String("api-port".to_string()),
            }),
            tls: Some(TlsConfig {
                termination: spec.route_tls.termination,
                insecure_edge_termination_policy: Some(
                    spec.route_tls.insecure_edge_termination_policy,
                ),
                destination_ca_certificate: None,
            }),
            ..Default::default()
        },
    );
    route.metadata = object_meta(spec, &name, resource_labels(spec));
    route
}
