//! Marketplace metering and monitoring objects
//!
//! All of these are owned by the metrics service rather than by the
//! IBMLicensing object, so they disappear together with it.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{
    metrics_labels, object_meta, resource_labels, selector_labels, METRICS_PORT,
    METRICS_SERVICE_NAME, NETWORK_POLICY_NAME, SERVICE_MONITOR_NAME,
};
use crate::crd::{
    Endpoint, EndpointTlsConfig, LabelFilter, MeterDefinition, MeterDefinitionSpec,
    MeterWorkload, NamespaceFilter, NamespaceSelector, ResolvedSpec, ResourceFilter,
    ServiceMonitor, ServiceMonitorSpec,
};
use crate::resources::ObjectIdentity;

const SERVICE_CA_BUNDLE: &str =
    "/etc/prometheus/configmaps/serving-certs-ca-bundle/service-ca.crt";

/// (name, metric id, query, description) of every meter definition
const METERS: [(&str, &str, &str, &str); 3] = [
    (
        "ibm-licensing-product-meter",
        "product_license_usage",
        "product_license_usage{}",
        "Licensed product usage per product",
    ),
    (
        "ibm-licensing-bundle-meter",
        "product_license_usage_details",
        "product_license_usage_details{}",
        "Licensed product usage per bundle",
    ),
    (
        "ibm-licensing-cloudpak-meter",
        "cloudpak_license_usage",
        "cloudpak_license_usage{}",
        "Licensed product usage per Cloud Pak",
    ),
];

/// Meter definitions reporting License Service metrics to the marketplace
pub fn meter_definitions(spec: &ResolvedSpec) -> Vec<MeterDefinition> {
    METERS
        .iter()
        .map(|(name, metric_id, query, description)| {
            let mut meter = MeterDefinition::new(
                name,
                MeterDefinitionSpec {
                    group: "operator.ibm.com".to_string(),
                    kind: "IBMLicensing".to_string(),
                    resource_filters: vec![ResourceFilter {
                        namespace: Some(NamespaceFilter {
                            use_operator_group: true,
                        }),
                        label: Some(LabelFilter {
                            label_selector: LabelSelector {
                                match_labels: Some(metrics_labels(spec)),
                                ..Default::default()
                            },
                        }),
                        workload_type: "Service".to_string(),
                    }],
                    meters: vec![MeterWorkload {
                        name: metric_id.to_string(),
                        aggregation: "max".to_string(),
                        period: "24h".to_string(),
                        query: query.to_string(),
                        metric_id: metric_id.to_string(),
                        workload_type: "Service".to_string(),
                        description: Some(description.to_string()),
                    }],
                },
            );
            meter.metadata = object_meta(spec, name, resource_labels(spec));
            meter
        })
        .collect()
}

/// Identities of [`meter_definitions`], for removal when metering is off
pub fn meter_definition_identities(spec: &ResolvedSpec) -> Vec<ObjectIdentity> {
    METERS
        .iter()
        .map(|(name, ..)| ObjectIdentity::new(spec.instance.namespace.clone(), *name))
        .collect()
}

/// ServiceMonitor scraping the metrics service
pub fn service_monitor(spec: &ResolvedSpec) -> ServiceMonitor {
    let tls_config = spec.https_enable.then(|| EndpointTlsConfig {
        ca_file: Some(SERVICE_CA_BUNDLE.to_string()),
        server_name: Some(format!(
            "{}.{}.svc",
            METRICS_SERVICE_NAME, spec.instance.namespace
        )),
    });

    let mut monitor = ServiceMonitor::new(
        SERVICE_MONITOR_NAME,
        ServiceMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(metrics_labels(spec)),
                ..Default::default()
            },
            namespace_selector: Some(NamespaceSelector {
                match_names: vec![spec.instance.namespace.clone()],
            }),
            endpoints: vec![Endpoint {
                port: Some("metrics".to_string()),
                scheme: Some(spec.scheme().to_string()),
                path: Some("/metrics".to_string()),
                interval: Some("1m".to_string()),
                tls_config,
            }],
        },
    );
    monitor.metadata = object_meta(spec, SERVICE_MONITOR_NAME, resource_labels(spec));
    monitor
}

/// NetworkPolicy admitting the cluster monitoring stack to the metrics port
pub fn network_policy(spec: &ResolvedSpec) -> NetworkPolicy {
    NetworkPolicy {
        metadata: object_meta(spec, NETWORK_POLICY_NAME, resource_labels(spec)),
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(selector_labels(spec)),
                ..Default::default()
            },
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![NetworkPolicyPeer {
                    namespace_selector: Some(LabelSelector {
                        match_labels: Some(BTreeMap::from([(
                            "network.openshift.io/policy-group".to_string(),
                            "monitoring".to_string(),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(METRICS_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
            }]),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{openshift, resolved, resolved_with};
    use super::*;
    use crate::crd::IBMLicensingSpec;

    #[test]
    fn meter_identities_match_built_definitions() {
        let spec = resolved();
        let built: Vec<_> = meter_definitions(&spec)
            .iter()
            .map(ObjectIdentity::of)
            .collect();
        assert_eq!(built, meter_definition_identities(&spec));
        assert!(meter_definitions(&spec).iter().all(|m| !m.spec.meters.is_empty()));
    }

    #[test]
    fn service_monitor_scheme_follows_https() {
        let monitor = service_monitor(&resolved());
        assert_eq!(monitor.spec.endpoints[0].scheme.as_deref(), Some("https"));
        assert!(monitor.spec.endpoints[0].tls_config.is_some());

        let http = resolved_with(
            IBMLicensingSpec {
                https_enable: Some(false),
                ..Default::default()
            },
            openshift(),
        );
        let monitor = service_monitor(&http);
        assert_eq!(monitor.spec.endpoints[0].scheme.as_deref(), Some("http"));
        assert!(monitor.spec.endpoints[0].tls_config.is_none());
    }

    #[test]
    fn network_policy_targets_licensing_pods() {
        let policy = network_policy(&resolved());
        let spec = policy.spec.unwrap();
        assert_eq!(
            spec.pod_selector.match_labels.unwrap()["licensing_cr"],
            "lic-1"
        );
        assert_eq!(spec.policy_types, Some(vec!["Ingress".to_string()]));
    }
}
