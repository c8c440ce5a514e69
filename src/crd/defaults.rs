//! Default resolution for IBMLicensing specs
//!
//! Builders never see an `Option`: every optional spec field is filled here
//! from constants or from the current capability snapshot, and inconsistent
//! combinations are rejected before any dependent resource is touched.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::api::networking::v1::IngressTLS;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::licensing::{HttpsCertsSource, IBMLicensingSpec};
use super::thirdparty::{InsecureEdgeTerminationPolicy, TlsTermination};
use crate::capabilities::CapabilitySnapshot;
use crate::resources::ObjectIdentity;
use crate::Error;

const DEFAULT_IMAGE_REGISTRY: &str = "icr.io/cpopen/cpfs";
const DEFAULT_IMAGE_NAME: &str = "ibm-licensing";
const DEFAULT_USAGE_IMAGE_NAME: &str = "ibm-licensing-usage";
const DEFAULT_PULL_POLICY: &str = "IfNotPresent";
const DEFAULT_DATASOURCE: &str = "datacollector";
const DEFAULT_API_SECRET_TOKEN: &str = "ibm-licensing-token";
const DEFAULT_INGRESS_PATH: &str = "/ibm-licensing-service-instance";

const PULL_POLICIES: [&str; 3] = ["Always", "IfNotPresent", "Never"];
const DATASOURCES: [&str; 2] = ["datacollector", "metering"];

/// License Service log level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Regular operational logging
    #[default]
    Info,
    /// Debug logging
    Debug,
    /// Debug logging including request traces
    Verbose,
}

impl LogLevel {
    /// Value passed to License Service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Verbose => "VERBOSE",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "VERBOSE" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// Resolved ingress settings
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedIngress {
    /// HTTP path routed to License Service
    pub path: String,
    /// Host of the rule; empty means any host
    pub host: String,
    /// Annotations copied onto the Ingress
    pub annotations: BTreeMap<String, String>,
    /// TLS sections copied onto the Ingress
    pub tls: Vec<IngressTLS>,
}

/// Resolved route TLS settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRouteTls {
    /// Termination mode
    pub termination: TlsTermination,
    /// Policy for plain HTTP
    pub insecure_edge_termination_policy: InsecureEdgeTerminationPolicy,
}

/// Resolved usage sidecar settings
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedUsage {
    /// Run the sidecar
    pub enabled: bool,
    /// Full image reference
    pub image: String,
    /// Container resources
    pub resources: ResourceRequirements,
}

/// A fully defaulted IBMLicensing spec
///
/// This is the only input of the expected-object builders.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSpec {
    /// Identity of the IBMLicensing object; dependents live in its namespace
    pub instance: ObjectIdentity,
    /// License Service version
    pub version: String,
    /// Full License Service image reference
    pub image: String,
    /// Pull policy for all containers
    pub image_pull_policy: String,
    /// Image pull secret names
    pub image_pull_secrets: Vec<String>,
    /// Usage data source
    pub datasource: String,
    /// Serve the API over HTTPS
    pub https_enable: bool,
    /// Certificate origin
    pub https_certs_source: HttpsCertsSource,
    /// Whether the service CA annotates services with certificates
    pub service_ca: bool,
    /// Create an Ingress
    pub ingress_enabled: bool,
    /// Ingress settings
    pub ingress: ResolvedIngress,
    /// Create a Route (still subject to the route capability)
    pub route_enabled: bool,
    /// Route TLS settings
    pub route_tls: ResolvedRouteTls,
    /// Marketplace reporting toggle
    pub rhmp_enabled: bool,
    /// Usage sidecar
    pub usage: ResolvedUsage,
    /// Name of the API token secret
    pub api_secret_token: String,
    /// License Service log level
    pub log_level: LogLevel,
    /// License Service container resources
    pub resources: ResourceRequirements,
}

impl ResolvedSpec {
    /// `namespace/name` of the owning IBMLicensing, for messages
    pub fn instance_ref(&self) -> String {
        self.instance.to_string()
    }

    /// The HTTP scheme License Service listens with
    pub fn scheme(&self) -> &'static str {
        if self.https_enable {
            "https"
        } else {
            "http"
        }
    }
}

/// Fill every optional field of `spec` and validate the result.
///
/// Capability-dependent defaults (certificate source, route, marketplace)
/// come from `caps`; an unset version falls back to `operand_version`.
pub fn resolve(
    spec: &IBMLicensingSpec,
    instance: &ObjectIdentity,
    caps: &CapabilitySnapshot,
    operand_version: &str,
) -> Result<ResolvedSpec, Error> {
    let invalid = |msg: String| Error::validation(instance.to_string(), msg);

    let version = spec
        .version
        .clone()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| operand_version.to_string());

    let image_pull_policy = spec
        .image_pull_policy
        .clone()
        .unwrap_or_else(|| DEFAULT_PULL_POLICY.to_string());
    if !PULL_POLICIES.contains(&image_pull_policy.as_str()) {
        return Err(invalid(format!(
            "unknown imagePullPolicy '{image_pull_policy}'"
        )));
    }

    let datasource = spec
        .datasource
        .clone()
        .unwrap_or_else(|| DEFAULT_DATASOURCE.to_string());
    if !DATASOURCES.contains(&datasource.as_str()) {
        return Err(invalid(format!("unknown datasource '{datasource}'")));
    }

    let https_enable = spec.https_enable.unwrap_or(true);
    let https_certs_source = spec.https_certs_source.unwrap_or(if caps.service_ca_api {
        HttpsCertsSource::Ocp
    } else {
        HttpsCertsSource::SelfSigned
    });
    if !https_enable && https_certs_source == HttpsCertsSource::Custom {
        return Err(invalid(
            "httpsCertsSource 'custom' requires httpsEnable".to_string(),
        ));
    }
    if https_enable && https_certs_source == HttpsCertsSource::Ocp && !caps.service_ca_api {
        return Err(invalid(
            "httpsCertsSource 'ocp' requires the OpenShift service CA".to_string(),
        ));
    }

    let log_level = match spec.log_level.as_deref() {
        None => LogLevel::default(),
        Some(value) => LogLevel::parse(value)
            .ok_or_else(|| invalid(format!("unknown log level '{value}'")))?,
    };

    let ingress_options = spec.ingress_options.clone().unwrap_or_default();
    let ingress = ResolvedIngress {
        path: ingress_options
            .path
            .unwrap_or_else(|| DEFAULT_INGRESS_PATH.to_string()),
        host: ingress_options.host.unwrap_or_default(),
        annotations: ingress_options.annotations.unwrap_or_default(),
        tls: ingress_options.tls.unwrap_or_default(),
    };
    if !ingress.path.starts_with('/') {
        return Err(invalid(format!(
            "ingress path '{}' must start with '/'",
            ingress.path
        )));
    }

    let tls_options = spec
        .route_options
        .as_ref()
        .and_then(|o| o.tls.clone())
        .unwrap_or_default();
    let termination = tls_options.termination.unwrap_or(if https_enable {
        TlsTermination::Reencrypt
    } else {
        TlsTermination::Edge
    });
    if !https_enable && termination != TlsTermination::Edge {
        return Err(invalid(format!(
            "route termination '{termination}' requires httpsEnable"
        )));
    }
    let route_tls = ResolvedRouteTls {
        termination,
        insecure_edge_termination_policy: tls_options
            .insecure_edge_termination_policy
            .unwrap_or_default(),
    };

    let registry = spec
        .image_registry
        .clone()
        .unwrap_or_else(|| DEFAULT_IMAGE_REGISTRY.to_string());
    let image_name = spec
        .image_name
        .clone()
        .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string());
    let postfix = spec.image_tag_postfix.clone().unwrap_or_default();
    let image = format!("{registry}/{image_name}:{version}{postfix}");

    let usage_container = spec.usage_container.clone().unwrap_or_default();
    let usage = ResolvedUsage {
        enabled: spec.usage_enabled,
        image: format!(
            "{}/{}:{}{}",
            usage_container.image_registry.unwrap_or(registry),
            usage_container
                .image_name
                .unwrap_or_else(|| DEFAULT_USAGE_IMAGE_NAME.to_string()),
            version,
            usage_container.image_tag_postfix.unwrap_or(postfix),
        ),
        resources: usage_container
            .resources
            .unwrap_or_else(|| resources("100m", "128Mi", "300m", "256Mi")),
    };

    Ok(ResolvedSpec {
        instance: instance.clone(),
        version,
        image,
        image_pull_policy,
        image_pull_secrets: spec.image_pull_secrets.clone().unwrap_or_default(),
        datasource,
        https_enable,
        https_certs_source,
        service_ca: caps.service_ca_api,
        ingress_enabled: spec.ingress_enabled.unwrap_or(false),
        ingress,
        route_enabled: spec.route_enabled.unwrap_or(caps.route_api),
        route_tls,
        rhmp_enabled: spec.rhmp_enabled.unwrap_or(caps.metering_marketplace),
        usage,
        api_secret_token: spec
            .api_secret_token
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_SECRET_TOKEN.to_string()),
        log_level,
        resources: spec
            .resources
            .clone()
            .unwrap_or_else(|| resources("200m", "256Mi", "500m", "512Mi")),
    })
}

fn resources(cpu_req: &str, mem_req: &str, cpu_lim: &str, mem_lim: &str) -> ResourceRequirements {
    let pair = |cpu: &str, mem: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(mem.to_string())),
        ])
    };
    ResourceRequirements {
        requests: Some(pair(cpu_req, mem_req)),
        limits: Some(pair(cpu_lim, mem_lim)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{RouteOptions, RouteTlsOptions};

    fn instance() -> ObjectIdentity {
        ObjectIdentity::new("ns", "lic-1")
    }

    fn openshift() -> CapabilitySnapshot {
        CapabilitySnapshot {
            route_api: true,
            service_ca_api: true,
            odlm_present: true,
            metering_marketplace: true,
        }
    }

    fn plain() -> CapabilitySnapshot {
        CapabilitySnapshot::default()
    }

    /// Story: an empty spec on OpenShift gets the OpenShift-native defaults
    #[test]
    fn story_empty_spec_on_openshift() {
        let resolved = resolve(&IBMLicensingSpec::default(), &instance(), &openshift(), "1.4.1")
            .expect("empty spec should resolve");

        assert_eq!(resolved.version, "1.4.1");
        assert_eq!(resolved.image, "icr.io/cpopen/cpfs/ibm-licensing:1.4.1");
        assert!(resolved.https_enable);
        assert_eq!(resolved.https_certs_source, HttpsCertsSource::Ocp);
        assert!(resolved.route_enabled);
        assert!(!resolved.ingress_enabled);
        assert!(resolved.rhmp_enabled);
        assert_eq!(resolved.datasource, "datacollector");
        assert_eq!(resolved.log_level, LogLevel::Info);
        assert_eq!(resolved.route_tls.termination, TlsTermination::Reencrypt);
        assert_eq!(
            resolved.route_tls.insecure_edge_termination_policy,
            InsecureEdgeTerminationPolicy::Redirect
        );
        assert_eq!(resolved.api_secret_token, "ibm-licensing-token");
    }

    /// Story: on plain Kubernetes nothing OpenShift-specific is switched on
    #[test]
    fn story_empty_spec_on_plain_kubernetes() {
        let resolved = resolve(&IBMLicensingSpec::default(), &instance(), &plain(), "1.4.1")
            .expect("empty spec should resolve");

        assert_eq!(resolved.https_certs_source, HttpsCertsSource::SelfSigned);
        assert!(!resolved.route_enabled);
        assert!(!resolved.rhmp_enabled);
        assert!(!resolved.service_ca);
    }

    #[test]
    fn http_only_defaults_route_to_edge() {
        let spec = IBMLicensingSpec {
            https_enable: Some(false),
            ..Default::default()
        };
        let resolved = resolve(&spec, &instance(), &openshift(), "1.4.1").unwrap();
        assert_eq!(resolved.route_tls.termination, TlsTermination::Edge);
        assert_eq!(resolved.scheme(), "http");
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let spec = IBMLicensingSpec {
            version: Some("1.5.0".to_string()),
            image_registry: Some("quay.io/acme".to_string()),
            image_tag_postfix: Some("-amd64".to_string()),
            log_level: Some("debug".to_string()),
            rhmp_enabled: Some(false),
            route_options: Some(RouteOptions {
                tls: Some(RouteTlsOptions {
                    termination: Some(TlsTermination::Passthrough),
                    insecure_edge_termination_policy: Some(InsecureEdgeTerminationPolicy::None),
                }),
            }),
            ..Default::default()
        };
        let resolved = resolve(&spec, &instance(), &openshift(), "1.4.1").unwrap();
        assert_eq!(resolved.image, "quay.io/acme/ibm-licensing:1.5.0-amd64");
        assert_eq!(resolved.usage.image, "quay.io/acme/ibm-licensing-usage:1.5.0-amd64");
        assert_eq!(resolved.log_level, LogLevel::Debug);
        assert!(!resolved.rhmp_enabled);
        assert_eq!(resolved.route_tls.termination, TlsTermination::Passthrough);
    }

    #[test]
    fn custom_certificates_require_https() {
        let spec = IBMLicensingSpec {
            https_enable: Some(false),
            https_certs_source: Some(HttpsCertsSource::Custom),
            ..Default::default()
        };
        let err = resolve(&spec, &instance(), &openshift(), "1.4.1").unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("ns/lic-1"));
    }

    #[test]
    fn ocp_certificates_require_service_ca() {
        let spec = IBMLicensingSpec {
            https_certs_source: Some(HttpsCertsSource::Ocp),
            ..Default::default()
        };
        assert!(resolve(&spec, &instance(), &plain(), "1.4.1").is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let spec = IBMLicensingSpec {
            log_level: Some("LOUD".to_string()),
            ..Default::default()
        };
        let err = resolve(&spec, &instance(), &openshift(), "1.4.1").unwrap_err();
        assert!(err.to_string().contains("unknown log level 'LOUD'"));
    }

    #[test]
    fn reencrypt_route_requires_https() {
        let spec = IBMLicensingSpec {
            https_enable: Some(false),
            route_options: Some(RouteOptions {
                tls: Some(RouteTlsOptions {
                    termination: Some(TlsTermination::Reencrypt),
                    insecure_edge_termination_policy: None,
                }),
            }),
            ..Default::default()
        };
        assert!(resolve(&spec, &instance(), &openshift(), "1.4.1").is_err());
    }

    #[test]
    fn ingress_path_must_be_absolute() {
        let spec = IBMLicensingSpec {
            ingress_options: Some(crate::crd::IngressOptions {
                path: Some("licensing".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(resolve(&spec, &instance(), &plain(), "1.4.1").is_err());
    }
}
