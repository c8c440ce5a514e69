//! The License Service workload

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction,
    LocalObjectReference, ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe,
    SecretKeySelector, SecretVolumeSource, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::{
    licensing_name, object_meta, product_annotations, resource_labels, selector_labels,
    uses_service_ca, API_TOKEN_KEY, CERT_SECRET_NAME, LICENSING_PORT, METRICS_CERT_SECRET_NAME,
    METRICS_PORT, SERVICE_ACCOUNT_NAME, UPLOAD_TOKEN_KEY, UPLOAD_TOKEN_NAME,
};
use crate::crd::{HttpsCertsSource, ResolvedSpec};

const SECRET_MODE: i32 = 420;
const CERTS_VOLUME: &str = "licensing-https-certs";
const CERTS_PATH: &str = "/opt/licensing/certs/";
const METRICS_CERTS_VOLUME: &str = "prometheus-https-certs";
const METRICS_CERTS_PATH: &str = "/opt/prometheus/certs/";

/// Deployment running License Service and, optionally, the usage sidecar
pub fn licensing_deployment(spec: &ResolvedSpec) -> Deployment {
    let name = licensing_name(spec);

    let mut containers = vec![licensing_container(spec)];
    if spec.usage.enabled {
        containers.push(usage_container(spec));
    }

    let init_containers = if uses_service_ca(spec) {
        let mut checks = vec![secret_check_container(
            spec,
            "ocp-secret-check",
            CERTS_VOLUME,
            CERTS_PATH,
        )];
        if spec.rhmp_enabled {
            checks.push(secret_check_container(
                spec,
                "ocp-prometheus-secret-check",
                METRICS_CERTS_VOLUME,
                METRICS_CERTS_PATH,
            ));
        }
        Some(checks)
    } else {
        None
    };

    let volumes = certificate_volumes(spec);

    Deployment {
        metadata: object_meta(spec, &name, resource_labels(spec)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(spec)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(resource_labels(spec)),
                    annotations: Some(product_annotations()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(SERVICE_ACCOUNT_NAME.to_string()),
                    image_pull_secrets: if spec.image_pull_secrets.is_empty() {
                        None
                    } else {
                        Some(
                            spec.image_pull_secrets
                                .iter()
                                .map(|name| LocalObjectReference { name: name.clone() })
                                .collect(),
                        )
                    },
                    init_containers,
                    containers,
                    volumes: if volumes.is_empty() {
                        None
                    } else {
                        Some(volumes)
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn licensing_container(spec: &ResolvedSpec) -> Container {
    let probe = |initial_delay: i32, period: i32, timeout: i32| Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/".to_string()),
            port: IntOrString::Int(LICENSING_PORT),
            scheme: Some(spec.scheme().to_ascii_uppercase()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        ..Default::default()
    };

    let mut env = vec![
        plain_env("DATASOURCE", &spec.datasource),
        plain_env("HTTPS_ENABLE", &spec.https_enable.to_string()),
        plain_env("LOGGING_LEVEL", spec.log_level.as_str()),
        EnvVar {
            name: "NAMESPACE".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.namespace".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        secret_env("LICENSING_API_TOKEN", &spec.api_secret_token, API_TOKEN_KEY),
        secret_env("LICENSING_UPLOAD_TOKEN", UPLOAD_TOKEN_NAME, UPLOAD_TOKEN_KEY),
    ];
    if spec.https_enable {
        env.push(plain_env(
            "HTTPS_CERTS_SOURCE",
            &spec.https_certs_source.to_string(),
        ));
    }

    let mounts = certificate_mounts(spec);

    Container {
        name: "license-service".to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        env: Some(env),
        ports: Some(vec![
            container_port("api-port", LICENSING_PORT),
            container_port("metrics", METRICS_PORT),
        ]),
        liveness_probe: Some(probe(120, 300, 30)),
        readiness_probe: Some(probe(60, 60, 20)),
        resources: Some(spec.resources.clone()),
        volume_mounts: if mounts.is_empty() {
            None
        } else {
            Some(mounts)
        },
        security_context: Some(restricted_security_context()),
        ..Default::default()
    }
}

fn usage_container(spec: &ResolvedSpec) -> Container {
    Container {
        name: "ibm-licensing-usage".to_string(),
        image: Some(spec.usage.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        env: Some(vec![secret_env(
            "LICENSING_API_TOKEN",
            &spec.api_secret_token,
            API_TOKEN_KEY,
        )]),
        resources: Some(spec.usage.resources.clone()),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    }
}

fn secret_check_container(
    spec: &ResolvedSpec,
    name: &str,
    volume: &str,
    path: &str,
) -> Container {
    let script = format!(
        r#"while true; do
  echo "$(date): Checking for ocp secret in {path}"
  ls {path}* && break
  echo "$(date): Required ocp secret not found ... try again in 30s"
  sleep 30
done
echo "$(date): All required secrets exist"
"#
    );
    Container {
        name: name.to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        command: Some(vec!["sh".to_string(), "-c".to_string(), script]),
        volume_mounts: Some(vec![VolumeMount {
            name: volume.to_string(),
            mount_path: path.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        security_context: Some(restricted_security_context()),
        ..Default::default()
    }
}

fn certificate_volumes(spec: &ResolvedSpec) -> Vec<Volume> {
    let secret_volume = |name: &str, secret: &str, optional: bool| Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            default_mode: Some(SECRET_MODE),
            optional: optional.then_some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut volumes = Vec::new();
    if uses_service_ca(spec) {
        // Issued asynchronously by the service CA; the init containers wait for it
        volumes.push(secret_volume(CERTS_VOLUME, CERT_SECRET_NAME, true));
        if spec.rhmp_enabled {
            volumes.push(secret_volume(
                METRICS_CERTS_VOLUME,
                METRICS_CERT_SECRET_NAME,
                true,
            ));
        }
    } else if spec.https_enable && spec.https_certs_source == HttpsCertsSource::Custom {
        volumes.push(secret_volume(CERTS_VOLUME, CERT_SECRET_NAME, false));
    }
    volumes
}

fn certificate_mounts(spec: &ResolvedSpec) -> Vec<VolumeMount> {
    certificate_volumes(spec)
        .into_iter()
        .map(|volume| VolumeMount {
            mount_path: if volume.name == METRICS_CERTS_VOLUME {
                METRICS_CERTS_PATH.to_string()
            } else {
                CERTS_PATH.to_string()
            },
            name: volume.name,
            read_only: Some(true),
            ..Default::default()
        })
        .collect()
}

fn plain_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

fn restricted_security_context() -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        privileged: Some(false),
        read_only_root_filesystem: Some(true),
        run_as_non_root: Some(true),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{openshift, resolved, resolved_with};
    use super::*;
    use crate::capabilities::CapabilitySnapshot;
    use crate::crd::IBMLicensingSpec;

    fn pod_spec(deployment: &Deployment) -> PodSpec {
        deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.clone())
            .expect("deployment should have a pod spec")
    }

    /// Story: on OpenShift the pod waits for the service CA certificates
    #[test]
    fn story_ocp_certificates_add_wait_containers() {
        let deployment = licensing_deployment(&resolved());
        let pod = pod_spec(&deployment);

        let init: Vec<_> = pod
            .init_containers
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(init, vec!["ocp-secret-check", "ocp-prometheus-secret-check"]);

        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(
            volumes[0].secret.as_ref().unwrap().optional,
            Some(true)
        );
    }

    /// Story: self-signed certificates need no volumes or init containers
    #[test]
    fn story_self_signed_pod_is_minimal() {
        let spec = resolved_with(IBMLicensingSpec::default(), CapabilitySnapshot::default());
        let pod = pod_spec(&licensing_deployment(&spec));

        assert!(pod.init_containers.is_none());
        assert!(pod.volumes.is_none());
        assert!(pod.containers[0].volume_mounts.is_none());
    }

    #[test]
    fn usage_sidecar_follows_toggle() {
        let spec = resolved_with(
            IBMLicensingSpec {
                usage_enabled: true,
                ..Default::default()
            },
            openshift(),
        );
        let pod = pod_spec(&licensing_deployment(&spec));
        assert_eq!(pod.containers.len(), 2);
        assert_eq!(pod.containers[1].name, "ibm-licensing-usage");

        let pod = pod_spec(&licensing_deployment(&resolved()));
        assert_eq!(pod.containers.len(), 1);
    }

    #[test]
    fn workload_references_the_token_secret() {
        let pod = pod_spec(&licensing_deployment(&resolved()));
        let env = pod.containers[0].env.clone().unwrap();
        let token = env
            .iter()
            .find(|e| e.name == "LICENSING_API_TOKEN")
            .and_then(|e| e.value_from.clone())
            .and_then(|v| v.secret_key_ref)
            .unwrap();
        assert_eq!(token.name, "ibm-licensing-token");
        assert_eq!(token.key, API_TOKEN_KEY);
    }

    #[test]
    fn selector_is_subset_of_pod_labels() {
        let deployment = licensing_deployment(&resolved());
        let spec = deployment.spec.unwrap();
        let selector = spec.selector.match_labels.unwrap();
        let labels = spec.template.metadata.unwrap().labels.unwrap();
        assert!(selector.iter().all(|(k, v)| labels.get(k) == Some(v)));
    }

    #[test]
    fn builder_is_deterministic() {
        let spec = resolved();
        assert_eq!(licensing_deployment(&spec), licensing_deployment(&spec));
    }
}
