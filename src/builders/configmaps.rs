//! Configuration maps consumed by License Service clients

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use super::{
    licensing_name, object_meta, resource_labels, CERT_SECRET_NAME, INFO_CONFIG_NAME,
    LICENSING_PORT, UPLOAD_CONFIG_NAME,
};
use crate::crd::ResolvedSpec;

fn service_url(spec: &ResolvedSpec) -> String {
    format!(
        "{}://{}.{}.svc:{}",
        spec.scheme(),
        licensing_name(spec),
        spec.instance.namespace,
        LICENSING_PORT
    )
}

/// Where usage data is uploaded to
pub fn upload_config_map(spec: &ResolvedSpec) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(spec, UPLOAD_CONFIG_NAME, resource_labels(spec)),
        data: Some(BTreeMap::from([
            ("url".to_string(), service_url(spec)),
            ("crtName".to_string(), CERT_SECRET_NAME.to_string()),
        ])),
        ..Default::default()
    }
}

/// How to reach License Service and which version runs
pub fn info_config_map(spec: &ResolvedSpec) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(spec, INFO_CONFIG_NAME, resource_labels(spec)),
        data: Some(BTreeMap::from([
            ("url".to_string(), service_url(spec)),
            ("version".to_string(), spec.version.clone()),
            ("httpsEnable".to_string(), spec.https_enable.to_string()),
        ])),
        ..Default::default()
    }
}
