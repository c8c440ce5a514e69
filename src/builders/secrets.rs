//! Token secrets

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::{object_meta, resource_labels, API_TOKEN_KEY, UPLOAD_TOKEN_KEY, UPLOAD_TOKEN_NAME};
use crate::crd::ResolvedSpec;

const TOKEN_LENGTH: usize = 24;

/// Random alphanumeric token of `length` characters
pub fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn token_secret(spec: &ResolvedSpec, name: &str, key: &str) -> Secret {
    Secret {
        metadata: object_meta(spec, name, resource_labels(spec)),
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([(
            key.to_string(),
            random_token(TOKEN_LENGTH),
        )])),
        ..Default::default()
    }
}

/// Secret holding the License Service API token
pub fn api_token_secret(spec: &ResolvedSpec) -> Secret {
    token_secret(spec, &spec.api_secret_token, API_TOKEN_KEY)
}

/// Secret holding the token used to upload usage data
pub fn upload_token_secret(spec: &ResolvedSpec) -> Secret {
    token_secret(spec, UPLOAD_TOKEN_NAME, UPLOAD_TOKEN_KEY)
}
