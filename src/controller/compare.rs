//! Per-kind comparators
//!
//! Every comparator is a pure function of the expected and the observed
//! object. Fields are checked in a fixed order and the first difference wins,
//! so the reason in the log is stable from one invocation to the next.
//! Server-managed metadata (uid, resourceVersion, managedFields, status) is
//! never looked at.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use serde::Serialize;
use serde_json::Value;

use crate::builders::SERVING_CERT_ANNOTATION;
use crate::crd::{MeterDefinition, Route, ServiceMonitor};
use crate::resources::ResourceObject;
use crate::Error;

/// The only Service and ServiceMonitor annotations that are reconciled
const SERVICE_ANNOTATIONS: [&str; 1] = [SERVING_CERT_ANNOTATION];

/// Verdict of a comparator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Nothing to do
    Equal,
    /// Fixable with an update; the reason names the first differing field
    Differs(String),
    /// Cannot be fixed in place; the object must be deleted and recreated
    Incompatible(String),
}

/// Compare an expected object against the live object of the same identity
pub fn compare(expected: &ResourceObject, observed: &ResourceObject) -> Result<Comparison, Error> {
    use ResourceObject as R;

    let verdict = match (expected, observed) {
        // Random tokens: existence is all that matters
        (R::Secret(_), R::Secret(_)) => Comparison::Equal,
        (R::ConfigMap(e), R::ConfigMap(o)) => config_map(e, o),
        (R::Service(e), R::Service(o)) => service(e, o),
        (R::Deployment(e), R::Deployment(o)) => deployment(e, o)?,
        (R::Ingress(e), R::Ingress(o)) => ingress(e, o)?,
        (R::Route(e), R::Route(o)) => route(e, o),
        (R::MeterDefinition(e), R::MeterDefinition(o)) => meter_definition(e, o),
        (R::ServiceMonitor(e), R::ServiceMonitor(o)) => service_monitor(e, o),
        (R::NetworkPolicy(e), R::NetworkPolicy(o)) => network_policy(e, o)?,
        (e, o) => Comparison::Incompatible(format!(
            "kind differs: expected {}, found {}",
            e.kind(),
            o.kind()
        )),
    };
    Ok(verdict)
}

fn same_map(a: &Option<BTreeMap<String, String>>, b: &Option<BTreeMap<String, String>>) -> bool {
    let empty = BTreeMap::new();
    a.as_ref().unwrap_or(&empty) == b.as_ref().unwrap_or(&empty)
}

fn allowlisted_annotation_diff(
    keys: &[&str],
    expected: &Option<BTreeMap<String, String>>,
    observed: &Option<BTreeMap<String, String>>,
) -> Option<String> {
    keys.iter()
        .find(|key| {
            let e = expected.as_ref().and_then(|m| m.get(**key));
            let o = observed.as_ref().and_then(|m| m.get(**key));
            e != o
        })
        .map(|key| format!("annotation {key} differs"))
}

fn config_map(expected: &ConfigMap, observed: &ConfigMap) -> Comparison {
    if !same_map(&expected.data, &observed.data) {
        Comparison::Differs("data differs".to_string())
    } else if !same_map(&expected.metadata.labels, &observed.metadata.labels) {
        Comparison::Differs("labels differ".to_string())
    } else {
        Comparison::Equal
    }
}

fn service(expected: &Service, observed: &Service) -> Comparison {
    match allowlisted_annotation_diff(
        &SERVICE_ANNOTATIONS,
        &expected.metadata.annotations,
        &observed.metadata.annotations,
    ) {
        Some(reason) => Comparison::Differs(reason),
        None => Comparison::Equal,
    }
}

fn deployment(expected: &Deployment, observed: &Deployment) -> Result<Comparison, Error> {
    let expected = to_json(&expected.spec)?;
    let observed = to_json(&observed.spec)?;
    let empty = Value::Null;
    let template = |v: &Value| v.pointer("/template").cloned().unwrap_or(Value::Null);
    let (expected_tpl, observed_tpl) = (template(&expected), template(&observed));

    // Most specific first so the log names the field an operator cares about
    const ORDER: [(&str, &str); 7] = [
        ("/metadata/labels", "template.metadata.labels"),
        ("/metadata/annotations", "template.metadata.annotations"),
        ("/spec/containers", "template.spec.containers"),
        ("/spec/initContainers", "template.spec.initContainers"),
        ("/spec/volumes", "template.spec.volumes"),
        ("/spec/serviceAccountName", "template.spec.serviceAccountName"),
        ("/spec/imagePullSecrets", "template.spec.imagePullSecrets"),
    ];
    for (pointer, path) in ORDER {
        let e = expected_tpl.pointer(pointer).unwrap_or(&empty);
        let o = observed_tpl.pointer(pointer).unwrap_or(&empty);
        if let Some(at) = subset_diff(e, o, path) {
            return Ok(Comparison::Differs(format!("pod template differs at {at}")));
        }
    }

    Ok(match subset_diff(&expected, &observed, "spec") {
        Some(at) => Comparison::Differs(format!("deployment differs at {at}")),
        None => Comparison::Equal,
    })
}

fn ingress(expected: &Ingress, observed: &Ingress) -> Result<Comparison, Error> {
    if !same_map(&expected.metadata.labels, &observed.metadata.labels) {
        return Ok(Comparison::Differs("labels differ".to_string()));
    }
    if !same_map(&expected.metadata.annotations, &observed.metadata.annotations) {
        return Ok(Comparison::Differs("annotations differ".to_string()));
    }
    let diff = subset_diff(&to_json(&expected.spec)?, &to_json(&observed.spec)?, "spec");
    Ok(match diff {
        Some(at) => Comparison::Differs(format!("ingress differs at {at}")),
        None => Comparison::Equal,
    })
}

fn route(expected: &Route, observed: &Route) -> Comparison {
    if expected.metadata.name != observed.metadata.name {
        return Comparison::Differs("names differ".to_string());
    }
    if expected.spec.to.name != observed.spec.to.name {
        return Comparison::Differs("target name differs".to_string());
    }
    match (&expected.spec.tls, &observed.spec.tls) {
        (Some(_), None) => Comparison::Differs("found route has no TLS options".to_string()),
        (None, Some(_)) => Comparison::Differs("expected route has no TLS options".to_string()),
        (Some(e), Some(o))
            if e.termination != o.termination
                || e.insecure_edge_termination_policy != o.insecure_edge_termination_policy =>
        {
            Comparison::Differs("TLS options differ".to_string())
        }
        _ => Comparison::Equal,
    }
}

fn meter_definition(expected: &MeterDefinition, observed: &MeterDefinition) -> Comparison {
    if expected.spec.kind != observed.spec.kind {
        return Comparison::Differs("workload kind differs".to_string());
    }
    match (expected.spec.meters.first(), observed.spec.meters.first()) {
        (Some(_), None) => Comparison::Differs("meters missing".to_string()),
        (Some(e), Some(o)) if e.query != o.query => {
            Comparison::Differs("meter query differs".to_string())
        }
        _ => Comparison::Equal,
    }
}

fn service_monitor(expected: &ServiceMonitor, observed: &ServiceMonitor) -> Comparison {
    let scheme = |m: &ServiceMonitor| m.spec.endpoints.first().and_then(|e| e.scheme.clone());
    if scheme(expected) != scheme(observed) {
        return Comparison::Incompatible("endpoint scheme differs".to_string());
    }
    match allowlisted_annotation_diff(
        &SERVICE_ANNOTATIONS,
        &expected.metadata.annotations,
        &observed.metadata.annotations,
    ) {
        Some(reason) => Comparison::Differs(reason),
        None => Comparison::Equal,
    }
}

fn network_policy(expected: &NetworkPolicy, observed: &NetworkPolicy) -> Result<Comparison, Error> {
    if !same_map(&expected.metadata.labels, &observed.metadata.labels) {
        return Ok(Comparison::Differs("labels differ".to_string()));
    }
    let diff = subset_diff(&to_json(&expected.spec)?, &to_json(&observed.spec)?, "spec");
    Ok(match diff {
        Some(at) => Comparison::Differs(format!("network policy differs at {at}")),
        None => Comparison::Equal,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::serialization(e.to_string()))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// Path of the first place where `observed` does not contain `expected`.
///
/// Fields the API server adds (defaults, injected values) are ignored because
/// only keys present in `expected` are visited. An empty expected value
/// matches a missing one. Arrays must have the same length.
fn subset_diff(expected: &Value, observed: &Value, path: &str) -> Option<String> {
    match (expected, observed) {
        (Value::Object(e), Value::Object(o)) => e.iter().find_map(|(key, ev)| {
            let child = format!("{path}.{key}");
            match o.get(key) {
                Some(ov) => subset_diff(ev, ov, &child),
                None if is_empty(ev) => None,
                None => Some(child),
            }
        }),
        (Value::Array(e), Value::Array(o)) => {
            if e.len() != o.len() {
                return Some(path.to_string());
            }
            e.iter()
                .zip(o)
                .enumerate()
                .find_map(|(i, (ev, ov))| subset_diff(ev, ov, &format!("{path}[{i}]")))
        }
        (e, Value::Null) if is_empty(e) => None,
        (e, o) if e == o => None,
        (Value::String(e), Value::String(o)) if is_quantity_path(path) && same_quantity(e, o) => {
            None
        }
        _ => Some(path.to_string()),
    }
}

/// Container resource requests and limits, which the API server canonicalizes
fn is_quantity_path(path: &str) -> bool {
    path.contains(".resources.requests.") || path.contains(".resources.limits.")
}

fn same_quantity(a: &str, b: &str) -> bool {
    matches!((quantity_nanos(a), quantity_nanos(b)), (Some(a), Some(b)) if a == b)
}

/// Value of a Kubernetes quantity in billionths, rounded up like the API server
/// rounds sub-nano precision.
///
/// Returns `None` for anything unparseable or out of range; callers then fall
/// back to the plain string comparison.
fn quantity_nanos(quantity: &str) -> Option<i128> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);

    let (negative, number) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = format!("{whole}{fraction}");
    if digits.len() > 30 {
        return None;
    }
    let mantissa: i128 = digits.parse().ok()?;

    // Multiplier expressed in nanos
    let nano: i128 = 1_000_000_000;
    let multiplier = match suffix {
        "" => nano,
        "n" => 1,
        "u" => 1_000,
        "m" => 1_000_000,
        "k" => nano.checked_mul(10i128.pow(3))?,
        "M" => nano.checked_mul(10i128.pow(6))?,
        "G" => nano.checked_mul(10i128.pow(9))?,
        "T" => nano.checked_mul(10i128.pow(12))?,
        "P" => nano.checked_mul(10i128.pow(15))?,
        "E" => nano.checked_mul(10i128.pow(18))?,
        "Ki" => nano.checked_mul(1 << 10)?,
        "Mi" => nano.checked_mul(1 << 20)?,
        "Gi" => nano.checked_mul(1 << 30)?,
        "Ti" => nano.checked_mul(1 << 40)?,
        "Pi" => nano.checked_mul(1 << 50)?,
        "Ei" => nano.checked_mul(1 << 60)?,
        exponent => {
            let exponent: i32 = exponent
                .strip_prefix(['e', 'E'])
                .and_then(|e| e.parse().ok())?;
            let scale = 9 + exponent;
            if !(0..=27).contains(&scale) {
                return None;
            }
            10i128.pow(scale as u32)
        }
    };

    let scaled = mantissa.checked_mul(multiplier)?;
    let divisor = 10i128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
    let value = scaled.checked_add(divisor - 1)? / divisor;
    Some(if negative { -value } else { value })
}
