//! Convergence scenarios driven through the full reconcile entry point

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use licensing_operator::builders::{self, METRICS_SERVICE_NAME};
use licensing_operator::capabilities::{CapabilityProbe, CapabilitySnapshot};
use licensing_operator::config::{ControllerConfig, ReconcileTimings};
use licensing_operator::controller::{reconcile_instance, Context, Outcome};
use licensing_operator::crd::{IBMLicensingSpec, TlsTermination};
use licensing_operator::resources::{ObjectIdentity, ResourceKind, ResourceObject};
use licensing_operator::Error;

use super::memory_store::MemoryStore;

const NS: &str = "ns";
const NAME: &str = "lic-1";
const SERVICE: &str = "ibm-licensing-service-lic-1";

struct StaticProbe(CapabilitySnapshot);

#[async_trait]
impl CapabilityProbe for StaticProbe {
    async fn probe(&self) -> Result<CapabilitySnapshot, Error> {
        Ok(self.0)
    }
}

fn openshift() -> CapabilitySnapshot {
    CapabilitySnapshot {
        route_api: true,
        service_ca_api: true,
        odlm_present: false,
        metering_marketplace: true,
    }
}

fn harness(spec: IBMLicensingSpec, caps: CapabilitySnapshot) -> (Arc<MemoryStore>, Context) {
    let store = Arc::new(MemoryStore::with_licensing(NS, NAME, spec));
    let ctx = Context::new(
        store.clone(),
        Arc::new(StaticProbe(caps)),
        ControllerConfig {
            watch_namespace: Some(NS.to_string()),
            operand_version: "1.4.1".to_string(),
            timings: ReconcileTimings::without_settle(),
        },
    );
    (store, ctx)
}

async fn invoke(ctx: &Context) -> Outcome {
    reconcile_instance(ctx, &ObjectIdentity::new(NS, NAME))
        .await
        .expect("reconcile should not fail")
}

/// Invoke until converged, returning the requeue outcomes seen on the way
async fn converge(ctx: &Context) -> Vec<Outcome> {
    let mut requeues = Vec::new();
    for _ in 0..50 {
        match invoke(ctx).await {
            Outcome::Converged => return requeues,
            outcome => requeues.push(outcome),
        }
    }
    panic!("did not converge after 50 invocations: {requeues:?}");
}

fn route_termination(store: &MemoryStore) -> Option<TlsTermination> {
    match store.object(ResourceKind::Route, NS, SERVICE) {
        Some(ResourceObject::Route(route)) => route.spec.tls.map(|tls| tls.termination),
        _ => None,
    }
}

/// Story: an empty namespace is filled one object per invocation
///
/// Each missing object is created and the invocation requeues after 1s
/// without comparing anything; once everything exists, the next pass only
/// reads, and the empty pod list is written to status once.
#[tokio::test]
async fn story_fresh_instance_converges_then_goes_quiet() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());

    assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(1)));
    assert_eq!(
        store.take_writes(),
        vec![format!("create Secret {NS}/ibm-licensing-token")]
    );
    assert_eq!(
        store.licensing().and_then(|l| l.spec.version).as_deref(),
        Some("1.4.1")
    );

    let requeues = converge(&ctx).await;
    assert!(requeues
        .iter()
        .all(|o| *o == Outcome::Requeue(Duration::from_secs(1))));

    let writes = store.take_writes();
    assert!(writes.iter().all(|w| w.starts_with("create ")), "{writes:?}");
    // upload token, 2 config maps, deployment, 2 services, route, 3 meters,
    // service monitor, network policy
    assert_eq!(writes.len(), 12);
    assert_eq!(store.count(ResourceKind::MeterDefinition), 3);
    assert_eq!(store.count(ResourceKind::Ingress), 0);
    assert_eq!(store.status_writes(), 1);
    assert_eq!(
        store.licensing().and_then(|l| l.status).and_then(|s| s.licensing_pods),
        Some(vec![])
    );

    // Idempotence: nothing left to write
    assert_eq!(invoke(&ctx).await, Outcome::Converged);
    assert!(store.take_writes().is_empty());
    assert_eq!(store.status_writes(), 1);
}

/// Story: marketplace objects are owned by the metrics service
#[tokio::test]
async fn story_marketplace_objects_hang_off_the_metrics_service() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());
    converge(&ctx).await;

    let metrics_uid = store
        .object(ResourceKind::Service, NS, METRICS_SERVICE_NAME)
        .and_then(|svc| svc.meta().uid.clone())
        .expect("metrics service should exist");
    let monitor = store
        .object(ResourceKind::ServiceMonitor, NS, builders::SERVICE_MONITOR_NAME)
        .expect("service monitor should exist");
    let owner = &monitor.meta().owner_references.as_ref().unwrap()[0];
    assert_eq!(owner.kind, "Service");
    assert_eq!(owner.uid, metrics_uid);

    let deployment = store
        .object(ResourceKind::Deployment, NS, SERVICE)
        .expect("deployment should exist");
    let owner = &deployment.meta().owner_references.as_ref().unwrap()[0];
    assert_eq!(owner.kind, "IBMLicensing");
    assert_eq!(owner.uid, format!("uid-{NAME}"));
}

/// Story: route TLS changed by hand is put back with a single update
///
/// The update carries the concurrency token observed after the external
/// edit; a stale token would have been rejected and turned into a delete.
#[tokio::test]
async fn story_route_tls_drift_is_updated_in_place() {
    let spec = IBMLicensingSpec {
        https_enable: Some(false),
        ..Default::default()
    };
    let (store, ctx) = harness(spec, openshift());
    converge(&ctx).await;
    store.take_writes();
    assert_eq!(route_termination(&store), Some(TlsTermination::Edge));

    store.mutate(ResourceKind::Route, NS, SERVICE, |obj| {
        if let ResourceObject::Route(route) = obj {
            if let Some(tls) = route.spec.tls.as_mut() {
                tls.termination = TlsTermination::Reencrypt;
            }
        }
    });

    assert_eq!(invoke(&ctx).await, Outcome::Converged);
    assert_eq!(
        store.take_writes(),
        vec![format!("update Route {NS}/{SERVICE}")]
    );
    assert_eq!(route_termination(&store), Some(TlsTermination::Edge));
}

/// Story: an immutable selector change is fixed by delete and recreate
#[tokio::test]
async fn story_immutable_drift_recreates_the_deployment() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());
    converge(&ctx).await;
    store.take_writes();

    store.mutate(ResourceKind::Deployment, NS, SERVICE, |obj| {
        if let ResourceObject::Deployment(d) = obj {
            if let Some(labels) = d
                .spec
                .as_mut()
                .and_then(|s| s.selector.match_labels.as_mut())
            {
                labels.insert("app".to_string(), "hijacked".to_string());
            }
        }
    });

    assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(30)));
    assert_eq!(
        store.take_writes(),
        vec![format!("delete Deployment {NS}/{SERVICE}")]
    );

    assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(1)));
    assert_eq!(
        store.take_writes(),
        vec![format!("create Deployment {NS}/{SERVICE}")]
    );

    assert_eq!(invoke(&ctx).await, Outcome::Converged);
    assert!(store.take_writes().is_empty());
}

/// Story: turning the marketplace off removes its objects
///
/// The workload drops its metrics certificate check in place, then the
/// metrics service goes; each meter definition that still exists is deleted
/// by its own invocation, each followed by a 30s requeue.
#[tokio::test]
async fn story_disabling_marketplace_deletes_meters() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());
    converge(&ctx).await;
    store.take_writes();

    store.edit_spec(|spec| spec.rhmp_enabled = Some(false));

    assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(30)));
    assert_eq!(
        store.take_writes(),
        vec![
            format!("update Deployment {NS}/{SERVICE}"),
            format!("delete Service {NS}/{METRICS_SERVICE_NAME}"),
        ]
    );

    for _ in 0..3 {
        assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(30)));
        let writes = store.take_writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].starts_with("delete MeterDefinition"), "{writes:?}");
    }
    assert_eq!(store.count(ResourceKind::MeterDefinition), 0);

    assert_eq!(invoke(&ctx).await, Outcome::Converged);
    assert!(store.take_writes().is_empty());
}

/// Story: without OpenShift APIs only the core objects are managed
#[tokio::test]
async fn story_plain_kubernetes_manages_core_objects_only() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), CapabilitySnapshot::default());
    converge(&ctx).await;

    assert_eq!(store.count(ResourceKind::Secret), 2);
    assert_eq!(store.count(ResourceKind::ConfigMap), 2);
    assert_eq!(store.count(ResourceKind::Deployment), 1);
    assert_eq!(store.count(ResourceKind::Service), 1);
    assert_eq!(store.count(ResourceKind::Route), 0);
    assert_eq!(store.count(ResourceKind::MeterDefinition), 0);
}

/// Story: enabling ingress later adds exactly the ingress
#[tokio::test]
async fn story_enabling_ingress_adds_it() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());
    converge(&ctx).await;
    store.take_writes();

    store.edit_spec(|spec| spec.ingress_enabled = Some(true));
    assert_eq!(invoke(&ctx).await, Outcome::Requeue(Duration::from_secs(1)));
    assert_eq!(
        store.take_writes(),
        vec![format!("create Ingress {NS}/{SERVICE}")]
    );
    assert_eq!(invoke(&ctx).await, Outcome::Converged);
}

#[tokio::test]
async fn deleted_instance_is_left_alone() {
    let (store, ctx) = harness(IBMLicensingSpec::default(), openshift());
    let outcome = reconcile_instance(&ctx, &ObjectIdentity::new(NS, "other"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Converged);
    assert!(store.take_writes().is_empty());
}

#[tokio::test]
async fn invalid_spec_fails_before_any_write() {
    let spec = IBMLicensingSpec {
        log_level: Some("LOUD".to_string()),
        ..Default::default()
    };
    let (store, ctx) = harness(spec, openshift());
    let err = reconcile_instance(&ctx, &ObjectIdentity::new(NS, NAME))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(store.take_writes().is_empty());
}
