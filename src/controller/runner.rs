//! Controller runtime wiring
//!
//! The kube-rs controller is the trigger source: it watches IBMLicensing and
//! the Deployments and Services it owns, serializes deliveries per object and
//! honours the requeue delays returned by [`reconcile`].

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{controller, Controller};
use kube::{Api, Client};
use tracing::{debug, error, info};

use super::licensing::{error_policy, reconcile, Context};
use crate::capabilities::KubeCapabilityProbe;
use crate::config::ControllerConfig;
use crate::crd::IBMLicensing;
use crate::store::KubeStore;
use crate::Error;

/// Server-side watch timeout, below the client read timeout
const WATCH_TIMEOUT_SECS: u32 = 25;

type ReconcileResult =
    Result<(ObjectRef<IBMLicensing>, Action), controller::Error<Error, kube::runtime::watcher::Error>>;

async fn log_reconcile_result(result: ReconcileResult) {
    match result {
        Ok((obj, action)) => debug!(licensing = %obj, ?action, "reconciliation completed"),
        Err(e) => error!(error = ?e, "reconciliation error"),
    }
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the IBMLicensing controller until a termination signal arrives
pub async fn run(client: Client, config: ControllerConfig) -> Result<(), Error> {
    let namespace = config.watch_namespace.clone();
    let ctx = Arc::new(Context::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(KubeCapabilityProbe::new(client.clone(), namespace.clone())),
        config,
    ));

    let caps = ctx.capabilities.refresh(ctx.probe.as_ref()).await;
    info!(
        namespace = namespace.as_deref().unwrap_or("<all>"),
        route = caps.route_api,
        service_ca = caps.service_ca_api,
        odlm = caps.odlm_present,
        metering = caps.metering_marketplace,
        "starting IBMLicensing controller"
    );

    let watcher = WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);
    Controller::new(
        api_for::<IBMLicensing>(&client, namespace.as_deref()),
        watcher.clone(),
    )
    .owns(api_for::<Deployment>(&client, namespace.as_deref()), watcher.clone())
    .owns(api_for::<Service>(&client, namespace.as_deref()), watcher)
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result)
    .await;

    info!("IBMLicensing controller stopped");
    Ok(())
}
