//! The ordered step pipeline
//!
//! Order is a correctness requirement: tokens before configuration,
//! configuration before the workload, the workload before its services and
//! exposure, and the metrics service before the marketplace objects it owns.
//! Optional steps are left out entirely when their toggle or capability is
//! off.

use tracing::debug;

use super::outcome::Outcome;
use super::owner::OwnerCandidate;
use super::steps::{AbsentStep, ConvergeStep, ReconcileStep, StepContext};
use crate::builders;
use crate::capabilities::CapabilitySnapshot;
use crate::crd::ResolvedSpec;
use crate::resources::{ResourceKind, ResourceObject};
use crate::Error;

/// Ordered list of reconcile steps for one invocation
pub struct Pipeline {
    steps: Vec<Box<dyn ReconcileStep>>,
}

impl Pipeline {
    /// Pipeline running `steps` in the given order
    pub fn new(steps: Vec<Box<dyn ReconcileStep>>) -> Self {
        Self { steps }
    }

    /// The steps an IBMLicensing needs under the given capabilities
    pub fn for_instance(spec: &ResolvedSpec, caps: &CapabilitySnapshot) -> Self {
        let mut steps: Vec<Box<dyn ReconcileStep>> = vec![
            Box::new(ConvergeStep::new(ResourceKind::Secret, token_secrets)),
            Box::new(ConvergeStep::new(ResourceKind::ConfigMap, config_maps)),
            Box::new(ConvergeStep::new(ResourceKind::Deployment, deployment)),
            Box::new(ConvergeStep::new(ResourceKind::Service, licensing_service)),
        ];

        if spec.rhmp_enabled {
            steps.push(Box::new(ConvergeStep::new(
                ResourceKind::Service,
                metrics_service,
            )));
        } else {
            steps.push(Box::new(AbsentStep::new(ResourceKind::Service, |spec| {
                vec![builders::metrics_service_identity(spec)]
            })));
        }

        if spec.ingress_enabled {
            steps.push(Box::new(ConvergeStep::new(ResourceKind::Ingress, ingress)));
        }

        if caps.route_api && spec.route_enabled {
            steps.push(Box::new(ConvergeStep::new(ResourceKind::Route, route)));
        }

        if caps.metering_marketplace {
            if spec.rhmp_enabled {
                steps.push(Box::new(
                    ConvergeStep::new(ResourceKind::MeterDefinition, meter_definitions)
                        .owned_by(metrics_service_owner),
                ));
                steps.push(Box::new(
                    ConvergeStep::new(ResourceKind::ServiceMonitor, service_monitor)
                        .owned_by(metrics_service_owner),
                ));
                steps.push(Box::new(
                    ConvergeStep::new(ResourceKind::NetworkPolicy, network_policy)
                        .owned_by(metrics_service_owner),
                ));
            } else {
                steps.push(Box::new(AbsentStep::new(
                    ResourceKind::MeterDefinition,
                    builders::meter_definition_identities,
                )));
            }
        }

        Self::new(steps)
    }

    /// Kinds of the steps, in run order
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.steps.iter().map(|s| s.kind()).collect()
    }

    /// Run every step in order, stopping at the first error or requeue
    pub async fn run(&self, ctx: &StepContext<'_>, spec: &ResolvedSpec) -> Result<Outcome, Error> {
        for step in &self.steps {
            let outcome = step.run(ctx, spec).await?;
            if !outcome.is_converged() {
                debug!(kind = %step.kind(), ?outcome, "step requested requeue");
                return Ok(outcome);
            }
        }
        Ok(Outcome::Converged)
    }
}

fn metrics_service_owner(spec: &ResolvedSpec) -> OwnerCandidate {
    OwnerCandidate::Resource(
        ResourceKind::Service,
        builders::metrics_service_identity(spec),
    )
}

fn token_secrets(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![
        builders::api_token_secret(spec).into(),
        builders::upload_token_secret(spec).into(),
    ]
}

fn config_maps(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![
        builders::upload_config_map(spec).into(),
        builders::info_config_map(spec).into(),
    ]
}

fn deployment(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::licensing_deployment(spec).into()]
}

fn licensing_service(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::licensing_service(spec).into()]
}

fn metrics_service(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::metrics_service(spec).into()]
}

fn ingress(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::licensing_ingress(spec).into()]
}

fn route(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::licensing_route(spec).into()]
}

fn meter_definitions(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    builders::meter_definitions(spec)
        .into_iter()
        .map(Into::into)
        .collect()
}

fn service_monitor(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::service_monitor(spec).into()]
}

fn network_policy(spec: &ResolvedSpec) -> Vec<ResourceObject> {
    vec![builders::network_policy(spec).into()]
}
