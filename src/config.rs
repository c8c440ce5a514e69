//! Operator configuration
//!
//! Built once at startup from CLI flags and environment (see `main.rs`) and
//! shared read-only by every reconciliation.

use std::time::Duration;

/// Delays used by the reconciliation engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileTimings {
    /// Requeue delay after a dependent object was created
    pub create_requeue: Duration,
    /// Sleep after a create so the next read observes the new object
    pub post_create_settle: Duration,
    /// Requeue delay after a dependent object was deleted
    pub delete_requeue: Duration,
    /// Periodic resync once everything has converged (drift detection)
    pub resync: Duration,
    /// Requeue delay for retryable errors
    pub error_requeue: Duration,
}

impl Default for ReconcileTimings {
    fn default() -> Self {
        Self {
            create_requeue: Duration::from_secs(1),
            post_create_settle: Duration::from_secs(5),
            delete_requeue: Duration::from_secs(30),
            resync: Duration::from_secs(600),
            error_requeue: Duration::from_secs(30),
        }
    }
}

impl ReconcileTimings {
    /// Timings with no settle sleep, for tests that drive the engine directly
    pub fn without_settle() -> Self {
        Self {
            post_create_settle: Duration::ZERO,
            ..Default::default()
        }
    }
}

/// Controller-wide configuration
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Namespace watched for IBMLicensing resources and probed for optional APIs.
    ///
    /// `None` watches all namespaces; capability probing then fails hard and
    /// the previous capability snapshot is kept.
    pub watch_namespace: Option<String>,
    /// License Service version stamped onto IBMLicensing specs
    pub operand_version: String,
    /// Reconciliation delays
    pub timings: ReconcileTimings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            operand_version: crate::DEFAULT_OPERAND_VERSION.to_string(),
            timings: ReconcileTimings::default(),
        }
    }
}
