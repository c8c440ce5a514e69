//! Licensing operator - reconciles IBMLicensing resources into the License Service workload
//!
//! One `IBMLicensing` object drives a bounded set of dependent resources
//! (token secrets, config maps, the licensing deployment, services, ingress or
//! route exposure, and optional marketplace metering and monitoring hooks).
//! Every invocation walks an ordered pipeline of per-kind steps; each step
//! ensures its objects exist, compares them with the expected state and
//! converges them by update or, when the API server refuses the update, by
//! delete-and-recreate on the next pass.
//!
//! # Modules
//!
//! - [`crd`] - The IBMLicensing CRD, default resolution and third-party kinds
//! - [`resources`] - Kind-polymorphic wrapper over every dependent object
//! - [`builders`] - Expected-object builders for each dependent kind
//! - [`store`] - Cluster store abstraction and its kube-rs implementation
//! - [`capabilities`] - Optional cluster API detection and caching
//! - [`controller`] - Reconciliation engine and trigger wiring
//! - [`config`] - Controller configuration
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod builders;
pub mod capabilities;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod resources;
pub mod store;
pub mod telemetry;

pub use error::Error;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// License Service version deployed when `OPERAND_VERSION` is not set
pub const DEFAULT_OPERAND_VERSION: &str = "1.4.1";

/// Field manager name used for patches issued by the operator
pub const FIELD_MANAGER: &str = "ibm-licensing-operator";
