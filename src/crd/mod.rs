//! Custom Resource Definitions for the licensing operator
//!
//! The IBMLicensing CRD the operator owns, the default resolution that turns
//! its spec into builder input, and the third-party kinds it manages.

mod defaults;
mod licensing;
mod thirdparty;

pub use defaults::{
    resolve, LogLevel, ResolvedIngress, ResolvedRouteTls, ResolvedSpec, ResolvedUsage,
};
pub use licensing::{
    HttpsCertsSource, IBMLicensing, IBMLicensingSpec, IBMLicensingStatus, IngressOptions,
    RouteOptions, RouteTlsOptions, UsageContainer,
};
pub use thirdparty::{
    Endpoint, EndpointTlsConfig, InsecureEdgeTerminationPolicy, LabelFilter, MeterDefinition,
    MeterDefinitionSpec, MeterWorkload, NamespaceFilter, NamespaceSelector, ResourceFilter, Route,
    RoutePort, RouteSpec, RouteTargetReference, ServiceMonitor, ServiceMonitorSpec, TlsConfig,
    TlsTermination,
};
