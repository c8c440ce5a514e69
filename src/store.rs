//! Cluster store abstraction
//!
//! The reconciliation engine only needs get/create/update/delete by identity,
//! a label-selected pod list and a few IBMLicensing operations. This trait
//! allows mocking the cluster in tests while using kube-rs in production.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::crd::{IBMLicensing, IBMLicensingStatus, MeterDefinition, Route, ServiceMonitor};
use crate::resources::{dispatch, ObjectIdentity, ResourceKind, ResourceObject};
use crate::{Error, FIELD_MANAGER};

/// CRUD and list access to the cluster
///
/// Errors keep the API status so callers can classify them
/// ([`Error::is_not_found`], [`Error::is_already_exists`],
/// [`Error::is_update_rejection`]).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch an object by kind and identity; `None` when it does not exist
    async fn get(
        &self,
        kind: ResourceKind,
        id: &ObjectIdentity,
    ) -> Result<Option<ResourceObject>, Error>;

    /// Create an object, returning the persisted version
    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject, Error>;

    /// Replace an object; rejected when its resourceVersion is stale
    async fn update(&self, object: &ResourceObject) -> Result<ResourceObject, Error>;

    /// Delete an object
    async fn delete(&self, kind: ResourceKind, id: &ObjectIdentity) -> Result<(), Error>;

    /// List pods in `namespace` carrying all of `labels`
    async fn list_pods(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error>;

    /// Fetch an IBMLicensing; `None` when it does not exist
    async fn get_licensing(&self, id: &ObjectIdentity) -> Result<Option<IBMLicensing>, Error>;

    /// Replace the status of an IBMLicensing
    async fn patch_licensing_status(
        &self,
        id: &ObjectIdentity,
        status: &IBMLicensingStatus,
    ) -> Result<(), Error>;

    /// Set `spec.version` of an IBMLicensing
    async fn patch_licensing_version(&self, id: &ObjectIdentity, version: &str)
        -> Result<(), Error>;
}

/// Render a label map as a selector string (`k1=v1,k2=v2`)
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// kube-rs implementation of [`ClusterStore`]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a new KubeStore wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_typed<K>(&self, id: &ObjectIdentity) -> Result<Option<ResourceObject>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Into<ResourceObject>,
    {
        let found = self.api::<K>(&id.namespace).get_opt(&id.name).await?;
        Ok(found.map(Into::into))
    }

    async fn create_typed<K>(&self, obj: &K) -> Result<ResourceObject, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned
            + Into<ResourceObject>,
    {
        let id = ObjectIdentity::of(obj);
        let created = self
            .api::<K>(&id.namespace)
            .create(&PostParams::default(), obj)
            .await?;
        Ok(created.into())
    }

    async fn update_typed<K>(&self, obj: &K) -> Result<ResourceObject, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned
            + Into<ResourceObject>,
    {
        let id = ObjectIdentity::of(obj);
        let updated = self
            .api::<K>(&id.namespace)
            .replace(&id.name, &PostParams::default(), obj)
            .await?;
        Ok(updated.into())
    }

    async fn delete_typed<K>(&self, id: &ObjectIdentity) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.api::<K>(&id.namespace)
            .delete(&id.name, &DeleteParams::background())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get(
        &self,
        kind: ResourceKind,
        id: &ObjectIdentity,
    ) -> Result<Option<ResourceObject>, Error> {
        match kind {
            ResourceKind::Secret => self.get_typed::<Secret>(id).await,
            ResourceKind::ConfigMap => self.get_typed::<ConfigMap>(id).await,
            ResourceKind::Deployment => self.get_typed::<Deployment>(id).await,
            ResourceKind::Service => self.get_typed::<Service>(id).await,
            ResourceKind::Ingress => self.get_typed::<Ingress>(id).await,
            ResourceKind::Route => self.get_typed::<Route>(id).await,
            ResourceKind::MeterDefinition => self.get_typed::<MeterDefinition>(id).await,
            ResourceKind::ServiceMonitor => self.get_typed::<ServiceMonitor>(id).await,
            ResourceKind::NetworkPolicy => self.get_typed::<NetworkPolicy>(id).await,
        }
    }

    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject, Error> {
        dispatch!(object, obj => self.create_typed(obj).await)
    }

    async fn update(&self, object: &ResourceObject) -> Result<ResourceObject, Error> {
        dispatch!(object, obj => self.update_typed(obj).await)
    }

    async fn delete(&self, kind: ResourceKind, id: &ObjectIdentity) -> Result<(), Error> {
        match kind {
            ResourceKind::Secret => self.delete_typed::<Secret>(id).await,
            ResourceKind::ConfigMap => self.delete_typed::<ConfigMap>(id).await,
            ResourceKind::Deployment => self.delete_typed::<Deployment>(id).await,
            ResourceKind::Service => self.delete_typed::<Service>(id).await,
            ResourceKind::Ingress => self.delete_typed::<Ingress>(id).await,
            ResourceKind::Route => self.delete_typed::<Route>(id).await,
            ResourceKind::MeterDefinition => self.delete_typed::<MeterDefinition>(id).await,
            ResourceKind::ServiceMonitor => self.delete_typed::<ServiceMonitor>(id).await,
            ResourceKind::NetworkPolicy => self.delete_typed::<NetworkPolicy>(id).await,
        }
    }

    async fn list_pods(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error> {
        let params = ListParams::default().labels(&label_selector(labels));
        let pods = self.api::<Pod>(namespace).list(&params).await?;
        Ok(pods.items)
    }

    async fn get_licensing(&self, id: &ObjectIdentity) -> Result<Option<IBMLicensing>, Error> {
        Ok(self
            .api::<IBMLicensing>(&id.namespace)
            .get_opt(&id.name)
            .await?)
    }

    async fn patch_licensing_status(
        &self,
        id: &ObjectIdentity,
        status: &IBMLicensingStatus,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "status": status });
        self.api::<IBMLicensing>(&id.namespace)
            .patch_status(
                &id.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }

    async fn patch_licensing_version(
        &self,
        id: &ObjectIdentity,
        version: &str,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "spec": { "version": version } });
        self.api::<IBMLicensing>(&id.namespace)
            .patch(
                &id.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(())
    }
}
