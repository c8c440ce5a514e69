//! In-memory cluster store
//!
//! Behaves like the API server where the engine can tell the difference:
//! resourceVersion checks on update, AlreadyExists on create, immutable
//! Deployment selectors, 404 on missing objects. No garbage collector runs,
//! so owned objects outlive their owner until deleted explicitly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use parking_lot::Mutex;

use licensing_operator::crd::{IBMLicensing, IBMLicensingSpec, IBMLicensingStatus};
use licensing_operator::error::api_error;
use licensing_operator::resources::{ObjectIdentity, ResourceKind, ResourceObject};
use licensing_operator::store::ClusterStore;
use licensing_operator::Error;

#[derive(Default)]
struct State {
    objects: BTreeMap<(ResourceKind, ObjectIdentity), ResourceObject>,
    licensing: Option<IBMLicensing>,
    pods: Vec<Pod>,
    revision: u64,
    writes: Vec<String>,
    status_writes: usize,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// Cluster state shared between the engine under test and the assertions
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Store holding one IBMLicensing `namespace/name` with the given spec
    pub fn with_licensing(namespace: &str, name: &str, spec: IBMLicensingSpec) -> Self {
        let mut lic = IBMLicensing::new(name, spec);
        lic.metadata.namespace = Some(namespace.to_string());
        lic.metadata.uid = Some(format!("uid-{name}"));
        let store = Self::default();
        store.state.lock().licensing = Some(lic);
        store
    }

    /// Writes to dependent objects since the last call, as `verb Kind ns/name`
    pub fn take_writes(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().writes)
    }

    /// Number of status writes so far
    pub fn status_writes(&self) -> usize {
        self.state.lock().status_writes
    }

    /// Stored IBMLicensing
    pub fn licensing(&self) -> Option<IBMLicensing> {
        self.state.lock().licensing.clone()
    }

    /// Replace the IBMLicensing spec, as a user edit would
    pub fn edit_spec(&self, edit: impl FnOnce(&mut IBMLicensingSpec)) {
        if let Some(lic) = self.state.lock().licensing.as_mut() {
            edit(&mut lic.spec);
        }
    }

    /// Live copy of a dependent object
    pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<ResourceObject> {
        self.state
            .lock()
            .objects
            .get(&(kind, ObjectIdentity::new(namespace, name)))
            .cloned()
    }

    /// Number of stored objects of `kind`
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Modify a live object the way another actor would, bumping its version
    pub fn mutate(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        change: impl FnOnce(&mut ResourceObject),
    ) {
        let mut state = self.state.lock();
        let revision = state.next_revision();
        if let Some(obj) = state
            .objects
            .get_mut(&(kind, ObjectIdentity::new(namespace, name)))
        {
            change(obj);
            obj.set_resource_version(Some(revision));
        }
    }
}

fn deployment_selector(obj: &ResourceObject) -> Option<String> {
    match obj {
        ResourceObject::Deployment(d) => d
            .spec
            .as_ref()
            .map(|s| format!("{:?}", s.selector.match_labels)),
        _ => None,
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        id: &ObjectIdentity,
    ) -> Result<Option<ResourceObject>, Error> {
        Ok(self.state.lock().objects.get(&(kind, id.clone())).cloned())
    }

    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject, Error> {
        let mut state = self.state.lock();
        let key = (object.kind(), object.identity());
        if state.objects.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists", format!("{} already exists", key.1)));
        }

        let revision = state.next_revision();
        let mut stored = object.clone();
        stored.meta_mut().uid = Some(format!("uid-{}-{}", key.0, revision));
        stored.set_resource_version(Some(revision));
        if let ResourceObject::Service(svc) = &mut stored {
            if let Some(spec) = svc.spec.as_mut() {
                spec.cluster_ip = Some(format!("10.96.0.{}", state.revision));
            }
        }

        state.writes.push(format!("create {} {}", key.0, key.1));
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, object: &ResourceObject) -> Result<ResourceObject, Error> {
        let mut state = self.state.lock();
        let key = (object.kind(), object.identity());
        let Some(current) = state.objects.get(&key).cloned() else {
            return Err(api_error(404, "NotFound", format!("{} not found", key.1)));
        };
        if current.resource_version() != object.resource_version() {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        if deployment_selector(&current) != deployment_selector(object) {
            return Err(api_error(422, "Invalid", "spec.selector: field is immutable"));
        }

        let revision = state.next_revision();
        let mut stored = object.clone();
        stored.meta_mut().uid = current.meta().uid.clone();
        stored.set_resource_version(Some(revision));

        state.writes.push(format!("update {} {}", key.0, key.1));
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, kind: ResourceKind, id: &ObjectIdentity) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.objects.remove(&(kind, id.clone())).is_none() {
            return Err(api_error(404, "NotFound", format!("{id} not found")));
        }
        state.writes.push(format!("delete {kind} {id}"));
        Ok(())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        _labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, Error> {
        Ok(self.state.lock().pods.clone())
    }

    async fn get_licensing(&self, id: &ObjectIdentity) -> Result<Option<IBMLicensing>, Error> {
        let state = self.state.lock();
        Ok(state
            .licensing
            .as_ref()
            .filter(|lic| ObjectIdentity::of(*lic) == *id)
            .cloned())
    }

    async fn patch_licensing_status(
        &self,
        _id: &ObjectIdentity,
        status: &IBMLicensingStatus,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        let lic = state
            .licensing
            .as_mut()
            .ok_or_else(|| api_error(404, "NotFound", "ibmlicensing not found"))?;
        lic.status = Some(status.clone());
        state.status_writes += 1;
        Ok(())
    }

    async fn patch_licensing_version(
        &self,
        _id: &ObjectIdentity,
        version: &str,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        let lic = state
            .licensing
            .as_mut()
            .ok_or_else(|| api_error(404, "NotFound", "ibmlicensing not found"))?;
        lic.spec.version = Some(version.to_string());
        Ok(())
    }
}
