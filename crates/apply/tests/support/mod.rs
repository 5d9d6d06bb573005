//! In-memory cluster implementing the kubehub traits.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use relay_apply::Engine;
use relay_core::{BoundScope, GenericObject, Gvk, ResourceType, Scope, StoreError};
use relay_kubehub::{CatalogSource, HandleFactory, ResourceHandle, TypeResolver};

type Key = (String, Option<String>, String);

#[derive(Default)]
pub struct State {
    objects: BTreeMap<Key, GenericObject>,
    rv: u64,
    pub calls: Vec<&'static str>,
    pub fail_list: bool,
    /// Verbs that fail with a non-benign store error.
    pub fail_verbs: Vec<&'static str>,
    /// Drop the object just before an update lands, as a concurrent delete would.
    pub vanish_before_update: bool,
}

impl State {
    fn record(&mut self, verb: &'static str) -> Result<(), StoreError> {
        self.calls.push(verb);
        if self.fail_verbs.contains(&verb) {
            return Err(StoreError::Other(anyhow!("forbidden: {}", verb)));
        }
        Ok(())
    }
}

pub fn rt(group: &str, version: &str, kind: &str, plural: &str, scope: Scope) -> ResourceType {
    ResourceType { group: group.into(), version: version.into(), kind: kind.into(), plural: plural.into(), scope }
}

pub struct FakeCatalog {
    types: Vec<ResourceType>,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn lookup(&self, gvk: &Gvk) -> Result<Option<ResourceType>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.types.iter().find(|t| t.gvk() == *gvk).cloned())
    }
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    pub state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn engine(&self) -> Engine<FakeCatalog, FakeCluster> {
        let catalog = FakeCatalog {
            types: vec![
                rt("", "v1", "ConfigMap", "configmaps", Scope::Namespaced),
                rt("", "v1", "Namespace", "namespaces", Scope::Cluster),
                rt("argoproj.io", "v1alpha1", "Workflow", "workflows", Scope::Namespaced),
                rt("argoproj.io", "v1alpha1", "CronWorkflow", "cronworkflows", Scope::Namespaced),
            ],
            lookups: AtomicUsize::new(0),
        };
        Engine::new(Arc::new(TypeResolver::new(catalog)), self.clone())
    }

    /// Seed a live object directly, bypassing the engine.
    pub fn seed(&self, plural: &str, ns: Option<&str>, obj: serde_json::Value) {
        let mut st = self.state.lock().unwrap();
        let mut obj = GenericObject::from_value(obj).expect("object");
        st.rv += 1;
        obj.set_resource_version(&st.rv.to_string());
        let key = (plural.to_string(), ns.map(str::to_string), obj.name().to_string());
        st.objects.insert(key, obj);
    }

    pub fn live(&self, plural: &str, ns: Option<&str>, name: &str) -> Option<GenericObject> {
        let st = self.state.lock().unwrap();
        st.objects.get(&(plural.to_string(), ns.map(str::to_string), name.to_string())).cloned()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl HandleFactory for FakeCluster {
    fn handle(&self, scope: BoundScope) -> Box<dyn ResourceHandle> {
        Box::new(FakeHandle { scope, state: self.state.clone() })
    }
}

pub struct FakeHandle {
    scope: BoundScope,
    state: Arc<Mutex<State>>,
}

impl FakeHandle {
    fn key(&self, name: &str) -> Key {
        (self.scope.resource.plural.clone(), self.scope.namespace.clone(), name.to_string())
    }
}

#[async_trait]
impl ResourceHandle for FakeHandle {
    fn scope(&self) -> &BoundScope {
        &self.scope
    }

    async fn create(&self, obj: &GenericObject) -> Result<GenericObject, StoreError> {
        let mut st = self.state.lock().unwrap();
        st.record("create")?;
        let key = self.key(obj.name());
        if st.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(obj.name().to_string()));
        }
        st.rv += 1;
        let mut stored = obj.clone();
        stored.set_resource_version(&st.rv.to_string());
        st.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(&self, name: &str) -> Result<GenericObject, StoreError> {
        let mut st = self.state.lock().unwrap();
        st.record("get")?;
        st.objects.get(&self.key(name)).cloned().ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(&self, obj: &GenericObject) -> Result<GenericObject, StoreError> {
        let mut st = self.state.lock().unwrap();
        st.record("update")?;
        let key = self.key(obj.name());
        if st.vanish_before_update {
            st.objects.remove(&key);
        }
        let current = st.objects.get(&key).ok_or_else(|| StoreError::NotFound(obj.name().to_string()))?;
        if current.resource_version() != obj.resource_version() {
            return Err(StoreError::Other(anyhow!("conflict: stale resourceVersion")));
        }
        st.rv += 1;
        let mut stored = obj.clone();
        stored.set_resource_version(&st.rv.to_string());
        st.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut st = self.state.lock().unwrap();
        st.record("delete")?;
        st.objects.remove(&self.key(name)).map(|_| ()).ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list(&self, label_selector: &str) -> Result<Vec<GenericObject>, StoreError> {
        let mut st = self.state.lock().unwrap();
        st.record("list")?;
        if st.fail_list {
            return Err(StoreError::Other(anyhow!("connection refused")));
        }
        let (k, v) = label_selector.split_once('=').ok_or_else(|| anyhow!("unsupported selector"))?;
        let plural = &self.scope.resource.plural;
        Ok(st
            .objects
            .iter()
            .filter(|((p, ns, _), o)| p == plural && *ns == self.scope.namespace && o.label(k) == Some(v))
            .map(|(_, o)| o.clone())
            .collect())
    }
}
