//! Scope binding and dynamic resource handles.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, ListParams, PostParams},
    core::{ApiResource, DynamicObject},
    Client,
};
use relay_core::{BoundScope, GenericObject, OpError, ResourceType, StoreError};
use tracing::debug;

/// Bind a resource type to a namespace. Namespaced types need a non-empty
/// namespace; cluster-scoped types ignore it.
pub fn bind_scope(resource: &ResourceType, namespace: Option<&str>) -> Result<BoundScope, OpError> {
    if resource.namespaced() {
        match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => Ok(BoundScope { resource: resource.clone(), namespace: Some(ns.to_string()) }),
            None => Err(OpError::InvalidNamespace(resource.gvk().key())),
        }
    } else {
        Ok(BoundScope { resource: resource.clone(), namespace: None })
    }
}

/// Operations against one bound resource collection.
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    fn scope(&self) -> &BoundScope;
    async fn create(&self, obj: &GenericObject) -> Result<GenericObject, StoreError>;
    async fn get(&self, name: &str) -> Result<GenericObject, StoreError>;
    /// Replace the named object; `obj` must carry the live resourceVersion.
    async fn update(&self, obj: &GenericObject) -> Result<GenericObject, StoreError>;
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
    async fn list(&self, label_selector: &str) -> Result<Vec<GenericObject>, StoreError>;
}

/// Produces a fresh handle for each bound scope.
pub trait HandleFactory: Send + Sync {
    fn handle(&self, scope: BoundScope) -> Box<dyn ResourceHandle>;
}

/// Map a kube error onto the store taxonomy, keeping the original as source.
pub fn store_error(e: kube::Error, what: &str) -> StoreError {
    match &e {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(what.to_string()),
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(what.to_string())
        }
        _ => StoreError::Other(anyhow::Error::new(e)),
    }
}

fn api_resource(rt: &ResourceType) -> ApiResource {
    ApiResource {
        group: rt.group.clone(),
        version: rt.version.clone(),
        api_version: rt.group_version(),
        kind: rt.kind.clone(),
        plural: rt.plural.clone(),
    }
}

fn to_dynamic(obj: &GenericObject) -> Result<DynamicObject, StoreError> {
    let v = serde_json::to_value(obj).context("serializing manifest")?;
    let d = serde_json::from_value(v).context("manifest is not a valid kubernetes object")?;
    Ok(d)
}

/// Reject documents the API machinery cannot carry, such as a missing
/// `metadata` block or non-string label values, before any request is made.
pub fn check_convertible(obj: &GenericObject) -> Result<(), OpError> {
    let v = serde_json::to_value(obj).map_err(|e| OpError::Decode(format!("serializing manifest: {}", e)))?;
    serde_json::from_value::<DynamicObject>(v)
        .map_err(|e| OpError::Decode(format!("manifest is not a valid kubernetes object: {}", e)))?;
    Ok(())
}

fn from_dynamic(obj: DynamicObject) -> Result<GenericObject, StoreError> {
    let v = serde_json::to_value(&obj).context("serializing DynamicObject")?;
    GenericObject::from_value(v).ok_or_else(|| StoreError::Other(anyhow!("server returned a non-object document")))
}

/// Handle over `Api<DynamicObject>`.
pub struct KubeHandle {
    api: Api<DynamicObject>,
    scope: BoundScope,
}

impl KubeHandle {
    pub fn new(client: Client, scope: BoundScope) -> Self {
        let ar = api_resource(&scope.resource);
        let api = match scope.namespace.as_deref() {
            Some(ns) => Api::namespaced_with(client, ns, &ar),
            None => Api::all_with(client, &ar),
        };
        Self { api, scope }
    }

    fn what(&self, name: &str) -> String {
        format!("{} {}", self.scope, name)
    }
}

#[async_trait]
impl ResourceHandle for KubeHandle {
    fn scope(&self) -> &BoundScope {
        &self.scope
    }

    async fn create(&self, obj: &GenericObject) -> Result<GenericObject, StoreError> {
        let d = to_dynamic(obj)?;
        let created = self
            .api
            .create(&PostParams::default(), &d)
            .await
            .map_err(|e| store_error(e, &self.what(obj.name())))?;
        from_dynamic(created)
    }

    async fn get(&self, name: &str) -> Result<GenericObject, StoreError> {
        let live = self.api.get(name).await.map_err(|e| store_error(e, &self.what(name)))?;
        from_dynamic(live)
    }

    async fn update(&self, obj: &GenericObject) -> Result<GenericObject, StoreError> {
        let d = to_dynamic(obj)?;
        let name = obj.name();
        let updated = self
            .api
            .replace(name, &PostParams::default(), &d)
            .await
            .map_err(|e| store_error(e, &self.what(name)))?;
        from_dynamic(updated)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let res = self
            .api
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| store_error(e, &self.what(name)))?;
        debug!(scope = %self.scope, name = %name, finalizing = res.is_left(), "delete accepted");
        Ok(())
    }

    async fn list(&self, label_selector: &str) -> Result<Vec<GenericObject>, StoreError> {
        let lp = ListParams::default().labels(label_selector);
        let list = self
            .api
            .list(&lp)
            .await
            .map_err(|e| store_error(e, &self.scope.to_string()))?;
        list.items.into_iter().map(from_dynamic).collect()
    }
}

/// Factory building [`KubeHandle`]s that share one client.
#[derive(Clone)]
pub struct KubeHandles {
    client: Client,
}

impl KubeHandles {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl HandleFactory for KubeHandles {
    fn handle(&self, scope: BoundScope) -> Box<dyn ResourceHandle> {
        Box::new(KubeHandle::new(self.client.clone(), scope))
    }
}
