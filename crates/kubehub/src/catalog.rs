//! Type catalog: group/version/kind → plural name and scope, memoized.

use async_trait::async_trait;
use kube::{discovery::{Discovery, Scope as KubeScope}, Client};
use metrics::counter;
use relay_core::{Gvk, OpError, ResourceType, Scope, StoreError};
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::handle::store_error;

/// Something that can answer "what is the resource type for this GVK".
/// `Ok(None)` means the catalog was reachable but does not serve the kind.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn lookup(&self, gvk: &Gvk) -> Result<Option<ResourceType>, StoreError>;
}

/// Catalog backed by API discovery, restricted to the requested group.
#[derive(Clone)]
pub struct KubeCatalog {
    client: Client,
}

impl KubeCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for KubeCatalog {
    async fn lookup(&self, gvk: &Gvk) -> Result<Option<ResourceType>, StoreError> {
        let discovery = Discovery::new(self.client.clone())
            .filter(&[gvk.group.as_str()])
            .run()
            .await
            .map_err(|e| store_error(e, &gvk.key()))?;
        for group in discovery.groups() {
            for (ar, caps) in group.versioned_resources(&gvk.version) {
                if ar.kind == gvk.kind {
                    let scope = match caps.scope {
                        KubeScope::Namespaced => Scope::Namespaced,
                        KubeScope::Cluster => Scope::Cluster,
                    };
                    return Ok(Some(ResourceType {
                        group: ar.group.clone(),
                        version: ar.version.clone(),
                        kind: ar.kind.clone(),
                        plural: ar.plural.clone(),
                        scope,
                    }));
                }
            }
        }
        Ok(None)
    }
}

/// Memoizing resolver. Entries are never evicted: the set of served types is
/// assumed stable for the life of the process.
pub struct TypeResolver<S> {
    source: S,
    cache: RwLock<FxHashMap<Gvk, ResourceType>>,
    // serializes misses so one key costs at most one discovery query
    fill: Mutex<()>,
}

impl<S: CatalogSource> TypeResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source, cache: RwLock::new(FxHashMap::default()), fill: Mutex::new(()) }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn cached(&self, gvk: &Gvk) -> Option<ResourceType> {
        self.cache.read().await.get(gvk).cloned()
    }

    pub async fn resolve(&self, gvk: &Gvk) -> Result<ResourceType, OpError> {
        if let Some(rt) = self.cached(gvk).await {
            debug!(gvk = %gvk, "type cache hit");
            return Ok(rt);
        }
        let _guard = self.fill.lock().await;
        if let Some(rt) = self.cached(gvk).await {
            return Ok(rt);
        }
        counter!("relay_discovery_queries_total", 1u64);
        let found = self.source.lookup(gvk).await?;
        let rt = found.ok_or_else(|| OpError::UnknownResourceType(gvk.key()))?;
        info!(gvk = %gvk, plural = %rt.plural, namespaced = rt.namespaced(), "resolved resource type");
        self.cache.write().await.insert(gvk.clone(), rt.clone());
        Ok(rt)
    }
}
