//! Relay kubehub: client wiring, type catalog and dynamic resource handles.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use kube::{discovery::{Discovery, Scope}, Client};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

mod catalog;
mod handle;

pub use catalog::{CatalogSource, KubeCatalog, TypeResolver};
pub use handle::{bind_scope, check_convertible, store_error, HandleFactory, KubeHandle, KubeHandles, ResourceHandle};

static CLIENT: OnceCell<Client> = OnceCell::const_new();
static RESOLVER: OnceCell<Arc<TypeResolver<KubeCatalog>>> = OnceCell::const_new();

/// Process-wide kube client, built once from kubeconfig or in-cluster env.
pub async fn get_kube_client() -> Result<Client> {
    let client = CLIENT
        .get_or_try_init(|| async {
            let c = Client::try_default().await?;
            info!(default_ns = %c.default_namespace(), "kube client ready");
            Ok::<_, kube::Error>(c)
        })
        .await?;
    Ok(client.clone())
}

/// Process-wide type resolver. Its cache lives as long as the process.
pub async fn shared_resolver() -> Result<Arc<TypeResolver<KubeCatalog>>> {
    let resolver = RESOLVER
        .get_or_try_init(|| async {
            let client = get_kube_client().await?;
            Ok::<_, anyhow::Error>(Arc::new(TypeResolver::new(KubeCatalog::new(client))))
        })
        .await?;
    Ok(resolver.clone())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl DiscoveredResource {
    pub fn gvk_key(&self) -> String {
        relay_core::Gvk::new(self.group.clone(), self.version.clone(), self.kind.clone()).key()
    }
}

/// Discover served resources (incl. CRDs) using kube Discovery.
pub async fn discover() -> Result<Vec<DiscoveredResource>> {
    let client = get_kube_client().await?;
    let discovery = Discovery::new(client).run().await?;
    let mut out = Vec::new();
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            out.push(DiscoveredResource {
                group: ar.group.clone(),
                version: ar.version.clone(),
                kind: ar.kind.clone(),
                plural: ar.plural.clone(),
                namespaced: matches!(caps.scope, Scope::Namespaced),
            });
        }
    }
    out.sort_by(|a, b| a.group.cmp(&b.group).then(a.version.cmp(&b.version)).then(a.kind.cmp(&b.kind)));
    Ok(out)
}
