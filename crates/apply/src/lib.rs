//! Relay apply: decode a manifest, resolve its type, bind a handle and run a
//! verb against the cluster with existence-aware semantics.

#![forbid(unsafe_code)]

use std::sync::Arc;

use metrics::{counter, histogram};
use relay_core::{GenericObject, Gvk, OpError, Outcome, StoreError, Verb};
use relay_kubehub::{bind_scope, check_convertible, CatalogSource, HandleFactory, KubeCatalog, KubeHandles, TypeResolver};
use tracing::{info, warn};

pub mod decode;
pub mod dispatch;
pub mod target;

pub use decode::{decode_manifest, decode_manifest_yaml};
pub use dispatch::dispatch;
pub use target::{is_label_addressed, retarget, WORKFLOW_ID_LABEL};

/// One resolver shared across calls; a fresh handle per call.
pub struct Engine<S, F> {
    resolver: Arc<TypeResolver<S>>,
    handles: F,
}

impl<S: CatalogSource, F: HandleFactory> Engine<S, F> {
    pub fn new(resolver: Arc<TypeResolver<S>>, handles: F) -> Self {
        Self { resolver, handles }
    }

    pub fn resolver(&self) -> &TypeResolver<S> {
        &self.resolver
    }

    /// Run `verb` on a JSON manifest. `namespace` falls back to the manifest's
    /// own `metadata.namespace` when empty.
    pub async fn perform(&self, manifest: &str, verb: Verb, namespace: &str) -> Result<Outcome, OpError> {
        let (obj, gvk) = decode_manifest(manifest)?;
        self.perform_object(obj, &gvk, verb, namespace).await
    }

    /// Same as [`Engine::perform`] for an already decoded object.
    pub async fn perform_object(
        &self,
        mut obj: GenericObject,
        gvk: &Gvk,
        verb: Verb,
        namespace: &str,
    ) -> Result<Outcome, OpError> {
        let t0 = std::time::Instant::now();
        let res = self.run(&mut obj, gvk, verb, namespace).await;
        histogram!("relay_op_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(outcome) => {
                counter!("relay_ops_total", 1u64, "verb" => verb.as_str(), "outcome" => outcome.label());
            }
            Err(e) => {
                counter!("relay_op_err_total", 1u64, "verb" => verb.as_str());
                warn!(gvk = %gvk, name = %obj.name(), verb = %verb, error = %e, "operation failed");
            }
        }
        res
    }

    async fn run(&self, obj: &mut GenericObject, gvk: &Gvk, verb: Verb, namespace: &str) -> Result<Outcome, OpError> {
        let rt = self.resolver.resolve(gvk).await?;
        let ns = Some(namespace).filter(|s| !s.is_empty()).or(obj.namespace()).map(str::to_string);
        let scope = bind_scope(&rt, ns.as_deref())?;
        if let Some(ns) = scope.namespace.as_deref() {
            obj.set_namespace(ns);
        }
        check_convertible(obj)?;
        info!(gvk = %gvk, scope = %scope, verb = %verb, "dispatching");
        let handle = self.handles.handle(scope);
        if is_label_addressed(&gvk.kind) {
            retarget(obj, handle.as_ref()).await?;
        }
        dispatch(verb, obj.clone(), handle.as_ref()).await
    }
}

/// Run a manifest against the current kube context using the process-wide
/// type catalog.
pub async fn perform_operation(manifest: &str, verb: Verb, namespace: &str) -> Result<Outcome, OpError> {
    default_engine().await?.perform(manifest, verb, namespace).await
}

/// Engine wired to the process-wide kube client and resolver.
pub async fn default_engine() -> Result<Engine<KubeCatalog, KubeHandles>, OpError> {
    let client = relay_kubehub::get_kube_client().await.map_err(StoreError::Other)?;
    let resolver = relay_kubehub::shared_resolver().await.map_err(StoreError::Other)?;
    Ok(Engine::new(resolver, KubeHandles::new(client)))
}
