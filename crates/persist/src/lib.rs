//! Relay persistence: the one-time cluster registration record.
//! Create-if-absent only; there is no update path.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use metrics::counter;
use relay_core::{ClusterRegistration, StoreError};
use relay_kubehub::store_error;
use tracing::info;

pub const DEFAULT_RECORD_NAME: &str = "relay-agent-config";

/// A single named string-map record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when the record does not exist.
    async fn read(&self) -> Result<Option<BTreeMap<String, String>>, StoreError>;
    /// Fails with `StoreError::AlreadyExists` when the record is present.
    async fn create(&self, data: BTreeMap<String, String>) -> Result<(), StoreError>;
}

/// Record kept in a ConfigMap in the agent's namespace.
pub struct ConfigMapStore {
    api: Api<ConfigMap>,
    name: String,
}

impl ConfigMapStore {
    pub fn new(client: kube::Client, namespace: &str, name: &str) -> Self {
        Self { api: Api::namespaced(client, namespace), name: name.to_string() }
    }

    /// Namespace from `AGENT_NAMESPACE`, record name from
    /// `RELAY_REGISTRATION_NAME` (default [`DEFAULT_RECORD_NAME`]).
    pub async fn open_default() -> Result<Self> {
        let ns = std::env::var("AGENT_NAMESPACE")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("AGENT_NAMESPACE is not set"))?;
        Self::open_in(&ns).await
    }

    pub async fn open_in(namespace: &str) -> Result<Self> {
        let name = std::env::var("RELAY_REGISTRATION_NAME").unwrap_or_else(|_| DEFAULT_RECORD_NAME.to_string());
        let client = relay_kubehub::get_kube_client().await?;
        Ok(Self::new(client, namespace, &name))
    }
}

#[async_trait]
impl RecordStore for ConfigMapStore {
    async fn read(&self) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        match self.api.get_opt(&self.name).await {
            Ok(Some(cm)) => Ok(Some(cm.data.unwrap_or_default())),
            Ok(None) => Ok(None),
            Err(e) => Err(store_error(e, &self.name)),
        }
    }

    async fn create(&self, data: BTreeMap<String, String>) -> Result<(), StoreError> {
        let cm = ConfigMap {
            metadata: ObjectMeta { name: Some(self.name.clone()), ..Default::default() },
            data: Some(data),
            ..Default::default()
        };
        self.api.create(&PostParams::default(), &cm).await.map_err(|e| store_error(e, &self.name))?;
        Ok(())
    }
}

/// Whether this agent already completed registration, and with which key.
/// A missing record is `(false, "")`; other read failures are returned.
pub async fn is_cluster_confirmed(store: &dyn RecordStore) -> Result<(bool, String), StoreError> {
    match store.read().await? {
        Some(data) => {
            let reg = ClusterRegistration::from_data(&data);
            if reg.confirmed {
                Ok((true, reg.cluster_key))
            } else {
                Ok((false, String::new()))
            }
        }
        None => Ok((false, String::new())),
    }
}

/// Persist a confirmed registration. Errors if one is already recorded.
pub async fn cluster_register(store: &dyn RecordStore, cluster_key: &str, cluster_id: &str) -> Result<bool, StoreError> {
    let reg = ClusterRegistration::confirmed(cluster_key, cluster_id);
    store.create(reg.to_data()).await?;
    counter!("relay_registration_total", 1u64);
    info!(cluster_id = %cluster_id, "cluster registration recorded");
    Ok(true)
}
