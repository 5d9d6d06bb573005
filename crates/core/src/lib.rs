//! Relay core types: generic objects, resource-type descriptors and errors.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

mod error;

pub use error::{OpError, StoreError};

/// Schema-less resource document. Only the well-known metadata fields are
/// interpreted; everything else (spec, status, data) is carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericObject(Map<String, Json>);

impl GenericObject {
    /// Wrap a JSON value; `None` unless it is an object.
    pub fn from_value(v: Json) -> Option<Self> {
        match v {
            Json::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Json {
        Json::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(|v| v.as_str())
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(|v| v.as_str())
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.0.get("metadata").and_then(|m| m.get(key)).and_then(|v| v.as_str())
    }

    /// `metadata.name`, empty when unset.
    pub fn name(&self) -> &str {
        self.meta_str("name").unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_str("namespace").filter(|s| !s.is_empty())
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.meta_str("resourceVersion")
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.0
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.as_object())
            .map(|l| {
                l.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(|v| v.as_str())
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Json> {
        let meta = self.0.entry("metadata").or_insert_with(|| Json::Object(Map::new()));
        if !meta.is_object() {
            *meta = Json::Object(Map::new());
        }
        match meta {
            Json::Object(m) => m,
            _ => unreachable!("metadata normalized to object above"),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.metadata_mut().insert("name".into(), Json::String(name.to_string()));
    }

    pub fn set_namespace(&mut self, ns: &str) {
        self.metadata_mut().insert("namespace".into(), Json::String(ns.to_string()));
    }

    pub fn set_resource_version(&mut self, rv: &str) {
        self.metadata_mut().insert("resourceVersion".into(), Json::String(rv.to_string()));
    }
}

/// Group/version/kind triple. The core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Split an `apiVersion` (`v1` or `apps/v1`) and pair it with `kind`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Option<Self> {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        if version.is_empty() || version.contains('/') || kind.is_empty() {
            return None;
        }
        Some(Self::new(group, version, kind))
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `v1/Kind` or `group/v1/Kind`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.api_version(), self.kind)
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Gvk {
    type Err = OpError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let parts: Vec<_> = key.split('/').collect();
        match parts.as_slice() {
            [version, kind] if !version.is_empty() && !kind.is_empty() => Ok(Gvk::new("", *version, *kind)),
            [group, version, kind] if !version.is_empty() && !kind.is_empty() => Ok(Gvk::new(*group, *version, *kind)),
            _ => Err(OpError::Decode(format!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// Resolved type information for one group/version/kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Plural resource name used in API paths, e.g. `configmaps`.
    pub plural: String,
    pub scope: Scope,
}

impl ResourceType {
    pub fn gvk(&self) -> Gvk {
        Gvk::new(self.group.clone(), self.version.clone(), self.kind.clone())
    }

    pub fn group_version(&self) -> String {
        self.gvk().api_version()
    }

    pub fn namespaced(&self) -> bool {
        matches!(self.scope, Scope::Namespaced)
    }
}

/// A resource type bound to the namespace it will be addressed in.
/// `namespace` is always `None` for cluster-scoped types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundScope {
    pub resource: ResourceType,
    pub namespace: Option<String>,
}

impl fmt::Display for BoundScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.resource.plural),
            None => f.write_str(&self.resource.plural),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Update,
    Get,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Get => "get",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Verb::Create),
            "update" => Ok(Verb::Update),
            "get" => Ok(Verb::Get),
            "delete" => Ok(Verb::Delete),
            other => Err(OpError::InvalidVerb(other.to_string())),
        }
    }
}

/// Why an operation had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOp {
    AlreadyExists,
    NotFound,
}

/// Result of a dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Created(GenericObject),
    Updated(GenericObject),
    Fetched(GenericObject),
    Deleted,
    NoOp(NoOp),
}

impl Outcome {
    pub fn object(&self) -> Option<&GenericObject> {
        match self {
            Outcome::Created(o) | Outcome::Updated(o) | Outcome::Fetched(o) => Some(o),
            Outcome::Deleted | Outcome::NoOp(_) => None,
        }
    }

    /// Short metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Fetched(_) => "fetched",
            Outcome::Deleted => "deleted",
            Outcome::NoOp(NoOp::AlreadyExists) => "noop_exists",
            Outcome::NoOp(NoOp::NotFound) => "noop_missing",
        }
    }
}

pub const CONFIRMED_KEY: &str = "is_cluster_confirmed";
pub const CLUSTER_KEY_KEY: &str = "cluster_key";
pub const CLUSTER_ID_KEY: &str = "cluster_id";

/// One-time registration handshake state, stored as a flat string map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRegistration {
    pub confirmed: bool,
    pub cluster_key: String,
    pub cluster_id: String,
}

impl ClusterRegistration {
    pub fn confirmed(cluster_key: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self { confirmed: true, cluster_key: cluster_key.into(), cluster_id: cluster_id.into() }
    }

    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        let get = |k: &str| data.get(k).cloned().unwrap_or_default();
        Self {
            confirmed: data.get(CONFIRMED_KEY).map(|v| v == "true").unwrap_or(false),
            cluster_key: get(CLUSTER_KEY_KEY),
            cluster_id: get(CLUSTER_ID_KEY),
        }
    }

    pub fn to_data(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(CONFIRMED_KEY.to_string(), self.confirmed.to_string());
        m.insert(CLUSTER_KEY_KEY.to_string(), self.cluster_key.clone());
        m.insert(CLUSTER_ID_KEY.to_string(), self.cluster_id.clone());
        m
    }
}
