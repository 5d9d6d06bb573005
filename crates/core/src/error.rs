use thiserror::Error;

/// Failures reported by a backing store (the cluster API or a stand-in).
///
/// `NotFound` and `AlreadyExists` are split out because callers treat them as
/// outcomes rather than failures; anything else is carried untouched in `Other`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Errors surfaced by a resource operation. All are fatal to the call.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("namespace required for namespaced resource {0}")]
    InvalidNamespace(String),
    #[error("no live {kind} labelled workflow_id={workflow_id}")]
    TargetNotFound { kind: String, workflow_id: String },
    #[error("invalid verb {0:?} (expect create, update, get or delete)")]
    InvalidVerb(String),
    #[error("backing store: {0}")]
    BackingStore(#[from] StoreError),
}
