//! Label-addressed kinds: workflow runs get generated names, so the live
//! instance is located through its `workflow_id` label.

use relay_core::{GenericObject, OpError};
use relay_kubehub::ResourceHandle;
use tracing::{debug, warn};

pub const WORKFLOW_ID_LABEL: &str = "workflow_id";

const LABEL_ADDRESSED_KINDS: &[&str] = &["Workflow", "CronWorkflow"];

pub fn is_label_addressed(kind: &str) -> bool {
    LABEL_ADDRESSED_KINDS.contains(&kind)
}

/// Point `obj` at the live instance carrying its `workflow_id` label.
///
/// When several instances match, the first in listing order wins.
pub async fn retarget(obj: &mut GenericObject, handle: &dyn ResourceHandle) -> Result<(), OpError> {
    let kind = obj.kind().unwrap_or_default().to_string();
    let workflow_id = match obj.label(WORKFLOW_ID_LABEL) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(OpError::TargetNotFound { kind, workflow_id: String::new() }),
    };
    let selector = format!("{}={}", WORKFLOW_ID_LABEL, workflow_id);
    let items = handle.list(&selector).await?;
    if items.len() > 1 {
        warn!(kind = %kind, workflow_id = %workflow_id, matches = items.len(), "multiple live instances; using first");
    }
    let target = items
        .first()
        .map(|o| o.name().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| OpError::TargetNotFound { kind: kind.clone(), workflow_id: workflow_id.clone() })?;
    debug!(kind = %kind, workflow_id = %workflow_id, name = %target, "retargeted by label");
    obj.set_name(&target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_workflow_kinds_are_label_addressed() {
        assert!(is_label_addressed("Workflow"));
        assert!(is_label_addressed("CronWorkflow"));
        assert!(!is_label_addressed("workflow"));
        assert!(!is_label_addressed("ConfigMap"));
    }
}
