//! Verb dispatch with existence-aware outcomes.

use relay_core::{GenericObject, NoOp, OpError, Outcome, StoreError, Verb};
use relay_kubehub::ResourceHandle;
use tracing::info;

/// Run `verb` against `handle`. Already-exists on create and not-found on
/// get/update/delete become [`Outcome::NoOp`]; every other store error is
/// returned as is.
pub async fn dispatch(verb: Verb, mut obj: GenericObject, handle: &dyn ResourceHandle) -> Result<Outcome, OpError> {
    if verb != Verb::Create && obj.name().is_empty() {
        return Err(OpError::Decode(format!("{} requires metadata.name", verb)));
    }
    let scope = handle.scope();
    match verb {
        Verb::Create => match handle.create(&obj).await {
            Ok(created) => {
                info!(scope = %scope, name = %created.name(), "resource created");
                Ok(Outcome::Created(created))
            }
            Err(StoreError::AlreadyExists(what)) => {
                info!(what = %what, "already exists; nothing to create");
                Ok(Outcome::NoOp(NoOp::AlreadyExists))
            }
            Err(e) => Err(e.into()),
        },
        Verb::Update => {
            let live = match handle.get(obj.name()).await {
                Ok(live) => live,
                Err(StoreError::NotFound(what)) => {
                    info!(what = %what, "not found; nothing to update");
                    return Ok(Outcome::NoOp(NoOp::NotFound));
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(rv) = live.resource_version() {
                obj.set_resource_version(rv);
            }
            // a delete between get and replace also lands here
            match handle.update(&obj).await {
                Ok(updated) => {
                    info!(scope = %scope, name = %updated.name(), "resource updated");
                    Ok(Outcome::Updated(updated))
                }
                Err(StoreError::NotFound(what)) => {
                    info!(what = %what, "not found; nothing to update");
                    Ok(Outcome::NoOp(NoOp::NotFound))
                }
                Err(e) => Err(e.into()),
            }
        }
        Verb::Get => match handle.get(obj.name()).await {
            Ok(live) => {
                info!(scope = %scope, name = %live.name(), "resource retrieved");
                Ok(Outcome::Fetched(live))
            }
            Err(StoreError::NotFound(what)) => {
                info!(what = %what, "not found");
                Ok(Outcome::NoOp(NoOp::NotFound))
            }
            Err(e) => Err(e.into()),
        },
        Verb::Delete => match handle.delete(obj.name()).await {
            Ok(()) => {
                info!(scope = %scope, name = %obj.name(), "resource deleted");
                Ok(Outcome::Deleted)
            }
            Err(StoreError::NotFound(what)) => {
                info!(what = %what, "not found; nothing to delete");
                Ok(Outcome::NoOp(NoOp::NotFound))
            }
            Err(e) => Err(e.into()),
        },
    }
}
