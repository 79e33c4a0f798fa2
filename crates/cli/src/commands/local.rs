//! `luaenv local`: manage the working directory pin

use luaenv_core::pin::LocalPin;
use luaenv_core::{ResolveRequest, resolve};
use std::path::Path;

/// Pin `reference` in `dir` after checking it names exactly one installation.
pub fn execute_set(dir: &Path, reference: &str) -> miette::Result<String> {
    let mut activator = super::activator()?;
    let registry = activator.registry(false)?;

    let resolved = match resolve(&registry, &ResolveRequest::by_alias(reference)) {
        Ok(resolved) => resolved,
        Err(e) if e.is_not_found() => resolve(&registry, &ResolveRequest::by_id(reference))?,
        Err(e) => return Err(e.into()),
    };

    let path = LocalPin::new(dir).write(reference)?;
    tracing::info!(reference, id = %resolved.installation.id, "Pinned installation");
    Ok(format!(
        "Pinned {reference} ({}) in {}",
        resolved.installation.id,
        path.display()
    ))
}

/// The pin in `dir`, or a note that there is none.
pub fn execute_show(dir: &Path) -> miette::Result<String> {
    Ok(LocalPin::new(dir)
        .read()?
        .unwrap_or_else(|| "No local pin; the registry default applies".to_string()))
}

/// Remove the pin in `dir`.
pub fn execute_unset(dir: &Path) -> miette::Result<String> {
    let pin = LocalPin::new(dir);
    Ok(if pin.remove()? {
        format!("Removed {}", pin.path().display())
    } else {
        "No local pin to remove".to_string()
    })
}
