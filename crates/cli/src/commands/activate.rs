//! `luaenv activate`: print a script that applies an activation to the
//! calling shell.

use luaenv_core::{ActivationOutcome, ActivationRequest, EnvironmentView, Shell};
use tracing::{info, warn};

/// Activate and render the resulting delta for `shell` (detected when absent).
pub async fn execute_activate(
    request: &ActivationRequest,
    shell: Option<Shell>,
) -> miette::Result<String> {
    let base = EnvironmentView::from_process();
    let mut activator = super::activator()?;
    let outcome = activator.activate(request, &base).await?;
    let shell = shell.unwrap_or_else(|| Shell::detect(None));

    report(&outcome, request.skip_toolchain);
    Ok(shell.render(&outcome.delta))
}

fn report(outcome: &ActivationOutcome, skipped: bool) {
    let installation = &outcome.installation;
    info!(
        id = %installation.id,
        lua = %installation.lua_version,
        source = %outcome.source,
        changed = outcome.delta.set.len(),
        removed = outcome.delta.removed.len(),
        "Activated installation"
    );

    if outcome.is_degraded() && !skipped {
        warn!(
            id = %installation.id,
            "Activated without a C/C++ toolchain; rocks with native code will fail to build"
        );
    }
}
