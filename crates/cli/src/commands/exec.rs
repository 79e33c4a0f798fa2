//! `luaenv exec`: run a child process inside an activated environment

use luaenv_core::{ActivationRequest, EnvironmentView};
use miette::{IntoDiagnostic, WrapErr};

/// Activate, then run `command` with the composed environment.
///
/// Returns the child's exit code, or 1 when it was killed by a signal.
pub async fn execute_exec(
    request: &ActivationRequest,
    command: &str,
    args: &[String],
) -> miette::Result<i32> {
    let base = EnvironmentView::from_process();
    let mut activator = super::activator()?;
    let outcome = activator.activate(request, &base).await?;

    tracing::info!(
        id = %outcome.installation.id,
        command,
        ?args,
        "Running command with activated installation"
    );

    let environment = outcome.composition.environment.to_map();
    let status = tokio::process::Command::new(command)
        .args(args)
        .env_clear()
        .envs(&environment)
        .current_dir(&request.cwd)
        .status()
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to run `{command}`"))?;

    let code = status.code().unwrap_or(1);
    tracing::debug!(command, code, "Command finished");
    Ok(code)
}
