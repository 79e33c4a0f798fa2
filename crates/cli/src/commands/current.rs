//! `luaenv current`: report the selected installation and the rule that
//! selected it.

use luaenv_core::{ActivationRequest, Installation, ResolutionSource};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CurrentReport<'a> {
    id: &'a str,
    name: &'a str,
    alias: Option<&'a str>,
    lua_version: &'a str,
    luarocks_version: &'a str,
    architecture: &'a str,
    source: String,
    installation_path: String,
    environment_path: String,
}

impl<'a> CurrentReport<'a> {
    fn new(installation: &'a Installation, source: ResolutionSource) -> Self {
        Self {
            id: &installation.id,
            name: &installation.name,
            alias: installation.alias.as_deref(),
            lua_version: &installation.lua_version,
            luarocks_version: &installation.luarocks_version,
            architecture: &installation.architecture,
            source: source.to_string(),
            installation_path: installation.installation_path.display().to_string(),
            environment_path: installation.environment_path.display().to_string(),
        }
    }
}

pub fn execute_current(request: &ActivationRequest, json: bool) -> miette::Result<String> {
    let mut activator = super::activator()?;
    let (installation, source) = activator.resolve(request)?;
    let report = CurrentReport::new(&installation, source);

    if json {
        return serde_json::to_string_pretty(&report)
            .map_err(|e| miette::miette!("Failed to serialize report: {e}"));
    }

    Ok(format_text(&report))
}

fn format_text(report: &CurrentReport<'_>) -> String {
    let mut lines = vec![format!("{} ({})", report.name, report.id)];
    if let Some(alias) = report.alias {
        lines.push(format!("  alias:    {alias}"));
    }
    lines.push(format!(
        "  lua:      {} (luarocks {}, {})",
        report.lua_version, report.luarocks_version, report.architecture
    ));
    lines.push(format!("  path:     {}", report.installation_path));
    lines.push(format!("  packages: {}", report.environment_path));
    lines.push(format!("  selected by {}", report.source));
    lines.join("\n")
}
