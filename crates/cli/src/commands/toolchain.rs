//! `luaenv toolchain`: run the discovery chain and report the winner

use luaenv_core::EnvironmentView;
use luaenv_core::toolchain::ToolchainInstallation;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ToolchainReport {
    install_path: String,
    display_name: String,
    version: String,
    source: &'static str,
    has_required_component: bool,
    entry_point: Option<String>,
}

impl From<&ToolchainInstallation> for ToolchainReport {
    fn from(found: &ToolchainInstallation) -> Self {
        Self {
            install_path: found.install_path.display().to_string(),
            display_name: found.display_name.clone(),
            version: found.version.to_string(),
            source: found.source.as_str(),
            has_required_component: found.has_required_component,
            entry_point: found.entry_point().map(|p| p.display().to_string()),
        }
    }
}

pub async fn execute_toolchain(
    arch: &str,
    explicit: Option<&Path>,
    save: bool,
    cwd: &Path,
    json: bool,
) -> miette::Result<String> {
    let base = EnvironmentView::from_process();
    let mut activator = super::activator()?;
    let found = activator
        .discover_toolchain(arch, explicit, save, cwd, &base)
        .await?;
    let report = ToolchainReport::from(&found);

    if json {
        return serde_json::to_string_pretty(&report)
            .map_err(|e| miette::miette!("Failed to serialize report: {e}"));
    }

    Ok(format_text(&report))
}

fn format_text(report: &ToolchainReport) -> String {
    let mut lines = vec![
        format!("{} {}", report.display_name, report.version),
        format!("  path:   {}", report.install_path),
        format!("  found:  {}", report.source),
    ];
    match &report.entry_point {
        Some(entry) => lines.push(format!("  entry:  {entry}")),
        None => lines.push("  entry:  none".to_string()),
    }
    if !report.has_required_component {
        lines.push("  warning: C/C++ build tools component not detected".to_string());
    }
    lines.join("\n")
}
