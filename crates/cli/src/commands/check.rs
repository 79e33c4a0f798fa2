//! `luaenv check`: audit every registered installation

use luaenv_core::validator::{AuditReport, audit};

/// Audit the registry. Returns the rendered report and whether it is clean.
pub fn execute_check(json: bool) -> miette::Result<(String, bool)> {
    let mut activator = super::activator()?;
    let registry = activator.registry(true)?;
    let report = audit(&registry)?;
    let clean = report.is_clean();

    let output = if json {
        serde_json::to_string_pretty(&report)
            .map_err(|e| miette::miette!("Failed to serialize audit: {e}"))?
    } else {
        format_text(&report)
    };
    Ok((output, clean))
}

fn format_text(report: &AuditReport) -> String {
    let mut lines = Vec::new();
    for (label, ids) in [
        ("ok", &report.valid),
        ("broken", &report.broken),
        ("missing", &report.missing),
    ] {
        lines.extend(ids.iter().map(|id| format!("{label:<8}{id}")));
    }

    lines.push(format!(
        "{} valid, {} broken, {} missing",
        report.valid.len(),
        report.broken.len(),
        report.missing.len()
    ));
    if !report.is_clean() {
        lines.push("Reinstall or remove the listed installations; luaenv does not repair them".to_string());
    }
    lines.join("\n")
}
