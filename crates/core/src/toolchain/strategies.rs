//! The discovery strategies, in chain order.

use super::locator::{locator_queries, parse_locator_output};
use super::{
    DiscoveryContext, DiscoverySource, DiscoveryStrategy, ToolchainInstallation,
    ToolchainVersion, read_marker,
};
use crate::environment::{EnvironmentView, PATH_VAR};
use crate::process::CommandSpec;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The default chain.
#[must_use]
pub fn standard_strategies() -> Vec<Box<dyn DiscoveryStrategy>> {
    vec![
        Box::new(ExplicitStrategy),
        Box::new(SavedConfigStrategy),
        Box::new(LocatorStrategy),
        Box::new(RegistryStrategy),
        Box::new(WellKnownStrategy::default()),
        Box::new(EnvironmentStrategy),
        Box::new(EnumerationStrategy),
    ]
}

/// Caller-supplied install root.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitStrategy;

#[async_trait]
impl DiscoveryStrategy for ExplicitStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Explicit
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let Some(path) = ctx.explicit_override else {
            return Ok(Vec::new());
        };
        match ToolchainInstallation::from_root(path, self.source()) {
            Some(found) => Ok(vec![found]),
            None => {
                warn!(
                    path = %path.display(),
                    "Toolchain path has neither vcvarsall.bat nor VsDevCmd.bat, falling back to automatic detection"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Root saved by an earlier session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SavedConfigStrategy;

#[async_trait]
impl DiscoveryStrategy for SavedConfigStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::SavedConfig
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let Some(saved) = read_marker(ctx.marker)? else {
            return Ok(Vec::new());
        };
        match ToolchainInstallation::from_root(&saved, self.source()) {
            Some(found) => Ok(vec![found]),
            None => {
                debug!(path = %saved.display(), "Saved toolchain path is stale");
                Ok(Vec::new())
            }
        }
    }
}

/// `vswhere.exe` from the Visual Studio Installer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocatorStrategy;

impl LocatorStrategy {
    /// Where `vswhere` lives: the installer directory, else `PATH`.
    #[must_use]
    pub fn locate(env: &EnvironmentView) -> Option<PathBuf> {
        for var in ["ProgramFiles(x86)", "ProgramFiles"] {
            if let Some(base) = env.get(var) {
                let candidate = Path::new(base)
                    .join("Microsoft Visual Studio")
                    .join("Installer")
                    .join("vswhere.exe");
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        let path = env.get(PATH_VAR)?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in("vswhere", Some(path), cwd).ok()
    }
}

#[async_trait]
impl DiscoveryStrategy for LocatorStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Locator
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let Some(vswhere) = Self::locate(ctx.env) else {
            debug!("vswhere not found");
            return Ok(Vec::new());
        };

        for query in locator_queries(ctx.architecture) {
            let spec = CommandSpec::new(&vswhere)
                .args(query.command_args())
                .timeout(ctx.settings.locator_timeout());
            let output = match ctx.runner.run(&spec).await {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    debug!(query = query.label, status = ?output.status, "vswhere query failed");
                    continue;
                }
                Err(e) => {
                    debug!(query = query.label, error = %e, "vswhere query failed");
                    continue;
                }
            };

            let mut found = parse_locator_output(&output.stdout, query.implies_component);
            if !found.is_empty() {
                debug!(query = query.label, instances = found.len(), "vswhere query matched");
                found.truncate(1);
                return Ok(found);
            }
        }

        Ok(Vec::new())
    }
}

/// Registry keys listing Visual Studio roots by version.
pub const VS7_KEYS: &[&str] = &[
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\VisualStudio\SxS\VS7",
    r"HKLM\SOFTWARE\Microsoft\VisualStudio\SxS\VS7",
];

/// `reg query` of the `SxS\VS7` key.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryStrategy;

/// Parse `reg query` output lines of the form `    17.0    REG_SZ    C:\...`.
#[must_use]
pub fn parse_reg_query(stdout: &str) -> Vec<(ToolchainVersion, PathBuf)> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (name, rest) = line.split_once(char::is_whitespace)?;
            let rest = rest.trim_start();
            let value = rest.strip_prefix("REG_SZ")?.trim();
            if value.is_empty() {
                return None;
            }
            let version = ToolchainVersion::parse(name);
            (!version.is_unknown()).then(|| (version, PathBuf::from(value)))
        })
        .collect()
}

#[async_trait]
impl DiscoveryStrategy for RegistryStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Registry
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let mut found = Vec::new();
        for key in VS7_KEYS.iter().copied() {
            let spec = CommandSpec::new("reg")
                .args(["query", key])
                .timeout(ctx.settings.locator_timeout());
            let output = match ctx.runner.run(&spec).await {
                Ok(output) if output.success() => output,
                Ok(_) => continue,
                Err(e) => {
                    debug!(key, error = %e, "Registry query failed");
                    continue;
                }
            };

            for (version, root) in parse_reg_query(&output.stdout) {
                if found.iter().any(|f: &ToolchainInstallation| f.install_path == root) {
                    continue;
                }
                if let Some(candidate) = ToolchainInstallation::from_root(&root, self.source()) {
                    found.push(candidate.with_version(version));
                }
            }
        }
        Ok(found)
    }
}

/// Release years, newest first, with their major versions.
pub const RELEASES: &[(&str, u32)] = &[("2022", 17), ("2019", 16), ("2017", 15)];

/// Editions, most common first.
pub const EDITIONS: &[&str] = &["Community", "Professional", "Enterprise", "BuildTools"];

/// Conventional install roots, plus configured extras.
#[derive(Debug, Default, Clone)]
pub struct WellKnownStrategy {
    program_files: Option<Vec<PathBuf>>,
}

impl WellKnownStrategy {
    /// Use these `Program Files` directories instead of the environment's.
    #[must_use]
    pub fn with_program_files(program_files: Vec<PathBuf>) -> Self {
        Self {
            program_files: Some(program_files),
        }
    }

    fn program_files(&self, env: &EnvironmentView) -> Vec<PathBuf> {
        if let Some(dirs) = &self.program_files {
            return dirs.clone();
        }
        [
            ("ProgramFiles", r"C:\Program Files"),
            ("ProgramFiles(x86)", r"C:\Program Files (x86)"),
        ]
        .into_iter()
        .map(|(var, default)| PathBuf::from(env.get(var).unwrap_or(default)))
        .collect()
    }

    /// Candidate roots in search order, each with its implied major version.
    #[must_use]
    pub fn roots(&self, env: &EnvironmentView) -> Vec<(PathBuf, Option<u32>)> {
        let bases = self.program_files(env);
        let mut roots = Vec::new();
        for (year, major) in RELEASES {
            for edition in EDITIONS {
                for base in &bases {
                    roots.push((
                        base.join("Microsoft Visual Studio").join(year).join(edition),
                        Some(*major),
                    ));
                }
            }
        }
        roots
    }
}

#[async_trait]
impl DiscoveryStrategy for WellKnownStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::WellKnown
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let extra = ctx
            .settings
            .extra_toolchain_roots
            .iter()
            .map(|root| (root.clone(), None));

        Ok(extra
            .chain(self.roots(ctx.env))
            .filter_map(|(root, major)| {
                let found = ToolchainInstallation::from_root(&root, self.source())?;
                Some(match major {
                    Some(major) => found.with_version(ToolchainVersion::major(major)),
                    None => found,
                })
            })
            .collect())
    }
}

/// Variables that may point at an install root or its tools directory.
pub const HINT_VARS: &[(&str, Option<u32>)] = &[
    ("VSINSTALLDIR", None),
    ("VS170COMNTOOLS", Some(17)),
    ("VS160COMNTOOLS", Some(16)),
    ("VS150COMNTOOLS", Some(15)),
    ("VCINSTALLDIR", None),
];

/// Reduce `<root>\Common7\Tools` or `<root>\VC` to `<root>`.
#[must_use]
pub fn normalize_hint(value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim().trim_end_matches(['\\', '/']));
    let names: Vec<String> = path
        .components()
        .rev()
        .take(2)
        .map(|c| c.as_os_str().to_string_lossy().to_ascii_lowercase())
        .collect();

    match names.as_slice() {
        [tools, common, ..] if tools == "tools" && common == "common7" => path
            .parent()
            .and_then(Path::parent)
            .map_or(path.clone(), Path::to_path_buf),
        [vc, ..] if vc == "vc" => path.parent().map_or(path.clone(), Path::to_path_buf),
        _ => path,
    }
}

/// `VSINSTALLDIR`, `VS1x0COMNTOOLS` and `VCINSTALLDIR`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentStrategy;

#[async_trait]
impl DiscoveryStrategy for EnvironmentStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Environment
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let mut found: Vec<ToolchainInstallation> = Vec::new();
        for (var, major) in HINT_VARS {
            let Some(value) = ctx.env.get(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let root = normalize_hint(value);
            if found.iter().any(|f| f.install_path == root) {
                continue;
            }
            match ToolchainInstallation::from_root(&root, self.source()) {
                Some(candidate) => {
                    debug!(var, root = %root.display(), "Toolchain hint accepted");
                    found.push(match major {
                        Some(major) => candidate.with_version(ToolchainVersion::major(*major)),
                        None => candidate,
                    });
                }
                None => debug!(var, root = %root.display(), "Toolchain hint has no entry point"),
            }
        }
        Ok(found)
    }
}

/// Inventory query listing Visual Studio entries from the uninstall keys.
pub const ENUMERATION_SCRIPT: &str = "Get-ItemProperty \
HKLM:\\Software\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\*, \
HKLM:\\Software\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\* \
-ErrorAction SilentlyContinue | \
Where-Object { $_.DisplayName -like '*Visual Studio*' -and $_.InstallLocation } | \
Select-Object DisplayName, DisplayVersion, InstallLocation | \
ConvertTo-Json -Compress";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InventoryEntry {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    display_version: Option<String>,
    #[serde(default)]
    install_location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InventoryOutput {
    Many(Vec<InventoryEntry>),
    One(InventoryEntry),
}

/// Parse the inventory query's JSON (an object when there is one match).
#[must_use]
pub fn parse_inventory(stdout: &str) -> Vec<ToolchainInstallation> {
    let entries = match serde_json::from_str::<InventoryOutput>(stdout.trim()) {
        Ok(InventoryOutput::Many(entries)) => entries,
        Ok(InventoryOutput::One(entry)) => vec![entry],
        Err(e) => {
            debug!(error = %e, "Unparseable inventory output");
            return Vec::new();
        }
    };

    let mut found: Vec<ToolchainInstallation> = Vec::new();
    for entry in entries {
        let Some(location) = entry.install_location.filter(|l| !l.trim().is_empty()) else {
            continue;
        };
        let root = PathBuf::from(location.trim().trim_end_matches(['\\', '/']));
        if found.iter().any(|f| f.install_path == root) {
            continue;
        }

        let candidate = ToolchainInstallation::inspect(&root, DiscoverySource::Enumeration);
        if candidate.entry_point().is_none() && !candidate.has_msbuild() {
            debug!(root = %root.display(), "Inventory entry has no build artifacts");
            continue;
        }

        let mut candidate = candidate;
        if let Some(version) = entry.display_version {
            candidate.version = ToolchainVersion::parse(&version);
        }
        if let Some(name) = entry.display_name {
            candidate.display_name = name;
        }
        found.push(candidate);
    }
    found
}

/// Installed-software inventory via PowerShell, bounded by
/// `enumeration_timeout_secs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumerationStrategy;

#[async_trait]
impl DiscoveryStrategy for EnumerationStrategy {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Enumeration
    }

    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>> {
        let spec = CommandSpec::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", ENUMERATION_SCRIPT])
            .timeout(ctx.settings.enumeration_timeout());
        let output = ctx.runner.run(&spec).await?;
        if !output.success() {
            debug!(status = ?output.status, "Inventory query failed");
            return Ok(Vec::new());
        }
        Ok(parse_inventory(&output.stdout))
    }
}
