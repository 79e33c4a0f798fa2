//! `vswhere` query ladder and output parsing.

use super::{DiscoverySource, ToolchainInstallation, ToolchainVersion};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// MSVC x86/x64 compiler component.
pub const VC_TOOLS_X64: &str = "Microsoft.VisualStudio.Component.VC.Tools.x86.x64";
/// MSVC ARM64 compiler component.
pub const VC_TOOLS_ARM64: &str = "Microsoft.VisualStudio.Component.VC.Tools.ARM64";
/// "Desktop development with C++" workload.
pub const NATIVE_DESKTOP_WORKLOAD: &str = "Microsoft.VisualStudio.Workload.NativeDesktop";
/// MSBuild component.
pub const MSBUILD_COMPONENT: &str = "Microsoft.Component.MSBuild";
/// Build Tools product id.
pub const BUILD_TOOLS_PRODUCT: &str = "Microsoft.VisualStudio.Product.BuildTools";

/// One `vswhere` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorQuery {
    /// Short label for logs
    pub label: &'static str,
    /// Arguments, excluding the common output flags
    pub args: Vec<String>,
    /// Whether a hit implies the MSVC tools component
    pub implies_component: bool,
}

impl LocatorQuery {
    fn new(label: &'static str, args: &[&str], implies_component: bool) -> Self {
        Self {
            label,
            args: args.iter().map(ToString::to_string).collect(),
            implies_component,
        }
    }

    /// Full argument list including JSON output flags.
    #[must_use]
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(["-format", "json", "-utf8", "-nologo"].map(String::from));
        args
    }
}

/// Queries in order of decreasing specificity.
#[must_use]
pub fn locator_queries(architecture: &str) -> Vec<LocatorQuery> {
    let component = if architecture.eq_ignore_ascii_case("arm64") {
        VC_TOOLS_ARM64
    } else {
        VC_TOOLS_X64
    };

    vec![
        LocatorQuery::new(
            "latest-with-vc-tools",
            &["-latest", "-products", "*", "-requires", component],
            true,
        ),
        LocatorQuery::new("any-with-vc-tools", &["-products", "*", "-requires", component], true),
        LocatorQuery::new(
            "native-desktop",
            &["-products", "*", "-requires", NATIVE_DESKTOP_WORKLOAD],
            false,
        ),
        LocatorQuery::new("msbuild", &["-products", "*", "-requires", MSBUILD_COMPONENT], false),
        LocatorQuery::new("build-tools", &["-products", BUILD_TOOLS_PRODUCT], false),
        LocatorQuery::new("any", &["-products", "*"], false),
        LocatorQuery::new("prerelease", &["-products", "*", "-prerelease"], false),
        LocatorQuery::new("all", &["-products", "*", "-prerelease", "-all"], false),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocatorInstance {
    installation_path: PathBuf,
    #[serde(default)]
    installation_version: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Parse `vswhere -format json` output into candidates that have an
/// activation entry point. Unparseable output yields nothing.
#[must_use]
pub fn parse_locator_output(stdout: &str, implies_component: bool) -> Vec<ToolchainInstallation> {
    let instances: Vec<LocatorInstance> = match serde_json::from_str(stdout.trim()) {
        Ok(instances) => instances,
        Err(e) => {
            debug!(error = %e, "Unparseable vswhere output");
            return Vec::new();
        }
    };

    instances
        .into_iter()
        .filter_map(|instance| {
            let mut found =
                ToolchainInstallation::from_root(&instance.installation_path, DiscoverySource::Locator)?;
            if let Some(version) = &instance.installation_version {
                found.version = ToolchainVersion::parse(version);
            }
            if let Some(name) = instance.display_name {
                found.display_name = name;
            }
            found.has_required_component |= implies_component;
            Some(found)
        })
        .collect()
}
