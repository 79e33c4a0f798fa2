//! Native build toolchain (MSVC) discovery.
//!
//! Discovery runs an ordered list of [`DiscoveryStrategy`] implementations and
//! stops at the first one that yields a usable candidate:
//!
//! | # | Strategy | Source tag |
//! |---|----------|------------|
//! | 1 | caller-supplied path | `explicit` |
//! | 2 | saved marker file | `saved_config` |
//! | 3 | `vswhere` queries | `locator` |
//! | 4 | `SxS\VS7` registry key | `registry` |
//! | 5 | conventional install paths | `well_known` |
//! | 6 | `VSINSTALLDIR` and friends | `environment` |
//! | 7 | installed-software inventory (time-boxed) | `enumeration` |
//!
//! A failing strategy is logged at debug level and treated as empty. Outcomes,
//! including "nothing found", are cached per `(architecture, override)`.

mod activation;
mod locator;
mod strategies;

pub use activation::{IGNORED_VARS, ToolchainEnvironment, capture_environment, parse_env_dump};
pub use locator::{LocatorQuery, locator_queries, parse_locator_output};
pub use strategies::{
    EnumerationStrategy, EnvironmentStrategy, ExplicitStrategy, LocatorStrategy,
    RegistryStrategy, SavedConfigStrategy, WellKnownStrategy, standard_strategies,
};

use crate::config::Settings;
use crate::environment::EnvironmentView;
use crate::process::ProcessRunner;
use crate::{Error, Result};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Preferred activation entry point, relative to the install root.
pub const ACTIVATION_SCRIPT: &str = "VC/Auxiliary/Build/vcvarsall.bat";

/// Fallback activation entry point, relative to the install root.
pub const ACTIVATION_COMMAND: &str = "Common7/Tools/VsDevCmd.bat";

/// MSBuild, relative to the install root.
pub const MSBUILD: &str = "MSBuild/Current/Bin/MSBuild.exe";

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverySource {
    /// Caller-supplied path
    Explicit,
    /// Saved marker file
    SavedConfig,
    /// `vswhere`
    Locator,
    /// Windows registry
    Registry,
    /// Conventional install paths
    WellKnown,
    /// Environment variables
    Environment,
    /// Installed-software inventory
    Enumeration,
}

impl DiscoverySource {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::SavedConfig => "saved_config",
            Self::Locator => "locator",
            Self::Registry => "registry",
            Self::WellKnown => "well_known",
            Self::Environment => "environment",
            Self::Enumeration => "enumeration",
        }
    }

    /// Whether a result from this source may be written to the saved marker.
    ///
    /// Autodetected guesses are never pinned.
    #[must_use]
    pub const fn is_persistable(self) -> bool {
        matches!(self, Self::Explicit | Self::Locator)
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dotted numeric version, compared component-wise. Empty means unknown and
/// sorts lowest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolchainVersion(Vec<u32>);

impl ToolchainVersion {
    /// Parse the leading numeric components of `text`, e.g. "17.9.34607.119".
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self(
            text.trim()
                .split('.')
                .map_while(|part| part.trim().parse().ok())
                .collect(),
        )
    }

    /// Version with only a major component.
    #[must_use]
    pub fn major(major: u32) -> Self {
        Self(vec![major])
    }

    /// Whether nothing is known.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("unknown");
        }
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// A discovered Visual Studio installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainInstallation {
    /// Install root
    pub install_path: PathBuf,
    /// Product version
    pub version: ToolchainVersion,
    /// Human readable name
    pub display_name: String,
    /// Whether the MSVC C/C++ tools are present
    pub has_required_component: bool,
    /// `vcvarsall.bat`, if present
    pub activation_script: Option<PathBuf>,
    /// `VsDevCmd.bat`, if present
    pub activation_command: Option<PathBuf>,
    /// Strategy that found it
    pub source: DiscoverySource,
}

impl ToolchainInstallation {
    /// Inspect `root`. Returns `None` unless an activation entry point exists.
    #[must_use]
    pub fn from_root(root: &Path, source: DiscoverySource) -> Option<Self> {
        let candidate = Self::inspect(root, source);
        candidate.entry_point().is_some().then_some(candidate)
    }

    /// Inspect `root` without requiring anything to exist.
    #[must_use]
    pub fn inspect(root: &Path, source: DiscoverySource) -> Self {
        let script = root.join(ACTIVATION_SCRIPT);
        let command = root.join(ACTIVATION_COMMAND);
        let display_name = root
            .components()
            .rev()
            .take(2)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            install_path: root.to_path_buf(),
            version: ToolchainVersion::default(),
            display_name: if display_name.is_empty() {
                "Visual Studio".to_string()
            } else {
                format!("Visual Studio {display_name}")
            },
            has_required_component: root.join("VC").join("Tools").join("MSVC").is_dir(),
            activation_script: script.is_file().then_some(script),
            activation_command: command.is_file().then_some(command),
            source,
        }
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: ToolchainVersion) -> Self {
        self.version = version;
        self
    }

    /// The entry point activation should run: the script, else the command.
    #[must_use]
    pub fn entry_point(&self) -> Option<&Path> {
        self.activation_script
            .as_deref()
            .or(self.activation_command.as_deref())
    }

    /// Whether MSBuild is present.
    #[must_use]
    pub fn has_msbuild(&self) -> bool {
        self.install_path.join(MSBUILD).is_file()
    }
}

/// Order best first: newest version, then required component present.
pub fn rank(candidates: &mut [ToolchainInstallation]) {
    candidates.sort_by(|a, b| match b.version.cmp(&a.version) {
        Ordering::Equal => b.has_required_component.cmp(&a.has_required_component),
        other => other,
    });
}

/// Everything a strategy may look at.
pub struct DiscoveryContext<'a> {
    /// Target architecture token
    pub architecture: &'a str,
    /// Caller-supplied install root
    pub explicit_override: Option<&'a Path>,
    /// Pre-activation environment
    pub env: &'a EnvironmentView,
    /// Process capability
    pub runner: &'a dyn ProcessRunner,
    /// Engine settings
    pub settings: &'a Settings,
    /// Saved toolchain marker location
    pub marker: &'a Path,
}

/// One discovery strategy.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Tag for candidates from this strategy.
    fn source(&self) -> DiscoverySource;

    /// Candidates found, in any order. Errors are logged and treated as empty.
    async fn candidates(&self, ctx: &DiscoveryContext<'_>) -> Result<Vec<ToolchainInstallation>>;
}

type CacheKey = (String, Option<PathBuf>);

/// Runs the strategy chain and caches outcomes.
pub struct ToolchainDiscovery {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
    cache: HashMap<CacheKey, Option<ToolchainInstallation>>,
}

impl fmt::Debug for ToolchainDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolchainDiscovery")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.source()).collect::<Vec<_>>(),
            )
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Default for ToolchainDiscovery {
    fn default() -> Self {
        Self::new(standard_strategies())
    }
}

impl ToolchainDiscovery {
    /// Discovery over the given strategies, tried in order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self {
            strategies,
            cache: HashMap::new(),
        }
    }

    /// Find the best toolchain.
    ///
    /// With `persist_override`, an `explicit` or `locator` winner is written to
    /// the saved marker.
    pub async fn discover(
        &mut self,
        ctx: &DiscoveryContext<'_>,
        persist_override: bool,
    ) -> Result<ToolchainInstallation> {
        let key = (
            ctx.architecture.to_string(),
            ctx.explicit_override.map(Path::to_path_buf),
        );

        let outcome = if let Some(cached) = self.cache.get(&key) {
            debug!(architecture = ctx.architecture, hit = cached.is_some(), "Toolchain cache hit");
            cached.clone()
        } else {
            let outcome = self.run_chain(ctx).await;
            self.cache.insert(key, outcome.clone());
            outcome
        };

        if persist_override
            && let Some(found) = &outcome
            && found.source.is_persistable()
        {
            persist(ctx.marker, &found.install_path);
        }

        outcome.ok_or_else(|| Error::ToolchainUnavailable {
            architecture: ctx.architecture.to_string(),
        })
    }

    async fn run_chain(&self, ctx: &DiscoveryContext<'_>) -> Option<ToolchainInstallation> {
        for strategy in &self.strategies {
            let source = strategy.source();
            let mut candidates = match strategy.candidates(ctx).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    debug!(%source, error = %e, "Discovery strategy failed");
                    continue;
                }
            };

            if candidates.is_empty() {
                debug!(%source, "Discovery strategy found nothing");
                continue;
            }

            rank(&mut candidates);
            let best = candidates.swap_remove(0);
            info!(
                %source,
                path = %best.install_path.display(),
                version = %best.version,
                "Selected toolchain"
            );
            return Some(best);
        }

        warn!(architecture = ctx.architecture, "No Visual Studio toolchain found");
        None
    }
}

/// Read the saved marker. `None` when absent or blank.
pub fn read_marker(marker: &Path) -> Result<Option<PathBuf>> {
    match std::fs::read_to_string(marker) {
        Ok(content) => {
            let value = content.trim();
            Ok((!value.is_empty()).then(|| PathBuf::from(value)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(e, marker, "read")),
    }
}

fn persist(marker: &Path, install_path: &Path) {
    let value = install_path.to_string_lossy();
    match std::fs::write(marker, value.as_bytes()) {
        Ok(()) => debug!(marker = %marker.display(), path = %value, "Saved toolchain path"),
        Err(e) => warn!(marker = %marker.display(), error = %e, "Could not save toolchain path"),
    }
}
