//! End-to-end activation of one installation.
//!
//! [`Activator`] owns the long-lived pieces (registry cache, discovery caches,
//! process capability) and runs the pipeline:
//!
//! 1. load the registry and resolve the installation
//! 2. validate it on disk
//! 3. find a vcpkg root against the *pre-activation* environment
//! 4. discover and activate a build toolchain (optional, degraded on failure)
//! 5. compose the session environment and emit the LuaRocks config
//!
//! Nothing here touches the process environment; the outcome carries the
//! composed [`EnvironmentView`] and its delta from the input.

use crate::config::Settings;
use crate::environment::{self, ComposeRequest, Composition, EnvDelta, EnvironmentView};
use crate::package_root::{PackageRootInstallation, PackageRootLocator, default_triplet};
use crate::paths;
use crate::pin::LocalPin;
use crate::process::{ProcessRunner, SystemRunner};
use crate::registry::{Installation, Registry, RegistryStore};
use crate::resolver::{self, ResolutionSource, ResolveRequest};
use crate::toolchain::{
    DiscoveryContext, ToolchainDiscovery, ToolchainEnvironment, ToolchainInstallation,
    capture_environment,
};
use crate::validator;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to activate and how.
#[derive(Debug, Clone, Default)]
pub struct ActivationRequest {
    /// Explicit id or id prefix
    pub id: Option<String>,
    /// Explicit alias
    pub alias: Option<String>,
    /// Working directory, for the pin file and saved toolchain marker
    pub cwd: PathBuf,
    /// Package tree to use instead of the installation's own
    pub custom_tree: Option<PathBuf>,
    /// Visual Studio root to try first
    pub toolchain_override: Option<PathBuf>,
    /// Save an explicit or vswhere-found toolchain to the marker
    pub persist_toolchain: bool,
    /// Do not look for a toolchain at all
    pub skip_toolchain: bool,
    /// Bypass the registry cache
    pub force_reload: bool,
}

impl ActivationRequest {
    /// Request resolved through pin and default from `cwd`.
    #[must_use]
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Self::default()
        }
    }
}

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    /// The activated installation
    pub installation: Installation,
    /// Rule that selected it
    pub source: ResolutionSource,
    /// Toolchain in use, `None` in degraded mode
    pub toolchain: Option<ToolchainInstallation>,
    /// vcpkg root in use
    pub package_root: Option<PackageRootInstallation>,
    /// Composed environment and generated files
    pub composition: Composition,
    /// Changes relative to the input environment
    pub delta: EnvDelta,
}

impl ActivationOutcome {
    /// Whether toolchain-dependent features are unavailable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.toolchain.is_none()
    }
}

/// Runs activations, keeping caches across calls.
pub struct Activator {
    store: RegistryStore,
    discovery: ToolchainDiscovery,
    package_roots: PackageRootLocator,
    runner: Arc<dyn ProcessRunner>,
    settings: Settings,
    config_dir: PathBuf,
}

impl std::fmt::Debug for Activator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activator")
            .field("store", &self.store)
            .field("discovery", &self.discovery)
            .field("config_dir", &self.config_dir)
            .finish_non_exhaustive()
    }
}

impl Activator {
    /// Activator over an explicit registry file.
    #[must_use]
    pub fn new(settings: Settings, registry_path: impl Into<PathBuf>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            store: RegistryStore::new(registry_path, settings.registry_cache_ttl()),
            discovery: ToolchainDiscovery::default(),
            package_roots: PackageRootLocator::new(settings.extra_package_roots.clone()),
            runner,
            config_dir: paths::generated_config_dir(),
            settings,
        }
    }

    /// Activator using the user's luaenv root, settings file and the host.
    pub fn from_environment() -> Result<Self> {
        let settings = Settings::load(&paths::settings_file()?)?;
        Ok(Self::new(settings, paths::registry_file()?, Arc::new(SystemRunner)))
    }

    /// Replace the registry store.
    #[must_use]
    pub fn with_store(mut self, store: RegistryStore) -> Self {
        self.store = store;
        self
    }

    /// Replace the toolchain discovery chain.
    #[must_use]
    pub fn with_discovery(mut self, discovery: ToolchainDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Replace the vcpkg locator.
    #[must_use]
    pub fn with_package_roots(mut self, locator: PackageRootLocator) -> Self {
        self.package_roots = locator;
        self
    }

    /// Write generated configs to `dir`.
    #[must_use]
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Engine settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registry snapshot.
    pub fn registry(&mut self, force: bool) -> Result<Arc<Registry>> {
        self.store.load(force)
    }

    /// Resolve the installation a request names, consulting the pin in
    /// `cwd` and the default when nothing explicit was given.
    pub fn resolve(&mut self, request: &ActivationRequest) -> Result<(Installation, ResolutionSource)> {
        let registry = self.store.load(request.force_reload)?;

        let explicit = request.id.is_some() || request.alias.is_some();
        let pin = if explicit {
            None
        } else {
            LocalPin::new(&request.cwd).read()?
        };

        let resolve_request = ResolveRequest {
            id: request.id.as_deref(),
            alias: request.alias.as_deref(),
            local_pin: pin.as_deref(),
            use_priority: true,
        };
        let resolved = resolver::resolve(&registry, &resolve_request)?;
        Ok((resolved.installation.clone(), resolved.source))
    }

    /// Run the toolchain discovery chain.
    pub async fn discover_toolchain(
        &mut self,
        architecture: &str,
        explicit_override: Option<&Path>,
        persist_override: bool,
        cwd: &Path,
        base: &EnvironmentView,
    ) -> Result<ToolchainInstallation> {
        let marker = self.settings.toolchain_marker_for(cwd);
        let ctx = DiscoveryContext {
            architecture,
            explicit_override,
            env: base,
            runner: self.runner.as_ref(),
            settings: &self.settings,
            marker: &marker,
        };
        self.discovery.discover(&ctx, persist_override).await
    }

    /// Find a vcpkg root for the installation's triplet.
    pub fn discover_package_root(
        &mut self,
        installation: &Installation,
        base: &EnvironmentView,
    ) -> Result<PackageRootInstallation> {
        let triplet = self
            .settings
            .default_triplet
            .clone()
            .unwrap_or_else(|| default_triplet(&installation.architecture));
        self.package_roots.discover(base, &triplet)
    }

    /// Activate an installation starting from `base`.
    pub async fn activate(
        &mut self,
        request: &ActivationRequest,
        base: &EnvironmentView,
    ) -> Result<ActivationOutcome> {
        let (installation, source) = self.resolve(request)?;
        info!(id = %installation.id, %source, "Resolved installation");
        validator::ensure_valid(&installation, true)?;

        // vcpkg first: the toolchain's PATH would put Visual Studio's bundled
        // vcpkg ahead of a system-wide one.
        let package_root = match self.discover_package_root(&installation, base) {
            Ok(found) => Some(found),
            Err(e) if e.is_not_found() => {
                debug!(error = %e, "Continuing without vcpkg");
                None
            }
            Err(e) => return Err(e),
        };

        let (toolchain, toolchain_env) = if request.skip_toolchain {
            (None, None)
        } else {
            self.toolchain_for(&installation, request, base).await
        };

        let registry = self.store.load(false)?;
        let foreign_roots = foreign_roots(&registry, &installation);

        let composition = environment::compose(
            base,
            &ComposeRequest {
                installation: &installation,
                toolchain: toolchain_env.as_ref(),
                package_root: package_root.as_ref(),
                custom_tree: request.custom_tree.as_deref(),
                foreign_roots: &foreign_roots,
                config_dir: &self.config_dir,
            },
        )?;
        let delta = base.diff(&composition.environment);

        Ok(ActivationOutcome {
            installation,
            source,
            toolchain,
            package_root,
            composition,
            delta,
        })
    }

    async fn toolchain_for(
        &mut self,
        installation: &Installation,
        request: &ActivationRequest,
        base: &EnvironmentView,
    ) -> (Option<ToolchainInstallation>, Option<ToolchainEnvironment>) {
        let found = match self
            .discover_toolchain(
                &installation.architecture,
                request.toolchain_override.as_deref(),
                request.persist_toolchain,
                &request.cwd,
                base,
            )
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Native module builds will not be available in this session");
                return (None, None);
            }
        };

        match capture_environment(
            &found,
            &installation.architecture,
            base,
            self.runner.as_ref(),
            self.settings.activation_timeout(),
        )
        .await
        {
            Ok(env) => (Some(found), Some(env)),
            Err(e) => {
                warn!(
                    path = %found.install_path.display(),
                    error = %e,
                    "Toolchain activation failed, native module builds will not be available"
                );
                (None, None)
            }
        }
    }
}

/// Installation and package-tree roots of every installation except `active`.
#[must_use]
pub fn foreign_roots(registry: &Registry, active: &Installation) -> Vec<PathBuf> {
    registry
        .installations
        .values()
        .filter(|other| other.id != active.id)
        .flat_map(|other| [other.installation_path.clone(), other.environment_path.clone()])
        .collect()
}
