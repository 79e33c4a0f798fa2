//! vcpkg package root discovery.
//!
//! Must run against the pre-activation environment: Visual Studio ships its
//! own vcpkg, and once the toolchain's `PATH` is applied that copy would win
//! over a system-wide one.

use crate::environment::{EnvironmentView, PATH_VAR};
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit vcpkg root.
pub const VCPKG_ROOT_VAR: &str = "VCPKG_ROOT";

/// A vcpkg root with packages for one triplet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRootInstallation {
    /// vcpkg checkout root
    pub root_path: PathBuf,
    /// `installed/<triplet>/include`
    pub include_path: PathBuf,
    /// `installed/<triplet>/lib`
    pub lib_path: PathBuf,
    /// `installed`
    pub installed_path: PathBuf,
    /// e.g. `x64-windows`
    pub target_triplet: String,
}

impl PackageRootInstallation {
    /// Accept `root` if it has include and lib directories for `triplet`.
    #[must_use]
    pub fn probe(root: &Path, triplet: &str) -> Option<Self> {
        let installed = root.join("installed");
        let include = installed.join(triplet).join("include");
        let lib = installed.join(triplet).join("lib");
        if include.is_dir() && lib.is_dir() {
            Some(Self {
                root_path: root.to_path_buf(),
                include_path: include,
                lib_path: lib,
                installed_path: installed,
                target_triplet: triplet.to_string(),
            })
        } else {
            debug!(root = %root.display(), triplet, "No packages for triplet under root");
            None
        }
    }

    /// `installed/<triplet>`
    #[must_use]
    pub fn triplet_path(&self) -> PathBuf {
        self.installed_path.join(&self.target_triplet)
    }

    /// `installed/<triplet>/bin`, where package DLLs live.
    #[must_use]
    pub fn bin_path(&self) -> PathBuf {
        self.triplet_path().join("bin")
    }
}

/// vcpkg triplet for an installation architecture.
#[must_use]
pub fn default_triplet(architecture: &str) -> String {
    let arch = match architecture.to_ascii_lowercase().as_str() {
        "x64" | "amd64" | "x86_64" => "x64",
        "x86" | "win32" | "i686" => "x86",
        "arm64" | "aarch64" => "arm64",
        other => return format!("{other}-windows"),
    };
    format!("{arch}-windows")
}

/// Conventional vcpkg checkout locations.
#[must_use]
pub fn conventional_roots() -> Vec<PathBuf> {
    let mut roots = vec![
        PathBuf::from(r"C:\vcpkg"),
        PathBuf::from(r"C:\tools\vcpkg"),
        PathBuf::from(r"C:\src\vcpkg"),
        PathBuf::from(r"C:\dev\vcpkg"),
    ];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("vcpkg"));
    }
    roots
}

/// Ordered search with a per-triplet cache.
#[derive(Debug, Default)]
pub struct PackageRootLocator {
    extra_roots: Vec<PathBuf>,
    builtin_roots: Option<Vec<PathBuf>>,
    cache: HashMap<String, Option<PackageRootInstallation>>,
}

impl PackageRootLocator {
    /// Locator checking `extra_roots` before the conventional locations.
    #[must_use]
    pub fn new(extra_roots: Vec<PathBuf>) -> Self {
        Self {
            extra_roots,
            builtin_roots: None,
            cache: HashMap::new(),
        }
    }

    /// Replace the conventional locations.
    #[must_use]
    pub fn with_builtin_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.builtin_roots = Some(roots);
        self
    }

    /// Find a root for `triplet`.
    ///
    /// Order: `VCPKG_ROOT`, configured and conventional roots, then the
    /// directory of a `vcpkg` executable on `PATH`. Results, including
    /// failures, are cached per triplet.
    pub fn discover(
        &mut self,
        env: &EnvironmentView,
        triplet: &str,
    ) -> Result<PackageRootInstallation> {
        let found = match self.cache.get(triplet) {
            Some(cached) => {
                debug!(triplet, hit = cached.is_some(), "Package root cache hit");
                cached.clone()
            }
            None => {
                let found = self.search(env, triplet);
                self.cache.insert(triplet.to_string(), found.clone());
                found
            }
        };

        found.ok_or_else(|| Error::PackageRootNotFound {
            triplet: triplet.to_string(),
        })
    }

    fn search(&self, env: &EnvironmentView, triplet: &str) -> Option<PackageRootInstallation> {
        if let Some(root) = env.get(VCPKG_ROOT_VAR).filter(|r| !r.is_empty()) {
            if let Some(found) = PackageRootInstallation::probe(Path::new(root), triplet) {
                info!(root, source = "environment", "Found vcpkg root");
                return Some(found);
            }
            debug!(root, "VCPKG_ROOT has no packages for triplet");
        }

        let builtin = self.builtin_roots.clone().unwrap_or_else(conventional_roots);
        for root in self.extra_roots.iter().chain(builtin.iter()) {
            if let Some(found) = PackageRootInstallation::probe(root, triplet) {
                info!(root = %root.display(), source = "conventional", "Found vcpkg root");
                return Some(found);
            }
        }

        let path = env.get(PATH_VAR)?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match which::which_in("vcpkg", Some(path), cwd) {
            Ok(exe) => {
                let root = exe.parent()?;
                let found = PackageRootInstallation::probe(root, triplet)?;
                info!(root = %root.display(), source = "path", "Found vcpkg root");
                Some(found)
            }
            Err(e) => {
                debug!(error = %e, "vcpkg not on PATH");
                None
            }
        }
    }
}
