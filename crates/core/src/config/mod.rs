//! Engine settings for luaenv
//!
//! Read from `<root>/config.json`. Every field is optional; a missing file
//! yields [`Settings::default`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default lifetime of a cached registry snapshot.
pub const DEFAULT_REGISTRY_CACHE_TTL_SECS: u64 = 300;

/// Default time box for the installed-software enumeration fallback.
pub const DEFAULT_ENUMERATION_TIMEOUT_SECS: u64 = 15;

/// Default time box for each `vswhere` / `reg` query.
pub const DEFAULT_LOCATOR_TIMEOUT_SECS: u64 = 30;

/// Default time box for running a toolchain activation script.
pub const DEFAULT_ACTIVATION_TIMEOUT_SECS: u64 = 60;

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// How long a loaded registry snapshot stays fresh
    pub registry_cache_ttl_secs: u64,

    /// Wall-clock budget for the enumeration fallback
    pub enumeration_timeout_secs: u64,

    /// Wall-clock budget for each locator or registry query
    pub locator_timeout_secs: u64,

    /// Wall-clock budget for running the toolchain activation script
    pub activation_timeout_secs: u64,

    /// Fixed location for the saved toolchain marker. When unset the marker
    /// lives in the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_marker: Option<PathBuf>,

    /// vcpkg triplet to use instead of the one derived from the architecture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_triplet: Option<String>,

    /// Extra Visual Studio roots checked before the built-in well-known list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_toolchain_roots: Vec<PathBuf>,

    /// Extra vcpkg roots checked before the built-in conventional list
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_package_roots: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_cache_ttl_secs: DEFAULT_REGISTRY_CACHE_TTL_SECS,
            enumeration_timeout_secs: DEFAULT_ENUMERATION_TIMEOUT_SECS,
            locator_timeout_secs: DEFAULT_LOCATOR_TIMEOUT_SECS,
            activation_timeout_secs: DEFAULT_ACTIVATION_TIMEOUT_SECS,
            toolchain_marker: None,
            default_triplet: None,
            extra_toolchain_roots: Vec::new(),
            extra_package_roots: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it is absent.
    ///
    /// `LUAENV_REGISTRY_TTL` (seconds) overrides the registry cache lifetime.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content).map_err(|e| {
                Error::configuration(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file, using defaults");
                Self::default()
            }
            Err(e) => return Err(Error::io(e, path, "read")),
        };

        if let Ok(ttl) = std::env::var("LUAENV_REGISTRY_TTL")
            && !ttl.is_empty()
        {
            settings.registry_cache_ttl_secs = ttl.parse().map_err(|_| {
                Error::configuration(format!(
                    "LUAENV_REGISTRY_TTL must be a number of seconds, got '{ttl}'"
                ))
            })?;
        }

        Ok(settings)
    }

    /// Registry cache lifetime.
    #[must_use]
    pub fn registry_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_cache_ttl_secs)
    }

    /// Enumeration fallback budget.
    #[must_use]
    pub fn enumeration_timeout(&self) -> Duration {
        Duration::from_secs(self.enumeration_timeout_secs)
    }

    /// Per-query locator budget.
    #[must_use]
    pub fn locator_timeout(&self) -> Duration {
        Duration::from_secs(self.locator_timeout_secs)
    }

    /// Activation script budget.
    #[must_use]
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_secs(self.activation_timeout_secs)
    }

    /// Where the saved toolchain marker lives for a working directory.
    #[must_use]
    pub fn toolchain_marker_for(&self, cwd: &Path) -> PathBuf {
        self.toolchain_marker
            .clone()
            .unwrap_or_else(|| crate::paths::toolchain_marker(cwd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        temp_env::with_var_unset("LUAENV_REGISTRY_TTL", || {
            let settings = Settings::load(&temp.path().join("config.json")).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.registry_cache_ttl(), Duration::from_secs(300));
            assert_eq!(settings.enumeration_timeout(), Duration::from_secs(15));
        });
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"enumeration_timeout_secs": 5, "default_triplet": "x64-windows-static"}"#,
        )
        .unwrap();

        temp_env::with_var_unset("LUAENV_REGISTRY_TTL", || {
            let settings = Settings::load(&path).unwrap();
            assert_eq!(settings.enumeration_timeout_secs, 5);
            assert_eq!(
                settings.default_triplet.as_deref(),
                Some("x64-windows-static")
            );
            assert_eq!(
                settings.registry_cache_ttl_secs,
                DEFAULT_REGISTRY_CACHE_TTL_SECS
            );
        });
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_ttl_env_override() {
        let temp = TempDir::new().unwrap();
        temp_env::with_var("LUAENV_REGISTRY_TTL", Some("12"), || {
            let settings = Settings::load(&temp.path().join("config.json")).unwrap();
            assert_eq!(settings.registry_cache_ttl(), Duration::from_secs(12));
        });
        temp_env::with_var("LUAENV_REGISTRY_TTL", Some("soon"), || {
            assert!(Settings::load(&temp.path().join("config.json")).is_err());
        });
    }

    #[test]
    fn test_marker_location() {
        let cwd = Path::new("/work");
        let settings = Settings::default();
        assert_eq!(
            settings.toolchain_marker_for(cwd),
            PathBuf::from("/work/.vs_install_path.txt")
        );

        let settings = Settings {
            toolchain_marker: Some(PathBuf::from("/etc/luaenv/vs.txt")),
            ..Settings::default()
        };
        assert_eq!(
            settings.toolchain_marker_for(cwd),
            PathBuf::from("/etc/luaenv/vs.txt")
        );
    }
}
