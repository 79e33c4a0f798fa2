//! Installation registry data model and reader.
//!
//! The registry is a JSON document written by the installer:
//!
//! ```json
//! {
//!   "registry_version": "1.0",
//!   "default_installation": "3f0c...",
//!   "installations": { "3f0c...": { "id": "3f0c...", ... } },
//!   "aliases": { "dev": "3f0c..." }
//! }
//! ```
//!
//! This crate never writes it. [`RegistryStore`] loads and caches snapshots.

mod store;

pub use store::{Clock, ManualClock, RegistryStore, SystemClock, read_registry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env::consts::EXE_SUFFIX;
use std::fmt;
use std::path::PathBuf;

/// Registry format version this engine understands.
pub const REGISTRY_VERSION: &str = "1.0";

/// Lifecycle state recorded by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationStatus {
    /// Built and usable
    Active,
    /// Build in progress
    Building,
    /// Known to be unusable
    Broken,
    /// Kept on disk but switched off by the installer
    Inactive,
    /// A status this engine does not know
    #[serde(other)]
    Unknown,
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Building => write!(f, "building"),
            Self::Broken => write!(f, "broken"),
            Self::Inactive => write!(f, "inactive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One rock installed into an installation's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Rock name
    pub name: String,
    /// Installed version
    pub version: String,
}

/// Package information as recorded by the installer.
///
/// Older installers only record a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Packages {
    /// Ordered list of installed rocks
    List(Vec<Package>),
    /// Summary only
    Summary {
        /// Number of installed rocks
        count: u64,
        /// When the tree last changed
        #[serde(default)]
        last_updated: Option<String>,
    },
}

impl Packages {
    /// Number of recorded packages.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            Self::List(list) => list.len() as u64,
            Self::Summary { count, .. } => *count,
        }
    }
}

/// A single installed Lua + LuaRocks instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Stable unique id (a UUID in practice)
    pub id: String,
    /// Display label
    pub name: String,
    /// Lua version, e.g. "5.4.8"
    pub lua_version: String,
    /// LuaRocks version, e.g. "3.12.2"
    pub luarocks_version: String,
    /// Root of the installed artifacts
    pub installation_path: PathBuf,
    /// Root of the isolated rocks tree
    pub environment_path: PathBuf,
    /// Target CPU architecture token ("x64", "x86", "arm64")
    pub architecture: String,
    /// "dll" or "static"
    pub build_type: String,
    /// "release" or "debug"
    #[serde(default)]
    pub build_config: String,
    /// Lifecycle state
    pub status: InstallationStatus,
    /// Last activation time
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Installed rocks
    #[serde(default)]
    pub packages: Option<Packages>,
    /// Alias recorded alongside the installation by the installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Installation {
    /// Directory holding `lua` and `luac`.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.installation_path.join("bin")
    }

    /// The Lua interpreter.
    #[must_use]
    pub fn lua_executable(&self) -> PathBuf {
        self.bin_dir().join(format!("lua{EXE_SUFFIX}"))
    }

    /// The Lua compiler.
    #[must_use]
    pub fn luac_executable(&self) -> PathBuf {
        self.bin_dir().join(format!("luac{EXE_SUFFIX}"))
    }

    /// Directory holding the LuaRocks executable.
    #[must_use]
    pub fn luarocks_dir(&self) -> PathBuf {
        self.installation_path.join("luarocks")
    }

    /// The LuaRocks executable.
    #[must_use]
    pub fn luarocks_executable(&self) -> PathBuf {
        self.luarocks_dir().join(format!("luarocks{EXE_SUFFIX}"))
    }

    /// C headers.
    #[must_use]
    pub fn include_dir(&self) -> PathBuf {
        self.installation_path.join("include")
    }

    /// Import / static libraries.
    #[must_use]
    pub fn lib_dir(&self) -> PathBuf {
        self.installation_path.join("lib")
    }

    /// "5.4" for "5.4.8".
    #[must_use]
    pub fn lua_major_minor(&self) -> String {
        let mut parts = self.lua_version.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{major}.{minor}"),
            _ => self.lua_version.clone(),
        }
    }

    /// Library link name without extension, e.g. "lua54".
    #[must_use]
    pub fn library_name(&self) -> String {
        format!("lua{}", self.lua_major_minor().replace('.', ""))
    }
}

/// The root registry document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Format version written by the installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_version: Option<String>,
    /// Installations keyed by id
    pub installations: BTreeMap<String, Installation>,
    /// Alias to installation id
    pub aliases: BTreeMap<String, String>,
    /// Global default installation id
    #[serde(default)]
    pub default_installation: Option<String>,
}

impl Registry {
    /// Look up an installation by exact id.
    #[must_use]
    pub fn installation(&self, id: &str) -> Option<&Installation> {
        self.installations.get(id)
    }

    /// The installation an alias points at, if both exist.
    #[must_use]
    pub fn installation_for_alias(&self, alias: &str) -> Option<&Installation> {
        self.aliases
            .get(alias)
            .and_then(|id| self.installations.get(id))
    }

    /// Every id starting with `prefix`, in sorted order.
    #[must_use]
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.installations
            .keys()
            .filter(|id| id.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// The default installation, if it names an existing record.
    #[must_use]
    pub fn default_record(&self) -> Option<&Installation> {
        self.default_installation
            .as_deref()
            .and_then(|id| self.installations.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": "Lua 5.4.8 DLL Release (x64)",
            "lua_version": "5.4.8",
            "luarocks_version": "3.12.2",
            "installation_path": format!("/opt/luaenv/installations/{id}"),
            "environment_path": format!("/opt/luaenv/environments/{id}"),
            "architecture": "x64",
            "build_type": "dll",
            "build_config": "release",
            "status": "active",
            "last_used": null,
            "packages": {"count": 0, "last_updated": null},
            "alias": "dev",
            "created": "2025-07-01T10:00:00.123456+00:00",
            "tags": []
        })
    }

    #[test]
    fn test_installer_record_deserializes() {
        let inst: Installation = serde_json::from_value(record("abcd1234")).unwrap();
        assert_eq!(inst.status, InstallationStatus::Active);
        assert_eq!(inst.packages.as_ref().map(Packages::count), Some(0));
        assert_eq!(inst.alias.as_deref(), Some("dev"));
        assert!(inst.created.is_some());
        assert!(inst.last_used.is_none());
    }

    #[test]
    fn test_unrecognised_status_still_deserializes() {
        for (raw, expected) in [
            ("inactive", InstallationStatus::Inactive),
            ("retired", InstallationStatus::Unknown),
        ] {
            let mut value = record("abcd1234");
            value["status"] = serde_json::json!(raw);
            let inst: Installation = serde_json::from_value(value).unwrap();
            assert_eq!(inst.status, expected);
        }
        assert_eq!(InstallationStatus::Inactive.to_string(), "inactive");
    }

    #[test]
    fn test_package_list_deserializes() {
        let mut value = record("abcd1234");
        value["packages"] = serde_json::json!([
            {"name": "luasocket", "version": "3.1.0-1"},
            {"name": "lpeg", "version": "1.1.0-2"}
        ]);
        let inst: Installation = serde_json::from_value(value).unwrap();
        match inst.packages {
            Some(Packages::List(list)) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].name, "luasocket");
            }
            other => panic!("unexpected packages: {other:?}"),
        }
    }

    #[test]
    fn test_layout_helpers() {
        let inst: Installation = serde_json::from_value(record("abcd1234")).unwrap();
        assert_eq!(
            inst.bin_dir(),
            PathBuf::from("/opt/luaenv/installations/abcd1234/bin")
        );
        assert!(
            inst.luarocks_executable()
                .starts_with("/opt/luaenv/installations/abcd1234/luarocks")
        );
        assert_eq!(inst.lua_major_minor(), "5.4");
        assert_eq!(inst.library_name(), "lua54");
    }

    #[test]
    fn test_registry_lookups() {
        let registry: Registry = serde_json::from_value(serde_json::json!({
            "installations": {
                "aaaa1111": record("aaaa1111"),
                "aaaa2222": record("aaaa2222"),
            },
            "aliases": {"dev": "aaaa1111", "stable": "aaaa1111", "ghost": "missing"},
            "default_installation": "aaaa2222"
        }))
        .unwrap();

        assert_eq!(registry.ids_with_prefix("aaaa"), vec!["aaaa1111", "aaaa2222"]);
        assert_eq!(
            registry.installation_for_alias("dev").map(|i| i.id.as_str()),
            Some("aaaa1111")
        );
        assert!(registry.installation_for_alias("ghost").is_none());
        assert_eq!(registry.default_record().map(|i| i.id.as_str()), Some("aaaa2222"));
    }
}
