//! Session environment model and composition.
//!
//! The process environment is never touched here. [`compose`] takes a
//! snapshot as an [`EnvironmentView`] and returns the activated view; callers
//! decide whether to render it for a shell or hand it to a child process.

use crate::emitter::{self, TreePaths};
use crate::package_root::PackageRootInstallation;
use crate::registry::Installation;
use crate::toolchain::ToolchainEnvironment;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tracing::{debug, info};

/// Id of the active installation.
pub const CURRENT_VAR: &str = "LUAENV_CURRENT";
/// `PATH` entries the last activation added, in `PATH` syntax.
pub const INJECTED_PATH_VAR: &str = "LUAENV_PATH_ENTRIES";
/// Binary search path.
pub const PATH_VAR: &str = "PATH";
/// Lua module search path.
pub const LUA_PATH_VAR: &str = "LUA_PATH";
/// Lua C module search path.
pub const LUA_CPATH_VAR: &str = "LUA_CPATH";
/// Generated LuaRocks configuration.
pub const LUAROCKS_CONFIG_VAR: &str = "LUAROCKS_CONFIG";
/// Interpreter directory.
pub const LUA_BINDIR_VAR: &str = "LUA_BINDIR";
/// Header directory.
pub const LUA_INCDIR_VAR: &str = "LUA_INCDIR";
/// Library directory.
pub const LUA_LIBDIR_VAR: &str = "LUA_LIBDIR";

/// Variables left behind by other LuaRocks setups that would override ours.
pub const STALE_VARS: &[&str] = &[
    "LUAROCKS_CONFIG",
    "LUAROCKS_SYSCONFIG",
    "LUAROCKS_USERCONFIG",
    "LUA_PATH_5_1",
    "LUA_PATH_5_2",
    "LUA_PATH_5_3",
    "LUA_PATH_5_4",
    "LUA_CPATH_5_1",
    "LUA_CPATH_5_2",
    "LUA_CPATH_5_3",
    "LUA_CPATH_5_4",
];

fn canonical_key(name: &str) -> String {
    if cfg!(windows) {
        name.to_ascii_uppercase()
    } else {
        name.to_string()
    }
}

/// A snapshot of environment variables.
///
/// Names are case-insensitive on Windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentView {
    vars: BTreeMap<String, String>,
}

impl EnvironmentView {
    /// Empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process. Non-UTF-8 variables are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    /// View over the given pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (canonical_key(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&canonical_key(name)).map(String::as_str)
    }

    /// Whether `name` is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(&canonical_key(name))
    }

    /// Set `name`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(canonical_key(name), value.into());
    }

    /// Unset `name`, returning the previous value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(&canonical_key(name))
    }

    /// All variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Owned copy of the variables, e.g. for a child process.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `PATH` split into entries; empty entries are dropped.
    #[must_use]
    pub fn path_entries(&self) -> Vec<PathBuf> {
        self.get(PATH_VAR)
            .map(|p| {
                std::env::split_paths(p)
                    .filter(|e| !e.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries recorded in [`INJECTED_PATH_VAR`] by an earlier activation.
    #[must_use]
    pub fn injected_entries(&self) -> Vec<PathBuf> {
        self.get(INJECTED_PATH_VAR)
            .map(|p| {
                std::env::split_paths(p)
                    .filter(|e| !e.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace `PATH`.
    pub fn set_path_entries(&mut self, entries: &[PathBuf]) -> Result<()> {
        let joined = std::env::join_paths(entries)
            .map_err(|e| Error::configuration(format!("cannot build PATH: {e}")))?;
        self.set(PATH_VAR, joined.to_string_lossy());
        Ok(())
    }

    /// Variables that differ between `self` (before) and `after`.
    #[must_use]
    pub fn diff(&self, after: &Self) -> EnvDelta {
        let set = after
            .vars
            .iter()
            .filter(|(k, v)| self.vars.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removed = self
            .vars
            .keys()
            .filter(|k| !after.vars.contains_key(*k))
            .cloned()
            .collect();
        EnvDelta { set, removed }
    }
}

/// Changes needed to turn one environment into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvDelta {
    /// Variables to set
    pub set: BTreeMap<String, String>,
    /// Variables to unset
    pub removed: Vec<String>,
}

impl EnvDelta {
    /// Whether nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }
}

/// Comparison key for a path: no trailing separator, and on Windows
/// case-folded with forward slashes flipped.
#[must_use]
pub fn path_key(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let raw = if cfg!(windows) {
        raw.replace('/', "\\").to_lowercase()
    } else {
        raw.into_owned()
    };
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        raw
    } else {
        trimmed.to_string()
    }
}

/// Whether `path` is `root` or lies below it.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    let path = path_key(path);
    let root = path_key(root);
    path == root
        || path
            .strip_prefix(&root)
            .is_some_and(|rest| rest.starts_with(MAIN_SEPARATOR) || rest.starts_with('/'))
}

/// Keep the first occurrence of every entry.
#[must_use]
pub fn dedup_paths(entries: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|p| !p.as_os_str().is_empty() && seen.insert(path_key(p)))
        .collect()
}

/// Inputs to [`compose`].
#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    /// Installation to activate
    pub installation: &'a Installation,
    /// Captured toolchain environment, if a toolchain was found
    pub toolchain: Option<&'a ToolchainEnvironment>,
    /// Package root, if one was found
    pub package_root: Option<&'a PackageRootInstallation>,
    /// Package tree to use instead of the installation's own
    pub custom_tree: Option<&'a Path>,
    /// Roots of every other registered installation; PATH entries below them
    /// are dropped
    pub foreign_roots: &'a [PathBuf],
    /// Directory receiving the generated LuaRocks config
    pub config_dir: &'a Path,
}

/// Result of [`compose`].
#[derive(Debug, Clone)]
pub struct Composition {
    /// The activated environment
    pub environment: EnvironmentView,
    /// Generated LuaRocks config
    pub config_file: PathBuf,
    /// Package tree in use
    pub tree: TreePaths,
}

/// Build the activated environment for one installation from `base`, the
/// pre-activation snapshot.
///
/// Fails before producing anything if an executable is missing or the
/// package tree cannot be created.
pub fn compose(base: &EnvironmentView, request: &ComposeRequest<'_>) -> Result<Composition> {
    let installation = request.installation;
    let pre_activation = base.path_entries();

    for exe in [
        installation.lua_executable(),
        installation.luarocks_executable(),
    ] {
        if !exe.try_exists().map_err(|e| Error::io(e, &exe, "stat"))? {
            return Err(Error::validation(
                &installation.id,
                format!("{} is missing", exe.display()),
                "Run `luaenv check` to audit installations, then reinstall this one",
            ));
        }
    }

    let tree_root = request
        .custom_tree
        .map_or_else(|| installation.environment_path.clone(), Path::to_path_buf);
    std::fs::create_dir_all(&tree_root).map_err(|e| Error::io(e, &tree_root, "create"))?;
    let tree = TreePaths::new(&tree_root, &installation.lua_major_minor());

    let mut env = base.clone();
    for name in STALE_VARS {
        if env.remove(name).is_some() {
            debug!(var = name, "Cleared stale variable");
        }
    }
    env.set(CURRENT_VAR, &installation.id);

    if let Some(toolchain) = request.toolchain {
        for (name, value) in &toolchain.variables {
            if canonical_key(name) != canonical_key(PATH_VAR) {
                env.set(name, value);
            }
        }
    }

    let leading = [
        installation.bin_dir(),
        tree.bin.clone(),
        installation.luarocks_dir(),
    ];
    let injected = request
        .toolchain
        .map(|t| t.injected_path.clone())
        .unwrap_or_default();
    let package_bin = request.package_root.map(PackageRootInstallation::bin_path);

    let previous: HashSet<String> = base.injected_entries().iter().map(|p| path_key(p)).collect();
    let inherited: Vec<PathBuf> = pre_activation
        .into_iter()
        .filter(|entry| {
            if previous.contains(&path_key(entry)) {
                debug!(entry = %entry.display(), "Dropped PATH entry of the previous activation");
                return false;
            }
            let foreign = request.foreign_roots.iter().any(|root| is_within(entry, root));
            if foreign {
                debug!(entry = %entry.display(), "Dropped PATH entry of another installation");
            }
            !foreign
        })
        .collect();

    let inherited_keys: HashSet<String> = inherited.iter().map(|p| path_key(p)).collect();
    let added = dedup_paths(leading.into_iter().chain(injected).chain(package_bin));
    let recorded: Vec<&PathBuf> = added
        .iter()
        .filter(|p| !inherited_keys.contains(&path_key(p)))
        .collect();

    let path = dedup_paths(added.iter().cloned().chain(inherited));
    env.set_path_entries(&path)?;
    let recorded = std::env::join_paths(recorded)
        .map_err(|e| Error::configuration(format!("cannot record PATH entries: {e}")))?;
    env.set(INJECTED_PATH_VAR, recorded.to_string_lossy());

    env.set(LUA_PATH_VAR, lua_path(&tree));
    env.set(LUA_CPATH_VAR, lua_cpath(&tree));

    let config_file = emitter::emit(installation, &tree, request.package_root, request.config_dir)?;
    env.set(LUAROCKS_CONFIG_VAR, config_file.to_string_lossy());

    for (name, dir) in [
        (LUA_BINDIR_VAR, installation.bin_dir()),
        (LUA_INCDIR_VAR, installation.include_dir()),
        (LUA_LIBDIR_VAR, installation.lib_dir()),
    ] {
        if dir.is_dir() {
            env.set(name, dir.to_string_lossy());
        } else {
            env.remove(name);
        }
    }

    info!(
        id = %installation.id,
        tree = %tree.root.display(),
        path_entries = path.len(),
        "Composed environment"
    );

    Ok(Composition {
        environment: env,
        config_file,
        tree,
    })
}

/// `LUA_PATH`: current directory, then the tree, then Lua's defaults (`;;`).
#[must_use]
pub fn lua_path(tree: &TreePaths) -> String {
    let share = tree.lua_modules.display();
    format!("./?.lua;./?/init.lua;{share}{MAIN_SEPARATOR}?.lua;{share}{MAIN_SEPARATOR}?{MAIN_SEPARATOR}init.lua;;")
}

/// `LUA_CPATH`: current directory, then the tree, then Lua's defaults (`;;`).
#[must_use]
pub fn lua_cpath(tree: &TreePaths) -> String {
    let ext = if cfg!(windows) { "dll" } else { "so" };
    let lib = tree.c_modules.display();
    format!("./?.{ext};{lib}{MAIN_SEPARATOR}?.{ext};;")
}
