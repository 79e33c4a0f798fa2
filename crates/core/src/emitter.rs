//! LuaRocks configuration generation.
//!
//! One file per installation id, `luarocks-config-<id>.lua`, regenerated on
//! every activation. Output is a pure function of its inputs.

use crate::package_root::PackageRootInstallation;
use crate::pkg_config::FlagStyle;
use crate::registry::Installation;
use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Layout of a package tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreePaths {
    /// Tree root
    pub root: PathBuf,
    /// Installed rock scripts
    pub bin: PathBuf,
    /// Pure Lua modules, `share/lua/<major.minor>`
    pub lua_modules: PathBuf,
    /// C modules, `lib/lua/<major.minor>`
    pub c_modules: PathBuf,
}

impl TreePaths {
    /// Layout under `root` for a Lua version such as `5.4`.
    #[must_use]
    pub fn new(root: &Path, lua_major_minor: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            bin: root.join("bin"),
            lua_modules: root.join("share").join("lua").join(lua_major_minor),
            c_modules: root.join("lib").join("lua").join(lua_major_minor),
        }
    }
}

/// Quote `value` as a Lua string literal.
#[must_use]
pub fn lua_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\{:03}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn path_literal(path: &Path) -> String {
    lua_string(&path.to_string_lossy())
}

/// Render the configuration document.
#[must_use]
pub fn render(
    installation: &Installation,
    tree: &TreePaths,
    package_root: Option<&PackageRootInstallation>,
) -> String {
    render_with_style(installation, tree, package_root, FlagStyle::host())
}

/// Render with an explicit compiler flag style.
#[must_use]
pub fn render_with_style(
    installation: &Installation,
    tree: &TreePaths,
    package_root: Option<&PackageRootInstallation>,
    style: FlagStyle,
) -> String {
    let lua = installation.lua_executable();
    let interpreter = lua
        .file_name()
        .map_or_else(|| "lua".to_string(), |n| n.to_string_lossy().into_owned());
    let library = style.library_file(&installation.library_name());

    let mut doc = String::new();
    let _ = writeln!(doc, "-- Generated by luaenv for installation {}", installation.id);
    let _ = writeln!(doc, "-- Regenerated on every activation; edits are overwritten.");
    doc.push('\n');

    doc.push_str("rocks_trees = {\n");
    let _ = writeln!(
        doc,
        "    {{ name = \"luaenv\", root = {} }},",
        path_literal(&tree.root)
    );
    doc.push_str("}\n\n");

    let _ = writeln!(doc, "lua_interpreter = {}", lua_string(&interpreter));
    let _ = writeln!(doc, "lua_version = {}", lua_string(&installation.lua_major_minor()));
    doc.push('\n');

    doc.push_str("variables = {\n");
    for (name, value) in [
        ("LUA", path_literal(&lua)),
        ("LUA_DIR", path_literal(&installation.installation_path)),
        ("LUA_BINDIR", path_literal(&installation.bin_dir())),
        ("LUA_INCDIR", path_literal(&installation.include_dir())),
        ("LUA_LIBDIR", path_literal(&installation.lib_dir())),
        ("LUALIB", lua_string(&library)),
    ] {
        let _ = writeln!(doc, "    {name} = {value},");
    }
    doc.push_str("}\n");

    if let Some(root) = package_root {
        let include = style.include_flag(&root.include_path);
        let lib = style.lib_dir_flag(&root.lib_path);

        doc.push('\n');
        let _ = writeln!(doc, "-- vcpkg packages for {}", root.target_triplet);
        doc.push_str("external_deps_dirs = {\n");
        let _ = writeln!(doc, "    {},", path_literal(&root.triplet_path()));
        doc.push_str("}\n");
        let _ = writeln!(
            doc,
            "variables.CFLAGS = (variables.CFLAGS or \"\") .. {}",
            lua_string(&format!(" {include}"))
        );
        let _ = writeln!(
            doc,
            "variables.LIBFLAG = (variables.LIBFLAG or \"\") .. {}",
            lua_string(&format!(" {lib}"))
        );
    }

    doc
}

/// File name used for an installation's config.
#[must_use]
pub fn config_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("luarocks-config-{safe}.lua")
}

/// Write the config for `installation` into `config_dir`; returns its path.
pub fn emit(
    installation: &Installation,
    tree: &TreePaths,
    package_root: Option<&PackageRootInstallation>,
    config_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(config_dir).map_err(|e| Error::io(e, config_dir, "create"))?;

    let path = config_dir.join(config_file_name(&installation.id));
    let content = render(installation, tree, package_root);
    std::fs::write(&path, content.as_bytes()).map_err(|e| Error::io(e, &path, "write"))?;

    debug!(path = %path.display(), vcpkg = package_root.is_some(), "Wrote LuaRocks config");
    Ok(path)
}
