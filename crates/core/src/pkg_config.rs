//! pkg-config style build information for one installation.
//!
//! Gives C build systems the include/lib directories and the compiler and
//! linker flags needed to embed or extend the installation's Lua.

use crate::registry::Installation;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How paths are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// As the OS prints them
    #[default]
    Native,
    /// Forward slashes
    Unix,
    /// Backslashes doubled, for embedding in C or JSON string literals
    Escaped,
}

impl PathStyle {
    /// Render `path` in this style.
    #[must_use]
    pub fn render(self, path: &Path) -> String {
        let native = path.to_string_lossy();
        match self {
            Self::Native => native.into_owned(),
            Self::Unix => native.replace('\\', "/"),
            Self::Escaped => native.replace('\\', "\\\\"),
        }
    }
}

/// Compiler flag dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStyle {
    /// `cl.exe` / `link.exe`
    Msvc,
    /// gcc, clang, MinGW
    Gnu,
}

impl FlagStyle {
    /// MSVC on Windows, GNU elsewhere.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(windows) { Self::Msvc } else { Self::Gnu }
    }

    /// Header search flag.
    #[must_use]
    pub fn include_flag(self, dir: &Path) -> String {
        self.include_flag_str(&dir.to_string_lossy())
    }

    fn include_flag_str(self, dir: &str) -> String {
        match self {
            Self::Msvc => format!("/I\"{dir}\""),
            Self::Gnu => format!("-I\"{dir}\""),
        }
    }

    /// Library search flag.
    #[must_use]
    pub fn lib_dir_flag(self, dir: &Path) -> String {
        self.lib_dir_flag_str(&dir.to_string_lossy())
    }

    fn lib_dir_flag_str(self, dir: &str) -> String {
        match self {
            Self::Msvc => format!("/LIBPATH:\"{dir}\""),
            Self::Gnu => format!("-L\"{dir}\""),
        }
    }

    /// Link flag for a library such as `lua54`.
    #[must_use]
    pub fn link_flag(self, library: &str) -> String {
        match self {
            Self::Msvc => format!("{library}.lib"),
            Self::Gnu => format!("-l{library}"),
        }
    }

    /// File a linker resolves for `library`.
    #[must_use]
    pub fn library_file(self, library: &str) -> String {
        match self {
            Self::Msvc => format!("{library}.lib"),
            Self::Gnu => format!("lib{library}.a"),
        }
    }
}

/// Directories and detected files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    /// Installation root
    pub prefix: String,
    /// `bin`
    pub bin: String,
    /// `include`
    pub include: String,
    /// `lib`
    pub lib: String,
    /// `share`
    pub share: String,
    /// `doc`
    pub doc: String,
    /// Interpreter, if found
    pub lua_exe: Option<String>,
    /// Compiler, if found
    pub luac_exe: Option<String>,
    /// Shared library, if found
    pub lua_dll: Option<String>,
    /// Import or static library, if found
    pub lua_lib: Option<String>,
    /// `lua.h`, if found
    pub lua_h: Option<String>,
}

/// Compiler and linker flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFlags {
    /// Compiler flags
    pub cflags: String,
    /// Linker search flags
    pub ldflags: String,
    /// Libraries to link
    pub libs: String,
}

/// Complete report for one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PkgConfigReport {
    /// Installation id
    pub id: String,
    /// Display name
    pub name: String,
    /// Alias recorded with the installation
    pub alias: Option<String>,
    /// Lua version
    pub lua_version: String,
    /// LuaRocks version
    pub luarocks_version: String,
    /// "dll" or "static"
    pub build_type: String,
    /// "release" or "debug"
    pub build_config: String,
    /// Target architecture
    pub architecture: String,
    /// Path style used throughout
    pub path_style: PathStyle,
    /// Flag dialect used
    pub flag_style: FlagStyle,
    /// Directories and files
    pub paths: ReportPaths,
    /// Flags
    pub flags: ReportFlags,
    /// Include directory, if any
    #[serde(skip)]
    pub include_dir: Option<PathBuf>,
    /// Library directory, if any
    #[serde(skip)]
    pub lib_dir: Option<PathBuf>,
}

fn first_existing(base: &Path, candidates: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|c| base.join(c))
        .find(|p| p.exists())
}

/// Inspect an installation.
pub fn report(
    installation: &Installation,
    path_style: PathStyle,
    flag_style: FlagStyle,
) -> Result<PkgConfigReport> {
    let prefix = &installation.installation_path;
    if !prefix.is_dir() {
        return Err(Error::validation(
            &installation.id,
            format!("installation directory {} is missing", prefix.display()),
            "Run `luaenv check` to audit installations",
        ));
    }

    let library = installation.library_name();
    let exe = std::env::consts::EXE_SUFFIX;
    let render = |p: &Path| path_style.render(p);
    let find = |candidates: &[String]| first_existing(prefix, candidates).map(|p| render(&p));

    let include_dir = if prefix.join("include").is_dir() {
        Some(prefix.join("include"))
    } else if prefix.join("lua.h").exists() {
        Some(prefix.clone())
    } else {
        None
    };
    let lib_file = format!("{library}.lib");
    let lib_dir = if prefix.join("lib").is_dir() {
        Some(prefix.join("lib"))
    } else if prefix.join(&lib_file).exists() {
        Some(prefix.clone())
    } else {
        None
    };

    let paths = ReportPaths {
        prefix: render(prefix),
        bin: render(&prefix.join("bin")),
        include: render(&prefix.join("include")),
        lib: render(&prefix.join("lib")),
        share: render(&prefix.join("share")),
        doc: render(&prefix.join("doc")),
        lua_exe: find(&[format!("bin/lua{exe}"), format!("lua{exe}")]),
        luac_exe: find(&[format!("bin/luac{exe}"), format!("luac{exe}")]),
        lua_dll: find(&[
            format!("bin/{library}.dll"),
            format!("lib/{library}.dll"),
            format!("{library}.dll"),
        ]),
        lua_lib: find(&[format!("lib/{lib_file}"), lib_file.clone()]),
        lua_h: find(&["include/lua.h".to_string(), "lua.h".to_string()]),
    };

    let flags = ReportFlags {
        cflags: include_dir
            .as_deref()
            .map(|d| flag_style.include_flag_str(&render(d)))
            .unwrap_or_default(),
        ldflags: lib_dir
            .as_deref()
            .map(|d| flag_style.lib_dir_flag_str(&render(d)))
            .unwrap_or_default(),
        libs: flag_style.link_flag(&library),
    };

    Ok(PkgConfigReport {
        id: installation.id.clone(),
        name: installation.name.clone(),
        alias: installation.alias.clone(),
        lua_version: installation.lua_version.clone(),
        luarocks_version: installation.luarocks_version.clone(),
        build_type: installation.build_type.clone(),
        build_config: installation.build_config.clone(),
        architecture: installation.architecture.clone(),
        path_style,
        flag_style,
        paths,
        flags,
        include_dir,
        lib_dir,
    })
}
