//! Centralized path management for luaenv data directories.
//!
//! | Item | Default | Override |
//! |------|---------|----------|
//! | Root | `~/.luaenv` | `LUAENV_ROOT` |
//! | Registry | `<root>/registry.json` | |
//! | Settings | `<root>/config.json` | |
//! | Generated LuaRocks configs | `<temp>/luaenv/config` | `LUAENV_TEMP_DIR` |
//!
//! The registry itself is written by the installer; this crate only reads it.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the per-directory pin file.
pub const PIN_FILE_NAME: &str = ".lua-version";

/// Name of the per-directory saved toolchain marker.
pub const TOOLCHAIN_MARKER_NAME: &str = ".vs_install_path.txt";

/// Get the luaenv root directory.
///
/// Resolution order:
/// 1. `LUAENV_ROOT` environment variable
/// 2. `~/.luaenv`
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn luaenv_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LUAENV_ROOT")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::configuration("Could not determine home directory"))?;

    Ok(home.join(".luaenv"))
}

/// Path to the installation registry.
pub fn registry_file() -> Result<PathBuf> {
    Ok(luaenv_root()?.join("registry.json"))
}

/// Path to the optional engine settings file.
pub fn settings_file() -> Result<PathBuf> {
    Ok(luaenv_root()?.join("config.json"))
}

/// Directory that receives generated LuaRocks configuration files.
///
/// Resolution order:
/// 1. `LUAENV_TEMP_DIR` environment variable
/// 2. System temp directory + `/luaenv/config`
#[must_use]
pub fn generated_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LUAENV_TEMP_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    std::env::temp_dir().join("luaenv").join("config")
}

/// Pin file for a working directory.
#[must_use]
pub fn pin_file(dir: &Path) -> PathBuf {
    dir.join(PIN_FILE_NAME)
}

/// Saved toolchain marker for a working directory.
#[must_use]
pub fn toolchain_marker(dir: &Path) -> PathBuf {
    dir.join(TOOLCHAIN_MARKER_NAME)
}
