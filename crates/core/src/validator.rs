//! On-disk checks for installation records.
//!
//! Absence is a failed check. Any other I/O failure (permission denied, a
//! broken mount) is an [`Error::Io`] so it is not mistaken for a missing
//! installation. Nothing here creates or repairs files.

use crate::registry::{Installation, InstallationStatus, Registry};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The first check an installation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Status is not `active`
    Status(InstallationStatus),
    /// `id` or `name` is empty
    MissingField(&'static str),
    /// Installation root is absent
    InstallationPath(PathBuf),
    /// `bin/lua` is absent
    LuaExecutable(PathBuf),
    /// `luarocks/luarocks` is absent
    LuaRocksExecutable(PathBuf),
    /// Package tree root is absent
    EnvironmentPath(PathBuf),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "status is {status}"),
            Self::MissingField(field) => write!(f, "record has an empty `{field}`"),
            Self::InstallationPath(p) => write!(f, "installation directory {} is missing", p.display()),
            Self::LuaExecutable(p) => write!(f, "Lua interpreter {} is missing", p.display()),
            Self::LuaRocksExecutable(p) => write!(f, "LuaRocks {} is missing", p.display()),
            Self::EnvironmentPath(p) => write!(f, "package tree {} is missing", p.display()),
        }
    }
}

impl ValidationIssue {
    /// Suggested next command for this issue.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            Self::Status(InstallationStatus::Building) => {
                "Wait for the running build to finish, then retry".to_string()
            }
            Self::Status(InstallationStatus::Inactive) => {
                "Re-enable it with the Lua installer (`setup_lua.py`)".to_string()
            }
            Self::MissingField(_) => {
                "The registry record is incomplete; reinstall it with the Lua installer (`setup_lua.py`)"
                    .to_string()
            }
            _ => "Run `luaenv check` to audit installations, then reinstall this one".to_string(),
        }
    }

    /// Convert into an error for `id`.
    #[must_use]
    pub fn into_error(self, id: &str) -> Error {
        let hint = self.hint();
        Error::validation(id, self.to_string(), hint)
    }
}

/// Whether `path` exists. `NotFound` is `false`; other failures propagate.
fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| Error::io(e, path, "stat"))
}

/// Return the first failing check, or `None` when the installation is usable.
pub fn first_issue(
    installation: &Installation,
    check_luarocks: bool,
) -> Result<Option<ValidationIssue>> {
    if installation.status != InstallationStatus::Active {
        return Ok(Some(ValidationIssue::Status(installation.status)));
    }
    if installation.id.trim().is_empty() {
        return Ok(Some(ValidationIssue::MissingField("id")));
    }
    if installation.name.trim().is_empty() {
        return Ok(Some(ValidationIssue::MissingField("name")));
    }

    if !exists(&installation.installation_path)? {
        return Ok(Some(ValidationIssue::InstallationPath(
            installation.installation_path.clone(),
        )));
    }

    let lua = installation.lua_executable();
    if !exists(&lua)? {
        return Ok(Some(ValidationIssue::LuaExecutable(lua)));
    }

    if check_luarocks {
        let luarocks = installation.luarocks_executable();
        if !exists(&luarocks)? {
            return Ok(Some(ValidationIssue::LuaRocksExecutable(luarocks)));
        }
    }

    if !exists(&installation.environment_path)? {
        return Ok(Some(ValidationIssue::EnvironmentPath(
            installation.environment_path.clone(),
        )));
    }

    Ok(None)
}

/// `true` when every check passes.
pub fn validate(installation: &Installation, check_luarocks: bool) -> Result<bool> {
    let issue = first_issue(installation, check_luarocks)?;
    if let Some(issue) = &issue {
        debug!(id = %installation.id, %issue, "Installation failed validation");
    }
    Ok(issue.is_none())
}

/// Like [`validate`], but turns a failed check into [`Error::Validation`].
pub fn ensure_valid(installation: &Installation, check_luarocks: bool) -> Result<()> {
    match first_issue(installation, check_luarocks)? {
        Some(issue) => Err(issue.into_error(&installation.id)),
        None => Ok(()),
    }
}

/// Classification of every installation in a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Directories and executables present
    pub valid: Vec<String>,
    /// Directories present but `lua` or `luac` missing
    pub broken: Vec<String>,
    /// Installation or package tree directory absent
    pub missing: Vec<String>,
}

impl AuditReport {
    /// Whether anything needs attention.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.broken.is_empty() && self.missing.is_empty()
    }
}

/// Classify every installation. Read-only.
pub fn audit(registry: &Registry) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    for (id, installation) in &registry.installations {
        if !exists(&installation.installation_path)? || !exists(&installation.environment_path)? {
            report.missing.push(id.clone());
            continue;
        }

        if !exists(&installation.lua_executable())? || !exists(&installation.luac_executable())? {
            report.broken.push(id.clone());
            continue;
        }

        report.valid.push(id.clone());
    }

    debug!(
        valid = report.valid.len(),
        broken = report.broken.len(),
        missing = report.missing.len(),
        "Audited registry"
    );
    Ok(report)
}
