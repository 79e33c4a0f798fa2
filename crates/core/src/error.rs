//! Error types for luaenv-core

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for luaenv operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The registry file does not exist
    #[error("No luaenv registry found at {}", path.display())]
    #[diagnostic(
        code(luaenv::registry::not_found),
        help(
            "Create an installation with the Lua installer (`setup_lua.py`); luaenv only reads the registry it writes"
        )
    )]
    RegistryNotFound {
        /// Location that was checked
        path: Box<Path>,
    },

    /// The registry exists but could not be understood
    #[error("Registry at {} is malformed: {message}", path.display())]
    #[diagnostic(
        code(luaenv::registry::parse),
        help(
            "Restore registry.json.backup, or re-register installations with the Lua installer (`setup_lua.py`)"
        )
    )]
    RegistryParse {
        /// Location of the registry
        path: Box<Path>,
        /// What was wrong with it
        message: String,
    },

    /// No installation matches the requested reference
    #[error("Installation not found: {reference}")]
    #[diagnostic(code(luaenv::installation::not_found))]
    InstallationNotFound {
        /// The id, alias or pin that failed to resolve
        reference: String,
        /// Suggested next step
        #[help]
        hint: String,
    },

    /// A partial id matched more than one installation
    #[error("Ambiguous installation id '{reference}' matches: {}", candidates.join(", "))]
    #[diagnostic(
        code(luaenv::installation::ambiguous),
        help("Use more characters of the id, or an alias")
    )]
    Ambiguous {
        /// The partial id that was given
        reference: String,
        /// Every id the prefix matched
        candidates: Vec<String>,
    },

    /// An installation exists in the registry but is unusable on disk
    #[error("Installation {id} is not usable: {reason}")]
    #[diagnostic(code(luaenv::installation::invalid))]
    Validation {
        /// Installation id
        id: String,
        /// The first failing check
        reason: String,
        /// Suggested next step
        #[help]
        hint: String,
    },

    /// The native build toolchain could not be located
    #[error("No Visual Studio C/C++ toolchain found for {architecture}")]
    #[diagnostic(
        code(luaenv::toolchain::unavailable),
        help(
            "Install Visual Studio Build Tools with the C++ workload, or pass `--toolchain-path <dir>`; native rocks will not build until then"
        )
    )]
    ToolchainUnavailable {
        /// Architecture the toolchain was requested for
        architecture: String,
    },

    /// vcpkg could not be located for the requested triplet
    #[error("No vcpkg root found with packages for {triplet}")]
    #[diagnostic(
        code(luaenv::package_root::not_found),
        help("Set VCPKG_ROOT, or install packages for this triplet with `vcpkg install`")
    )]
    PackageRootNotFound {
        /// Target triplet that was searched for
        triplet: String,
    },

    /// A local pin value that cannot be written
    #[error("Invalid local pin: {message}")]
    #[diagnostic(
        code(luaenv::pin::invalid),
        help("A pin is a single alias or installation id, e.g. `luaenv local dev`")
    )]
    InvalidPin {
        /// Why the value was rejected
        message: String,
    },

    /// I/O error with path context
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(luaenv::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create")
        operation: String,
    },

    /// An external process could not be run
    #[error("Process execution failed: {message}")]
    #[diagnostic(
        code(luaenv::process),
        help("Re-run with `--level debug` to see the command line and its output")
    )]
    Process {
        /// Description of the failure
        message: String,
    },

    /// An external process exceeded its time budget
    #[error("Operation timed out after {seconds} seconds")]
    #[diagnostic(
        code(luaenv::timeout),
        help(
            "Raise the matching `*_timeout_secs` value in ~/.luaenv/config.json, or pass `--toolchain-path <dir>` to skip the slow search"
        )
    )]
    Timeout {
        /// The budget that was exceeded
        seconds: u64,
    },

    /// Engine settings are invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(luaenv::config::invalid),
        help("Fix or remove ~/.luaenv/config.json")
    )]
    Configuration {
        /// Description of the problem
        message: String,
    },
}

impl Error {
    /// Create a registry parse error
    #[must_use]
    pub fn registry_parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::RegistryParse {
            path: path.as_ref().into(),
            message: message.into(),
        }
    }

    /// Create an installation-not-found error with the default hint
    #[must_use]
    pub fn installation_not_found(reference: impl Into<String>) -> Self {
        Self::InstallationNotFound {
            reference: reference.into(),
            hint: "Run `luaenv check` to see registered installations".to_string(),
        }
    }

    /// Create an installation-not-found error with a specific hint
    #[must_use]
    pub fn installation_not_found_with_hint(
        reference: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::InstallationNotFound {
            reference: reference.into(),
            hint: hint.into(),
        }
    }

    /// Create an ambiguity error
    #[must_use]
    pub fn ambiguous(reference: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::Ambiguous {
            reference: reference.into(),
            candidates,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(
        id: impl Into<String>,
        reason: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Validation {
            id: id.into(),
            reason: reason.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid pin error
    #[must_use]
    pub fn invalid_pin(message: impl Into<String>) -> Self {
        Self::InvalidPin {
            message: message.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a process execution error
    #[must_use]
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error means "nothing matched" rather than a broken setup
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RegistryNotFound { .. }
                | Self::InstallationNotFound { .. }
                | Self::PackageRootNotFound { .. }
        )
    }
}

/// Result type for luaenv operations
pub type Result<T> = std::result::Result<T, Error>;
