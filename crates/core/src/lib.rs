//! Resolution and activation engine for luaenv
//!
//! This crate decides which Lua installation a session should use and builds
//! the environment that makes it the effective one:
//! - Registry loading with a time-bounded snapshot cache
//! - Installation resolution by alias, id, local pin or default
//! - On-disk validation of installation records
//! - MSVC toolchain discovery through an ordered strategy chain
//! - vcpkg package root discovery
//! - Environment composition and LuaRocks config generation
//!
//! # Overview
//!
//! [`activation::Activator`] runs the whole pipeline. Each stage is also
//! usable on its own; none of them mutate the process environment. The
//! composed [`environment::EnvironmentView`] is handed back for a shell
//! script ([`shell::Shell::render`]) or a child process.
//!
//! External programs (`vswhere`, `reg`, `powershell`, `cmd`) are reached
//! only through [`process::ProcessRunner`].

pub mod activation;
pub mod config;
pub mod emitter;
pub mod environment;
mod error;
pub mod package_root;
pub mod paths;
pub mod pin;
pub mod pkg_config;
pub mod process;
pub mod registry;
pub mod resolver;
pub mod shell;
pub mod toolchain;
pub mod validator;

#[cfg(test)]
mod test_utils;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use activation::{ActivationOutcome, ActivationRequest, Activator};
pub use config::Settings;
pub use environment::{EnvDelta, EnvironmentView};
pub use registry::{Installation, InstallationStatus, Registry, RegistryStore};
pub use resolver::{ResolutionSource, ResolveRequest, resolve};
pub use shell::Shell;
