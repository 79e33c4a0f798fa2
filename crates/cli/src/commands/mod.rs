pub mod activate;
pub mod check;
pub mod current;
pub mod exec;
pub mod local;
pub mod pkg_config;
pub mod toolchain;
pub mod version;

use luaenv_core::pkg_config::{FlagStyle, PathStyle};
use luaenv_core::{ActivationRequest, Activator, Shell};
use miette::IntoDiagnostic;
use std::path::PathBuf;

/// Which installation a command is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub id: Option<String>,
    pub alias: Option<String>,
    pub reload: bool,
}

impl Selector {
    /// Activation request for `cwd` carrying this selection.
    pub fn request(&self, cwd: PathBuf) -> ActivationRequest {
        ActivationRequest {
            id: self.id.clone(),
            alias: self.alias.clone(),
            force_reload: self.reload,
            ..ActivationRequest::new(cwd)
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Version,
    Activate {
        selector: Selector,
        toolchain_path: Option<PathBuf>,
        save_toolchain: bool,
        no_toolchain: bool,
        shell: Option<Shell>,
        tree: Option<PathBuf>,
    },
    Exec {
        selector: Selector,
        toolchain_path: Option<PathBuf>,
        save_toolchain: bool,
        no_toolchain: bool,
        tree: Option<PathBuf>,
        command: String,
        args: Vec<String>,
    },
    Current {
        selector: Selector,
        json: bool,
    },
    LocalSet {
        reference: String,
    },
    LocalShow,
    LocalUnset,
    Toolchain {
        arch: String,
        toolchain_path: Option<PathBuf>,
        save: bool,
        json: bool,
    },
    PkgConfig {
        selector: Selector,
        path_style: PathStyle,
        flag_style: FlagStyle,
        only: Option<pkg_config::Only>,
        json: bool,
    },
    Check {
        json: bool,
    },
}

impl Command {
    /// Short name for spans and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Activate { .. } => "activate",
            Self::Exec { .. } => "exec",
            Self::Current { .. } => "current",
            Self::LocalSet { .. } | Self::LocalShow | Self::LocalUnset => "local",
            Self::Toolchain { .. } => "toolchain",
            Self::PkgConfig { .. } => "pkg-config",
            Self::Check { .. } => "check",
        }
    }
}

/// Working directory of the invocation.
pub fn current_dir() -> miette::Result<PathBuf> {
    std::env::current_dir().into_diagnostic()
}

/// Activator over the user's luaenv root.
pub fn activator() -> miette::Result<Activator> {
    Ok(Activator::from_environment()?)
}

/// Run a command. Returns the process exit code.
pub async fn execute(command: Command) -> miette::Result<i32> {
    match command {
        Command::Version => {
            println!("{}", version::get_version_info());
            Ok(0)
        }
        Command::Activate {
            selector,
            toolchain_path,
            save_toolchain,
            no_toolchain,
            shell,
            tree,
        } => {
            let mut request = selector.request(current_dir()?);
            request.toolchain_override = toolchain_path;
            request.persist_toolchain = save_toolchain;
            request.skip_toolchain = no_toolchain;
            request.custom_tree = tree;
            let script = activate::execute_activate(&request, shell).await?;
            print!("{script}");
            Ok(0)
        }
        Command::Exec {
            selector,
            toolchain_path,
            save_toolchain,
            no_toolchain,
            tree,
            command,
            args,
        } => {
            let mut request = selector.request(current_dir()?);
            request.toolchain_override = toolchain_path;
            request.persist_toolchain = save_toolchain;
            request.skip_toolchain = no_toolchain;
            request.custom_tree = tree;
            exec::execute_exec(&request, &command, &args).await
        }
        Command::Current { selector, json } => {
            let request = selector.request(current_dir()?);
            println!("{}", current::execute_current(&request, json)?);
            Ok(0)
        }
        Command::LocalSet { reference } => {
            println!("{}", local::execute_set(&current_dir()?, &reference)?);
            Ok(0)
        }
        Command::LocalShow => {
            println!("{}", local::execute_show(&current_dir()?)?);
            Ok(0)
        }
        Command::LocalUnset => {
            println!("{}", local::execute_unset(&current_dir()?)?);
            Ok(0)
        }
        Command::Toolchain {
            arch,
            toolchain_path,
            save,
            json,
        } => {
            let output =
                toolchain::execute_toolchain(&arch, toolchain_path.as_deref(), save, &current_dir()?, json)
                    .await?;
            println!("{output}");
            Ok(0)
        }
        Command::PkgConfig {
            selector,
            path_style,
            flag_style,
            only,
            json,
        } => {
            let request = selector.request(current_dir()?);
            println!(
                "{}",
                pkg_config::execute_pkg_config(&request, path_style, flag_style, only, json)?
            );
            Ok(0)
        }
        Command::Check { json } => {
            let (output, clean) = check::execute_check(json)?;
            println!("{output}");
            Ok(if clean { 0 } else { 1 })
        }
    }
}
