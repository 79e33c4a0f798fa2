use crate::commands::{Command, Selector};
use clap::{Args, Parser, Subcommand, ValueEnum};
use luaenv_core::Shell;
use luaenv_core::pkg_config::{FlagStyle, PathStyle};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "luaenv")]
#[command(about = "Activate Lua installations and their native build toolchain per shell session")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    #[arg(
        long,
        global = true,
        help = "Output format for reports",
        default_value = "text",
        value_enum
    )]
    pub format: OutputFormat,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,
}

/// How report commands print their results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    Text,
    /// One JSON document
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    #[arg(long, help = "Installation id or unique id prefix", conflicts_with = "alias")]
    pub id: Option<String>,

    #[arg(long, short = 'a', help = "Installation alias")]
    pub alias: Option<String>,

    #[arg(long, help = "Re-read the registry instead of using the cached snapshot")]
    pub reload: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    #[arg(long, help = "Visual Studio installation to try before autodetection")]
    pub toolchain_path: Option<PathBuf>,

    #[arg(
        long,
        help = "Remember the toolchain for this directory when given explicitly or found by vswhere"
    )]
    pub save_toolchain: bool,

    #[arg(long, help = "Skip toolchain discovery entirely", conflicts_with_all = ["toolchain_path", "save_toolchain"])]
    pub no_toolchain: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Show version information")]
    Version,

    #[command(about = "Print a script that activates an installation in the current shell")]
    Activate {
        #[command(flatten)]
        selector: SelectorArgs,

        #[command(flatten)]
        toolchain: ToolchainArgs,

        #[arg(long, help = "Shell to emit for (bash, zsh, fish, powershell, cmd)")]
        shell: Option<String>,

        #[arg(long, help = "Package tree to use instead of the installation's own")]
        tree: Option<PathBuf>,
    },

    #[command(about = "Run a command with an installation activated")]
    Exec {
        #[command(flatten)]
        selector: SelectorArgs,

        #[command(flatten)]
        toolchain: ToolchainArgs,

        #[arg(long, help = "Package tree to use instead of the installation's own")]
        tree: Option<PathBuf>,

        #[arg(help = "Command to run", required = true)]
        command: String,

        #[arg(help = "Arguments for the command", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    #[command(about = "Show which installation is selected here, and why")]
    Current {
        #[command(flatten)]
        selector: SelectorArgs,
    },

    #[command(about = "Pin an installation for this directory, or show the pin")]
    Local {
        #[arg(help = "Alias or installation id to pin")]
        reference: Option<String>,

        #[arg(long, help = "Remove the pin", conflicts_with = "reference")]
        unset: bool,
    },

    #[command(about = "Locate the Visual Studio C/C++ toolchain")]
    Toolchain {
        #[arg(long, help = "Target architecture", default_value = "x64")]
        arch: String,

        #[arg(long, help = "Visual Studio installation to try before autodetection")]
        toolchain_path: Option<PathBuf>,

        #[arg(long, help = "Remember the result for this directory")]
        save: bool,
    },

    #[command(name = "pkg-config", about = "Print build information for an installation")]
    PkgConfig {
        #[command(flatten)]
        selector: SelectorArgs,

        #[arg(long, help = "Path rendering", default_value = "native", value_enum)]
        path_style: PathStyleArg,

        #[arg(long, help = "Compiler flag dialect (defaults to the host's)", value_enum)]
        flags: Option<FlagStyleArg>,

        #[arg(long, help = "Print only compiler flags", conflicts_with = "libs")]
        cflags: bool,

        #[arg(long, help = "Print only linker flags and libraries")]
        libs: bool,
    },

    #[command(about = "Audit every registered installation")]
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PathStyleArg {
    Native,
    Unix,
    Escaped,
}

impl From<PathStyleArg> for PathStyle {
    fn from(style: PathStyleArg) -> Self {
        match style {
            PathStyleArg::Native => Self::Native,
            PathStyleArg::Unix => Self::Unix,
            PathStyleArg::Escaped => Self::Escaped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FlagStyleArg {
    Msvc,
    Gnu,
}

impl From<FlagStyleArg> for FlagStyle {
    fn from(style: FlagStyleArg) -> Self {
        match style {
            FlagStyleArg::Msvc => Self::Msvc,
            FlagStyleArg::Gnu => Self::Gnu,
        }
    }
}

impl From<SelectorArgs> for Selector {
    fn from(args: SelectorArgs) -> Self {
        Self {
            id: args.id,
            alias: args.alias,
            reload: args.reload,
        }
    }
}

impl Commands {
    /// Convert parsed arguments into a command, with `format` applied.
    pub fn into_command(self, format: OutputFormat) -> Command {
        let json = format == OutputFormat::Json;
        match self {
            Self::Version => Command::Version,
            Self::Activate {
                selector,
                toolchain,
                shell,
                tree,
            } => Command::Activate {
                selector: selector.into(),
                toolchain_path: toolchain.toolchain_path,
                save_toolchain: toolchain.save_toolchain,
                no_toolchain: toolchain.no_toolchain,
                shell: shell.map(|name| Shell::parse(&name)),
                tree,
            },
            Self::Exec {
                selector,
                toolchain,
                tree,
                command,
                args,
            } => Command::Exec {
                selector: selector.into(),
                toolchain_path: toolchain.toolchain_path,
                save_toolchain: toolchain.save_toolchain,
                no_toolchain: toolchain.no_toolchain,
                tree,
                command,
                args,
            },
            Self::Current { selector } => Command::Current {
                selector: selector.into(),
                json,
            },
            Self::Local { reference, unset } => match (reference, unset) {
                (_, true) => Command::LocalUnset,
                (Some(reference), false) => Command::LocalSet { reference },
                (None, false) => Command::LocalShow,
            },
            Self::Toolchain {
                arch,
                toolchain_path,
                save,
            } => Command::Toolchain {
                arch,
                toolchain_path,
                save,
                json,
            },
            Self::PkgConfig {
                selector,
                path_style,
                flags,
                cflags,
                libs,
            } => Command::PkgConfig {
                selector: selector.into(),
                path_style: path_style.into(),
                flag_style: flags.map_or_else(FlagStyle::host, Into::into),
                only: if cflags {
                    Some(crate::commands::pkg_config::Only::Cflags)
                } else if libs {
                    Some(crate::commands::pkg_config::Only::Libs)
                } else {
                    None
                },
                json,
            },
            Self::Check => Command::Check { json },
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
