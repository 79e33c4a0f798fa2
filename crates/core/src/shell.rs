//! Shell detection and activation script rendering.
//!
//! `luaenv activate` cannot change its parent's environment, so it prints
//! statements for the user's shell to evaluate.

use crate::environment::EnvDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use tracing::debug;

/// Supported shell types for environment integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Shell {
    /// Bash shell
    #[default]
    Bash,
    /// Z shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell/pwsh
    #[serde(rename = "powershell")]
    PowerShell,
    /// Windows command prompt
    Cmd,
}

impl Shell {
    /// Detect shell from argument or environment
    pub fn detect(target: Option<&str>) -> Self {
        if let Some(t) = target {
            return Self::parse(t);
        }

        if let Ok(shell) = std::env::var("SHELL") {
            if shell.contains("fish") {
                return Self::Fish;
            } else if shell.contains("zsh") {
                return Self::Zsh;
            } else if shell.contains("bash") {
                return Self::Bash;
            }
        }

        if cfg!(windows) {
            // Only PowerShell sets PSModulePath for the session.
            return if std::env::var_os("PSModulePath").is_some() {
                Self::PowerShell
            } else {
                Self::Cmd
            };
        }

        Self::Bash
    }

    /// Parse shell from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "zsh" => Self::Zsh,
            "fish" => Self::Fish,
            "powershell" | "pwsh" => Self::PowerShell,
            "cmd" | "cmd.exe" | "bat" => Self::Cmd,
            _ => Self::Bash,
        }
    }

    /// Get the name of the shell
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::PowerShell => "powershell",
            Self::Cmd => "cmd",
        }
    }

    /// Statements applying `delta`, one per line. Removals come first.
    #[must_use]
    pub fn render(&self, delta: &EnvDelta) -> String {
        let mut out = String::new();
        for name in &delta.removed {
            if let Some(line) = self.unset(name) {
                let _ = writeln!(out, "{line}");
            }
        }
        for (name, value) in &delta.set {
            if let Some(line) = self.export(name, value) {
                let _ = writeln!(out, "{line}");
            }
        }
        out
    }

    fn accepts(self, name: &str) -> bool {
        let ok = match self {
            Self::PowerShell | Self::Cmd => !name.is_empty() && !name.contains('='),
            Self::Bash | Self::Zsh | Self::Fish => {
                let mut chars = name.chars();
                chars
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
        };
        if !ok {
            debug!(shell = self.name(), name, "Skipping variable the shell cannot name");
        }
        ok
    }

    fn export(self, name: &str, value: &str) -> Option<String> {
        self.accepts(name).then(|| match self {
            Self::Bash | Self::Zsh => format!("export {name}={}", posix_quote(value)),
            Self::Fish => format!("set -gx {name} {}", fish_quote(value)),
            Self::PowerShell => format!("{} = {}", ps_env(name), ps_quote(value)),
            Self::Cmd => format!("set \"{name}={value}\""),
        })
    }

    fn unset(self, name: &str) -> Option<String> {
        self.accepts(name).then(|| match self {
            Self::Bash | Self::Zsh => format!("unset {name}"),
            Self::Fish => format!("set -e {name}"),
            Self::PowerShell => {
                format!("Remove-Item -LiteralPath 'Env:{name}' -ErrorAction SilentlyContinue")
            }
            Self::Cmd => format!("set \"{name}=\""),
        })
    }
}

fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn fish_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn ps_env(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("$env:{name}")
    } else {
        format!("${{env:{name}}}")
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
