//! External process capability.
//!
//! Discovery and toolchain activation shell out to `vswhere`, `reg`,
//! `powershell` and `cmd`. They all go through [`ProcessRunner`] so the
//! decision logic can be exercised with a scripted runner.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<String>,
    /// Complete child environment. `None` inherits the parent's.
    pub env: Option<BTreeMap<String, String>>,
    /// Wall-clock budget
    pub timeout: Duration,
}

impl CommandSpec {
    /// Command with a 30 second budget and inherited environment.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace the child environment.
    #[must_use]
    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Set the budget.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program file name, for logging and fake dispatch.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().to_lowercase())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
}

impl ProcessOutput {
    /// Exit code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion within `spec.timeout`.
    ///
    /// A non-zero exit is not an error; spawn failures are [`Error::Process`]
    /// and an exceeded budget is [`Error::Timeout`].
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(env) = &spec.env {
            cmd.env_clear().envs(env);
        }

        debug!(program = %spec.program.display(), args = ?spec.args, "Running command");

        match timeout(spec.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(Error::process(format!(
                "failed to run {}: {e}",
                spec.program.display()
            ))),
            Err(_) => Err(Error::Timeout {
                seconds: spec.timeout.as_secs(),
            }),
        }
    }
}
