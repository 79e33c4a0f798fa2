//! Shared fixtures for luaenv-core unit tests.

use crate::process::{CommandSpec, ProcessOutput, ProcessRunner};
use crate::registry::{Installation, InstallationStatus};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

/// Active installation record rooted under `root`.
pub fn installation(root: &Path, id: &str) -> Installation {
    Installation {
        id: id.to_string(),
        name: "Lua 5.4.8".into(),
        lua_version: "5.4.8".into(),
        luarocks_version: "3.12.2".into(),
        installation_path: root.join("installations").join(id),
        environment_path: root.join("environments").join(id),
        architecture: "x64".into(),
        build_type: "dll".into(),
        build_config: "release".into(),
        status: InstallationStatus::Active,
        last_used: None,
        packages: None,
        alias: None,
        created: None,
        tags: Vec::new(),
    }
}

/// Create an empty file and its parents.
pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

/// Create the executables and package tree an installation needs.
pub fn materialize(inst: &Installation) {
    touch(&inst.lua_executable());
    touch(&inst.luac_executable());
    touch(&inst.luarocks_executable());
    std::fs::create_dir_all(&inst.environment_path).unwrap();
}

type Responder = dyn Fn(&CommandSpec) -> Option<ProcessOutput> + Send + Sync;

/// Answers commands from a closure and records every call.
///
/// A `None` answer behaves like a program that is not installed.
pub struct ScriptedRunner {
    respond: Box<Responder>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(respond: impl Fn(&CommandSpec) -> Option<ProcessOutput> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner for which no program exists.
    pub fn absent() -> Self {
        Self::new(|_| None)
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::program_name).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.respond)(spec).ok_or_else(|| {
            Error::process(format!("{} is not installed", spec.program.display()))
        })
    }
}

/// Successful output with the given stdout.
pub fn stdout(text: &str) -> ProcessOutput {
    ProcessOutput {
        status: Some(0),
        stdout: text.to_string(),
        stderr: String::new(),
    }
}
