//! Capturing the environment a Visual Studio activation script produces.
//!
//! The entry point is run through `cmd` from a throwaway batch file, followed
//! by a delimiter and `set`. Everything after the delimiter is the activated
//! environment; the difference from the starting environment is what gets
//! applied to a session.

use super::ToolchainInstallation;
use crate::environment::{EnvironmentView, PATH_VAR, path_key};
use crate::process::{CommandSpec, ProcessRunner};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Variables never copied from an activated toolchain environment.
pub const IGNORED_VARS: &[&str] = &["PROMPT", "PSModulePath", "PYTHONPATH", "PYTHONHOME"];

const DELIMITER: &str = "__LUAENV_ENV_START__";

/// Changes an activation script makes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainEnvironment {
    /// `PATH` entries the script added, in its order
    pub injected_path: Vec<PathBuf>,
    /// Other new or changed variables
    pub variables: BTreeMap<String, String>,
}

impl ToolchainEnvironment {
    /// Difference between `base` and the activated environment.
    #[must_use]
    pub fn from_capture(base: &EnvironmentView, activated: &EnvironmentView) -> Self {
        let variables = base
            .diff(activated)
            .set
            .into_iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(PATH_VAR)
                    && !IGNORED_VARS.iter().any(|i| i.eq_ignore_ascii_case(name))
            })
            .collect();

        let existing: HashSet<String> = base.path_entries().iter().map(|p| path_key(p)).collect();
        let mut seen = HashSet::new();
        let injected_path = activated
            .path_entries()
            .into_iter()
            .filter(|p| {
                let key = path_key(p);
                !existing.contains(&key) && seen.insert(key)
            })
            .collect();

        Self {
            injected_path,
            variables,
        }
    }

    /// Whether the script changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.injected_path.is_empty() && self.variables.is_empty()
    }
}

fn vcvars_arch(architecture: &str) -> &'static str {
    match architecture.to_ascii_lowercase().as_str() {
        "x86" | "win32" | "i686" => "x86",
        "arm64" | "aarch64" => "x64_arm64",
        _ => "x64",
    }
}

fn devcmd_arch(architecture: &str) -> &'static str {
    match architecture.to_ascii_lowercase().as_str() {
        "x86" | "win32" | "i686" => "x86",
        "arm64" | "aarch64" => "arm64",
        _ => "amd64",
    }
}

/// Entry point and its arguments for `architecture`.
pub fn entry_invocation(
    toolchain: &ToolchainInstallation,
    architecture: &str,
) -> Result<(PathBuf, Vec<String>)> {
    if let Some(script) = &toolchain.activation_script {
        return Ok((script.clone(), vec![vcvars_arch(architecture).to_string()]));
    }
    if let Some(command) = &toolchain.activation_command {
        return Ok((
            command.clone(),
            vec![
                format!("-arch={}", devcmd_arch(architecture)),
                "-host_arch=amd64".to_string(),
                "-no_logo".to_string(),
            ],
        ));
    }
    Err(Error::process(format!(
        "{} has no activation entry point",
        toolchain.install_path.display()
    )))
}

/// Batch file that activates and dumps the result.
#[must_use]
pub fn capture_script(entry: &Path, args: &[String]) -> String {
    format!(
        "@echo off\r\ncall \"{}\" {} >nul 2>&1\r\nif errorlevel 1 exit /b %errorlevel%\r\necho {DELIMITER}\r\nset\r\n",
        entry.display(),
        args.join(" ")
    )
}

/// Parse the variables printed after the delimiter. `None` if the delimiter
/// never appeared.
#[must_use]
pub fn parse_env_dump(stdout: &str) -> Option<EnvironmentView> {
    let mut lines = stdout.lines();
    lines.by_ref().find(|line| line.trim() == DELIMITER)?;

    Some(EnvironmentView::from_pairs(lines.filter_map(|line| {
        let line = line.trim_end_matches('\r');
        // `cmd` lists per-drive cwd entries such as `=C:=C:\`.
        let (name, value) = line.split_once('=')?;
        (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
    })))
}

/// Run `toolchain`'s activation entry point for `architecture` starting from
/// `base`, and return what it changed.
pub async fn capture_environment(
    toolchain: &ToolchainInstallation,
    architecture: &str,
    base: &EnvironmentView,
    runner: &dyn ProcessRunner,
    timeout: Duration,
) -> Result<ToolchainEnvironment> {
    let (entry, args) = entry_invocation(toolchain, architecture)?;
    let script = std::env::temp_dir().join(format!("luaenv-activate-{}.bat", Uuid::new_v4()));
    std::fs::write(&script, capture_script(&entry, &args))
        .map_err(|e| Error::io(e, &script, "write"))?;

    debug!(entry = %entry.display(), ?args, "Running toolchain activation");
    let spec = CommandSpec::new("cmd")
        .args(["/d".to_string(), "/c".to_string(), script.to_string_lossy().into_owned()])
        .env(base.to_map())
        .timeout(timeout);
    let result = runner.run(&spec).await;

    if let Err(e) = std::fs::remove_file(&script) {
        debug!(path = %script.display(), error = %e, "Could not remove activation script");
    }
    let output = result?;
    trace!(stdout = %output.stdout, "Activation output");

    if !output.success() {
        let stderr = output.stderr.trim();
        warn!(status = ?output.status, %stderr, "Toolchain activation failed");
        return Err(Error::process(format!(
            "{} exited with status {:?}",
            entry.display(),
            output.status
        )));
    }

    let Some(activated) = parse_env_dump(&output.stdout) else {
        return Err(Error::process(format!(
            "{} produced no environment",
            entry.display()
        )));
    };

    let captured = ToolchainEnvironment::from_capture(base, &activated);
    info!(
        variables = captured.variables.len(),
        path_entries = captured.injected_path.len(),
        "Captured toolchain environment"
    );
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedRunner, stdout, touch};
    use crate::toolchain::{ACTIVATION_COMMAND, ACTIVATION_SCRIPT, DiscoverySource};
    use crate::process::ProcessOutput;
    use tempfile::TempDir;

    fn joined(entries: &[&str]) -> String {
        std::env::join_paths(entries).unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_env_dump() {
        let out = format!(
            "noise from the script\r\n{DELIMITER}\r\n=C:=C:\\work\r\nINCLUDE=C:\\VC\\include\r\nEMPTY=\r\nEQ=a=b\r\n"
        );
        let env = parse_env_dump(&out).unwrap();
        assert_eq!(env.get("INCLUDE"), Some("C:\\VC\\include"));
        assert_eq!(env.get("EMPTY"), Some(""));
        assert_eq!(env.get("EQ"), Some("a=b"));
        assert_eq!(env.len(), 3);

        assert!(parse_env_dump("INCLUDE=x\n").is_none());
    }

    #[test]
    fn test_from_capture_filters() {
        let base = EnvironmentView::from_pairs([
            (PATH_VAR, joined(&["/usr/bin", "/bin"])),
            ("KEEP", "same".to_string()),
        ]);
        let activated = EnvironmentView::from_pairs([
            (PATH_VAR, joined(&["/vs/bin", "/vs/bin/", "/usr/bin", "/bin", "/vs/sdk"])),
            ("KEEP", "same".to_string()),
            ("INCLUDE", "/vs/include".to_string()),
            ("PROMPT", "$P$G".to_string()),
            ("PYTHONHOME", "/py".to_string()),
        ]);

        let captured = ToolchainEnvironment::from_capture(&base, &activated);
        assert_eq!(
            captured.injected_path,
            vec![PathBuf::from("/vs/bin"), PathBuf::from("/vs/sdk")]
        );
        assert_eq!(captured.variables.len(), 1);
        assert!(captured.variables.contains_key("INCLUDE"));
    }

    #[test]
    fn test_entry_invocation() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join(ACTIVATION_COMMAND));
        let vs = ToolchainInstallation::inspect(temp.path(), DiscoverySource::Explicit);
        let (entry, args) = entry_invocation(&vs, "arm64").unwrap();
        assert!(entry.ends_with("VsDevCmd.bat"));
        assert_eq!(args[0], "-arch=arm64");

        touch(&temp.path().join(ACTIVATION_SCRIPT));
        let vs = ToolchainInstallation::inspect(temp.path(), DiscoverySource::Explicit);
        let (entry, args) = entry_invocation(&vs, "x64").unwrap();
        assert!(entry.ends_with("vcvarsall.bat"));
        assert_eq!(args, vec!["x64".to_string()]);

        let script = capture_script(&entry, &args);
        assert!(script.contains("vcvarsall.bat\" x64 >nul 2>&1"));
        assert!(script.contains(DELIMITER));
    }

    #[tokio::test]
    async fn test_capture_runs_cmd_with_base_env() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join(ACTIVATION_SCRIPT));
        let vs = ToolchainInstallation::inspect(temp.path(), DiscoverySource::Locator);
        let base = EnvironmentView::from_pairs([(PATH_VAR, joined(&["/usr/bin"]))]);

        let dump = format!(
            "{DELIMITER}\nPATH={}\nLIB=/vs/lib\n",
            joined(&["/vs/bin", "/usr/bin"])
        );
        let runner = ScriptedRunner::new(move |spec| {
            assert_eq!(spec.program_name(), "cmd");
            assert!(spec.env.as_ref().is_some_and(|env| env.contains_key(PATH_VAR)));
            Some(stdout(&dump))
        });

        let captured = capture_environment(&vs, "x64", &base, &runner, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(captured.injected_path, vec![PathBuf::from("/vs/bin")]);
        assert_eq!(captured.variables.get("LIB").map(String::as_str), Some("/vs/lib"));

        let script = PathBuf::from(runner.calls()[0].args.last().unwrap());
        assert!(!script.exists(), "batch file is cleaned up");
    }

    #[tokio::test]
    async fn test_capture_failures() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join(ACTIVATION_SCRIPT));
        let vs = ToolchainInstallation::inspect(temp.path(), DiscoverySource::Locator);
        let base = EnvironmentView::new();

        let failing = ScriptedRunner::new(|_| {
            Some(ProcessOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "bad arch".into(),
            })
        });
        assert!(capture_environment(&vs, "x64", &base, &failing, Duration::from_secs(5))
            .await
            .is_err());

        let silent = ScriptedRunner::new(|_| Some(stdout("")));
        assert!(capture_environment(&vs, "x64", &base, &silent, Duration::from_secs(5))
            .await
            .is_err());

        let hollow = ToolchainInstallation::inspect(&temp.path().join("nothing"), DiscoverySource::Locator);
        let runner = ScriptedRunner::absent();
        assert!(capture_environment(&hollow, "x64", &base, &runner, Duration::from_secs(5))
            .await
            .is_err());
        assert!(runner.calls().is_empty());
    }
}
