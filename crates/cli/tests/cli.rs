//! End-to-end tests for the `luaenv` binary against a registry on disk.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DEV_ID: &str = "abcd1234-5678-90ef-aaaa-000000000001";
const OLD_ID: &str = "ef012345-5678-90ef-aaaa-000000000002";

struct Fixture {
    root: TempDir,
    project: TempDir,
}

impl Fixture {
    /// Two installations: `dev` (default, complete) and `old` (executables
    /// removed).
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let dev = install_dir(root.path(), DEV_ID, true);
        let old = install_dir(root.path(), OLD_ID, false);

        let registry = json!({
            "registry_version": "1.0",
            "installations": {
                DEV_ID: record(DEV_ID, "5.4.8", &dev),
                OLD_ID: record(OLD_ID, "5.1.5", &old),
            },
            "aliases": { "dev": DEV_ID, "old": OLD_ID },
            "default_installation": DEV_ID,
        });
        std::fs::write(
            root.path().join("registry.json"),
            serde_json::to_string_pretty(&registry).unwrap(),
        )
        .unwrap();

        Self { root, project }
    }

    fn luaenv(&self) -> Command {
        let mut cmd = Command::cargo_bin("luaenv").unwrap();
        cmd.current_dir(self.project.path())
            .env("LUAENV_ROOT", self.root.path())
            .env("LUAENV_TEMP_DIR", self.root.path().join("generated"))
            .env_remove("RUST_LOG")
            .env_remove("VCPKG_ROOT");
        cmd
    }
}

fn install_dir(root: &Path, id: &str, complete: bool) -> (PathBuf, PathBuf) {
    let installation = root.join("installations").join(id);
    let environment = root.join("environments").join(id);
    std::fs::create_dir_all(installation.join("bin")).unwrap();
    std::fs::create_dir_all(installation.join("luarocks")).unwrap();
    std::fs::create_dir_all(&environment).unwrap();
    if complete {
        for file in [
            installation.join(format!("bin/lua{EXE_SUFFIX}")),
            installation.join(format!("bin/luac{EXE_SUFFIX}")),
            installation.join(format!("luarocks/luarocks{EXE_SUFFIX}")),
        ] {
            std::fs::write(file, b"").unwrap();
        }
    }
    (installation, environment)
}

fn record(id: &str, lua_version: &str, dirs: &(PathBuf, PathBuf)) -> serde_json::Value {
    let (installation, environment) = dirs;
    json!({
        "id": id,
        "name": format!("Lua {lua_version}"),
        "lua_version": lua_version,
        "luarocks_version": "3.12.2",
        "installation_path": installation,
        "environment_path": environment,
        "architecture": "x64",
        "build_type": "dll",
        "build_config": "release",
        "status": "active",
        "last_used": null,
        "packages": { "count": 0 },
    })
}

#[test]
fn version_prints_package_version() {
    Command::cargo_bin("luaenv")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_registry_names_the_next_command() {
    let empty = TempDir::new().unwrap();
    Command::cargo_bin("luaenv")
        .unwrap()
        .current_dir(empty.path())
        .env("LUAENV_ROOT", empty.path())
        .arg("current")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No luaenv registry found"))
        .stderr(predicate::str::contains("setup_lua.py"));
}

#[test]
fn current_falls_back_to_default() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains(DEV_ID))
        .stdout(predicate::str::contains("selected by default"));
}

#[test]
fn local_pin_wins_over_default() {
    let fixture = Fixture::new();

    fixture
        .luaenv()
        .args(["local", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains(OLD_ID));
    assert_eq!(
        std::fs::read_to_string(fixture.project.path().join(".lua-version")).unwrap(),
        "old"
    );

    fixture
        .luaenv()
        .arg("local")
        .assert()
        .success()
        .stdout(predicate::str::diff("old\n"));

    let output = fixture
        .luaenv()
        .args(["--format", "json", "current"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["id"], OLD_ID);
    assert_eq!(report["source"], "local pin");

    fixture.luaenv().args(["local", "--unset"]).assert().success();
    assert!(!fixture.project.path().join(".lua-version").exists());
}

#[test]
fn pinning_an_unknown_reference_fails() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args(["local", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Installation not found"));
    assert!(!fixture.project.path().join(".lua-version").exists());
}

#[test]
fn short_id_prefix_is_rejected() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args(["current", "--id", "abcd12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("abcd12"));
}

#[test]
fn activate_emits_shell_script() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args(["activate", "--alias", "dev", "--shell", "bash", "--no-toolchain"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("export LUAENV_CURRENT='{DEV_ID}'")))
        .stdout(predicate::str::contains("export LUA_PATH="))
        .stdout(predicate::str::contains("export LUAROCKS_CONFIG="));

    let config = fixture
        .root
        .path()
        .join("generated")
        .join(format!("luarocks-config-{DEV_ID}.lua"));
    assert!(config.exists(), "missing {}", config.display());
}

#[test]
fn activate_fish_syntax() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args(["activate", "--shell", "fish", "--no-toolchain"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("set -gx LUAENV_CURRENT '{DEV_ID}'")));
}

#[test]
fn activating_a_broken_installation_fails() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args(["activate", "--alias", "old", "--shell", "bash", "--no-toolchain"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(OLD_ID));
}

#[cfg(unix)]
#[test]
fn exec_runs_child_in_activated_environment() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .args([
            "exec",
            "--no-toolchain",
            "--",
            "sh",
            "-c",
            "printf '%s' \"$LUAENV_CURRENT\"; exit 3",
        ])
        .assert()
        .code(3)
        .stdout(predicate::str::diff(DEV_ID));
}

#[test]
fn check_reports_broken_installation() {
    let fixture = Fixture::new();
    fixture
        .luaenv()
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(format!("broken  {OLD_ID}")))
        .stdout(predicate::str::contains("1 valid, 1 broken, 0 missing"));
}

#[test]
fn check_json_output() {
    let fixture = Fixture::new();
    let output = fixture.luaenv().args(["check", "--format", "json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let audit: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(audit["valid"], json!([DEV_ID]));
    assert_eq!(audit["broken"], json!([OLD_ID]));
}

#[test]
fn pkg_config_gnu_libs() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(
        fixture
            .root
            .path()
            .join("installations")
            .join(DEV_ID)
            .join("lib"),
    )
    .unwrap();

    fixture
        .luaenv()
        .args(["pkg-config", "--alias", "dev", "--flags", "gnu", "--path-style", "unix", "--libs"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("-L\""))
        .stdout(predicate::str::contains("-llua54"));
}
