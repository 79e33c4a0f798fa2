//! Integration tests for environment composition and toolchain discovery.

use async_trait::async_trait;
use luaenv_core::config::Settings;
use luaenv_core::environment::{self, ComposeRequest, CURRENT_VAR, EnvironmentView, PATH_VAR};
use luaenv_core::process::{CommandSpec, ProcessOutput, ProcessRunner};
use luaenv_core::registry::{Installation, InstallationStatus};
use luaenv_core::toolchain::{
    ACTIVATION_SCRIPT, DiscoveryContext, DiscoverySource, EnumerationStrategy,
    EnvironmentStrategy, ExplicitStrategy, LocatorStrategy, RegistryStrategy,
    SavedConfigStrategy, ToolchainDiscovery, WellKnownStrategy,
};
use luaenv_core::{Error, Result, emitter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// A machine where no external program exists.
#[derive(Default)]
struct NothingInstalled {
    attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl ProcessRunner for NothingInstalled {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.attempts.lock().unwrap().push(spec.program_name());
        Err(Error::process(format!("{} not found", spec.program.display())))
    }
}

fn install(root: &Path, id: &str) -> Installation {
    let inst = Installation {
        id: id.to_string(),
        name: format!("Lua {id}"),
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
    };
    for file in [inst.lua_executable(), inst.luarocks_executable()] {
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"").unwrap();
    }
    inst
}

fn compose_for(
    base: &EnvironmentView,
    inst: &Installation,
    others: &[&Installation],
    config_dir: &Path,
) -> EnvironmentView {
    compose_with_tree(base, inst, others, None, config_dir)
}

fn compose_with_tree(
    base: &EnvironmentView,
    inst: &Installation,
    others: &[&Installation],
    custom_tree: Option<&Path>,
    config_dir: &Path,
) -> EnvironmentView {
    let foreign: Vec<PathBuf> = others
        .iter()
        .flat_map(|o| [o.installation_path.clone(), o.environment_path.clone()])
        .collect();
    environment::compose(
        base,
        &ComposeRequest {
            installation: inst,
            toolchain: None,
            package_root: None,
            custom_tree,
            foreign_roots: &foreign,
            config_dir,
        },
    )
    .unwrap()
    .environment
}

#[test]
fn switching_installations_drops_previous_bin_dir() {
    let temp = TempDir::new().unwrap();
    let first = install(temp.path(), "aaaa1111");
    let second = install(temp.path(), "bbbb2222");
    let config_dir = temp.path().join("config");

    let mut base = EnvironmentView::new();
    base.set_path_entries(&[PathBuf::from("/usr/bin")]).unwrap();

    let after_first = compose_for(&base, &first, &[&second], &config_dir);
    assert!(after_first.path_entries().contains(&first.bin_dir()));

    let after_second = compose_for(&after_first, &second, &[&first], &config_dir);
    let path = after_second.path_entries();
    assert!(
        !path.iter().any(|p| p.starts_with(&first.installation_path)),
        "first installation still on PATH: {path:?}"
    );
    assert!(!path.iter().any(|p| p.starts_with(&first.environment_path)));
    assert_eq!(path[0], second.bin_dir());
    assert!(path.contains(&PathBuf::from("/usr/bin")));
    assert_eq!(after_second.get(CURRENT_VAR), Some("bbbb2222"));
}

#[test]
fn switching_drops_previous_custom_tree_bin() {
    let temp = TempDir::new().unwrap();
    let first = install(temp.path(), "aaaa1111");
    let second = install(temp.path(), "bbbb2222");
    let project_tree = temp.path().join("proj").join("lua_modules");
    let config_dir = temp.path().join("config");

    let mut base = EnvironmentView::new();
    base.set_path_entries(&[PathBuf::from("/usr/bin")]).unwrap();

    let after_first = compose_with_tree(&base, &first, &[&second], Some(&project_tree), &config_dir);
    assert!(after_first.path_entries().contains(&project_tree.join("bin")));

    let after_second = compose_for(&after_first, &second, &[&first], &config_dir);
    let path = after_second.path_entries();
    assert!(
        !path.iter().any(|p| p.starts_with(&project_tree)),
        "previous package tree still on PATH: {path:?}"
    );
    assert_eq!(path[0], second.bin_dir());
    assert!(path.contains(&PathBuf::from("/usr/bin")));
}

#[test]
fn switching_drops_installation_removed_from_registry() {
    let temp = TempDir::new().unwrap();
    let removed = install(temp.path(), "aaaa1111");
    let second = install(temp.path(), "bbbb2222");
    let config_dir = temp.path().join("config");

    let mut base = EnvironmentView::new();
    base.set_path_entries(&[PathBuf::from("/usr/bin")]).unwrap();
    let after_first = compose_for(&base, &removed, &[&second], &config_dir);

    // The registry no longer lists the first installation.
    let after_second = compose_for(&after_first, &second, &[], &config_dir);
    let path = after_second.path_entries();
    assert!(
        !path.iter().any(|p| p.starts_with(&removed.installation_path)),
        "removed installation still on PATH: {path:?}"
    );
    assert!(!path.iter().any(|p| p.starts_with(&removed.environment_path)));
    assert!(path.contains(&PathBuf::from("/usr/bin")));
}

#[test]
fn user_entries_survive_repeated_activation() {
    let temp = TempDir::new().unwrap();
    let inst = install(temp.path(), "aaaa1111");
    let config_dir = temp.path().join("config");
    let tools = temp.path().join("tools");

    let mut base = EnvironmentView::new();
    base.set_path_entries(&[tools.clone(), PathBuf::from("/usr/bin")]).unwrap();

    let once = compose_for(&base, &inst, &[], &config_dir);
    let twice = compose_for(&once, &inst, &[], &config_dir);
    assert_eq!(once.path_entries(), twice.path_entries());
    assert!(twice.path_entries().contains(&tools));
}

#[test]
fn emitted_config_is_byte_identical_across_runs() {
    let temp = TempDir::new().unwrap();
    let inst = install(temp.path(), "aaaa1111");
    let config_dir = temp.path().join("config");
    let tree = emitter::TreePaths::new(&inst.environment_path, &inst.lua_major_minor());

    let first = emitter::emit(&inst, &tree, None, &config_dir).unwrap();
    let before = std::fs::read(&first).unwrap();
    let second = emitter::emit(&inst, &tree, None, &config_dir).unwrap();

    assert_eq!(first, second);
    assert_eq!(before, std::fs::read(&second).unwrap());
}

#[test]
fn composed_path_survives_missing_base_path() {
    let temp = TempDir::new().unwrap();
    let inst = install(temp.path(), "aaaa1111");
    let env = compose_for(&EnvironmentView::new(), &inst, &[], &temp.path().join("config"));
    assert_eq!(env.path_entries()[0], inst.bin_dir());
    assert!(env.contains(PATH_VAR));
}

#[tokio::test]
async fn environment_hint_is_found_but_not_persisted() {
    let temp = TempDir::new().unwrap();
    let vs_root = temp.path().join("BuildTools");
    let script = vs_root.join(ACTIVATION_SCRIPT);
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, b"@echo off\r\n").unwrap();

    let marker = temp.path().join(".vs_install_path.txt");
    let env = EnvironmentView::from_pairs([("VSINSTALLDIR", vs_root.to_string_lossy())]);
    let runner = NothingInstalled::default();
    let settings = Settings::default();

    let mut discovery = ToolchainDiscovery::new(vec![
        Box::new(ExplicitStrategy),
        Box::new(SavedConfigStrategy),
        Box::new(LocatorStrategy),
        Box::new(RegistryStrategy),
        Box::new(WellKnownStrategy::with_program_files(vec![])),
        Box::new(EnvironmentStrategy),
        Box::new(EnumerationStrategy),
    ]);
    let ctx = DiscoveryContext {
        architecture: "x64",
        explicit_override: None,
        env: &env,
        runner: &runner,
        settings: &settings,
        marker: &marker,
    };

    let found = discovery.discover(&ctx, true).await.unwrap();
    assert_eq!(found.install_path, vs_root);
    assert_eq!(found.source, DiscoverySource::Environment);
    assert_eq!(found.source.as_str(), "environment");
    assert!(!marker.exists(), "environment results are never saved");

    let attempts = runner.attempts.lock().unwrap().clone();
    assert!(attempts.iter().all(|p| p == "reg"), "only the registry scan ran: {attempts:?}");
    assert!(!attempts.iter().any(|p| p == "powershell"), "enumeration never reached");
}

#[tokio::test]
async fn exhausted_chain_is_toolchain_unavailable() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join(".vs_install_path.txt");
    let env = EnvironmentView::new();
    let runner = NothingInstalled::default();
    let settings = Settings::default();

    let mut discovery = ToolchainDiscovery::new(vec![
        Box::new(LocatorStrategy),
        Box::new(RegistryStrategy),
        Box::new(WellKnownStrategy::with_program_files(vec![])),
        Box::new(EnvironmentStrategy),
        Box::new(EnumerationStrategy),
    ]);
    let ctx = DiscoveryContext {
        architecture: "x64",
        explicit_override: None,
        env: &env,
        runner: &runner,
        settings: &settings,
        marker: &marker,
    };

    let err = discovery.discover(&ctx, true).await.unwrap_err();
    assert!(matches!(err, Error::ToolchainUnavailable { .. }));
    assert!(runner.attempts.lock().unwrap().contains(&"powershell".to_string()));
}
