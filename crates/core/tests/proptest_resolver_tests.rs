//! Property-based tests for installation resolution precedence.
//!
//! These tests verify the behavioral contracts of the resolver:
//! - An explicit alias wins over pin and default
//! - Partial ids select only when unique, and collisions are never guessed
//! - A local pin wins over the default
//! - With nothing else given, the default is returned

use luaenv_core::registry::{Installation, InstallationStatus, Registry};
use luaenv_core::{Error, ResolutionSource, ResolveRequest, resolve};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;

// =============================================================================
// Fixtures
// =============================================================================

fn record(id: &str) -> Installation {
    Installation {
        id: id.to_string(),
        name: format!("Lua {id}"),
        lua_version: "5.4.8".into(),
        luarocks_version: "3.12.2".into(),
        installation_path: PathBuf::from("/luaenv/installations").join(id),
        environment_path: PathBuf::from("/luaenv/environments").join(id),
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

fn registry(ids: &BTreeSet<String>) -> Registry {
    Registry {
        installations: ids.iter().map(|id| (id.clone(), record(id))).collect(),
        ..Registry::default()
    }
}

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Ids over a small alphabet so that 8-character prefixes collide often.
fn ids_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[ab]{10}", 2..8)
}

fn alias_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,8}".prop_map(String::from)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn alias_ignores_pin_and_default(
        ids in ids_strategy(),
        alias in alias_strategy(),
        target in any::<prop::sample::Index>(),
        other in any::<prop::sample::Index>(),
    ) {
        let list: Vec<_> = ids.iter().cloned().collect();
        let target = target.get(&list).clone();
        let other = other.get(&list).clone();

        let mut reg = registry(&ids);
        reg.aliases.insert(alias.clone(), target.clone());
        reg.default_installation = Some(other.clone());

        let request = ResolveRequest {
            alias: Some(alias.as_str()),
            local_pin: Some(other.as_str()),
            use_priority: true,
            ..ResolveRequest::default()
        };
        let resolved = resolve(&reg, &request).unwrap();
        prop_assert_eq!(&resolved.installation.id, &target);
        prop_assert_eq!(resolved.source, ResolutionSource::Alias);
    }

    #[test]
    fn partial_id_selects_only_when_unique(
        ids in ids_strategy(),
        pick in any::<prop::sample::Index>(),
        len in 8usize..=10,
    ) {
        let list: Vec<_> = ids.iter().cloned().collect();
        let prefix = pick.get(&list)[..len].to_string();
        let reg = registry(&ids);
        let matching: Vec<String> = list.iter().filter(|id| id.starts_with(&prefix)).cloned().collect();

        let result = resolve(&reg, &ResolveRequest::by_id(&prefix));
        if ids.contains(&prefix) || matching.len() == 1 {
            prop_assert_eq!(&result.unwrap().installation.id, &matching[0]);
        } else {
            match result {
                Err(Error::Ambiguous { candidates, .. }) => prop_assert_eq!(candidates, matching),
                other => prop_assert!(false, "expected ambiguity, got {:?}", other.map(|r| r.installation.id.clone())),
            }
        }
    }

    #[test]
    fn pin_beats_default(
        ids in ids_strategy(),
        pinned in any::<prop::sample::Index>(),
        default in any::<prop::sample::Index>(),
    ) {
        let list: Vec<_> = ids.iter().cloned().collect();
        let pinned = pinned.get(&list).clone();
        let mut reg = registry(&ids);
        reg.default_installation = Some(default.get(&list).clone());

        let resolved = resolve(&reg, &ResolveRequest::with_priority(Some(pinned.as_str()))).unwrap();
        prop_assert_eq!(&resolved.installation.id, &pinned);
        prop_assert_eq!(resolved.source, ResolutionSource::LocalPin);
    }

    #[test]
    fn default_without_pin(
        ids in ids_strategy(),
        default in any::<prop::sample::Index>(),
    ) {
        let list: Vec<_> = ids.iter().cloned().collect();
        let default = default.get(&list).clone();
        let mut reg = registry(&ids);
        reg.default_installation = Some(default.clone());

        let resolved = resolve(&reg, &ResolveRequest::with_priority(None)).unwrap();
        prop_assert_eq!(&resolved.installation.id, &default);
        prop_assert_eq!(resolved.source, ResolutionSource::Default);
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn alias_and_short_prefix_scenario() {
    let id = "abcd1234-5678-90ef";
    let mut reg = registry(&BTreeSet::from([id.to_string()]));
    reg.aliases.insert("dev".into(), id.into());
    reg.default_installation = Some(id.into());

    assert_eq!(resolve(&reg, &ResolveRequest::by_alias("dev")).unwrap().installation.id, id);

    let err = resolve(&reg, &ResolveRequest::by_id("abcd12")).unwrap_err();
    assert!(matches!(err, Error::InstallationNotFound { .. }));
}

#[test]
fn short_collision_is_ambiguous() {
    let reg = registry(&BTreeSet::from(["aaaa1111".to_string(), "aaaa2222".to_string()]));
    match resolve(&reg, &ResolveRequest::by_id("aaaa")) {
        Err(Error::Ambiguous { candidates, .. }) => {
            assert_eq!(candidates, vec!["aaaa1111".to_string(), "aaaa2222".to_string()]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}
