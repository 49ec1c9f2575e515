//! Environment detection tests, including property-based checks of the
//! resolver's totality.

use git_hosts::inventory::environment::{auto_pattern_code, BUILTIN_ENVIRONMENTS, MISC};
use git_hosts::inventory::{DetectionStrategy, EnvironmentResolver};
use indexmap::IndexMap;
use proptest::prelude::*;

fn resolver(auto: bool) -> EnvironmentResolver {
    EnvironmentResolver::new(&IndexMap::new(), auto)
}

fn mapped(name: &str, code: &str, auto: bool) -> EnvironmentResolver {
    let mut mapping = IndexMap::new();
    mapping.insert(name.to_string(), code.to_string());
    EnvironmentResolver::new(&mapping, auto)
}

/// Names made of the characters that show up in directory names
fn directory_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{0,24}"
}

proptest! {
    #[test]
    fn prop_resolution_is_total(name in directory_name(), auto in any::<bool>()) {
        let env = resolver(auto).resolve(&name);
        prop_assert!(!env.code.is_empty());
    }

    #[test]
    fn prop_unmapped_codes_are_uppercase(name in directory_name(), auto in any::<bool>()) {
        let env = resolver(auto).resolve(&name);
        prop_assert_eq!(env.code.to_uppercase(), env.code);
    }

    #[test]
    fn prop_mapping_always_wins(name in "[a-z][a-z0-9-]{0,15}", auto in any::<bool>()) {
        let env = mapped(&name, "CUSTOM", auto).resolve(&name);
        prop_assert_eq!(env.code, "CUSTOM");
        prop_assert_eq!(env.strategy, DetectionStrategy::ExplicitMapping);
    }

    #[test]
    fn prop_resolution_is_deterministic(name in directory_name()) {
        let r = resolver(true);
        prop_assert_eq!(r.resolve(&name), r.resolve(&name));
    }

    #[test]
    fn prop_auto_pattern_codes_uppercase(name in "[a-z0-9 _-]{1,24}") {
        if let Some(code) = auto_pattern_code(&name) {
            prop_assert!(!code.is_empty());
            prop_assert_eq!(code.to_uppercase(), code);
        }
    }
}

#[test]
fn test_builtin_table_codes() {
    let r = resolver(false);
    for (alias, code) in BUILTIN_ENVIRONMENTS {
        assert_eq!(r.resolve(alias).code, *code, "{}", alias);
        assert_eq!(r.resolve(&alias.to_uppercase()).code, *code, "{}", alias);
    }
}

#[test]
fn test_documented_examples() {
    let r = resolver(true);
    assert_eq!(r.resolve("prod").code, "PRD");
    assert_eq!(r.resolve("production").code, "PRD");
    assert_eq!(r.resolve("prd").code, "PRD");
    assert_eq!(r.resolve("qa").code, "QAS");
    assert_eq!(r.resolve("qas").code, "QAS");
    assert_eq!(r.resolve("quality").code, "QAS");
    assert_eq!(r.resolve("dt").code, "DT");
    assert_eq!(r.resolve("data-team").code, "DT");
    assert_eq!(r.resolve("backup").code, "BCK");
    assert_eq!(r.resolve("development").code, "DEV");
}

#[test]
fn test_mapping_beats_builtin_and_auto() {
    let r = mapped("prod", "LIVE", true);
    assert_eq!(r.resolve("prod").code, "LIVE");
    assert_eq!(r.resolve("PROD").code, "LIVE");
    // Aliases of the same built-in code are not remapped
    assert_eq!(r.resolve("production").code, "PRD");
}

#[test]
fn test_fallback_without_auto_patterns() {
    let r = resolver(false);
    let env = r.resolve("data-team");
    assert_eq!(env.code, "DATA-TEAM");
    assert_eq!(env.strategy, DetectionStrategy::FallbackUppercase);
}

#[test]
fn test_blank_name_is_unclassified() {
    let r = resolver(true);
    assert_eq!(r.resolve("").code, MISC);
    assert_eq!(r.resolve("   ").strategy, DetectionStrategy::Unclassified);
}

#[test]
fn test_group_name_fallback() {
    let r = resolver(false);
    assert_eq!(r.resolve_group_name("web_prod").code, "PRD");
    assert_eq!(r.resolve_group_name("db-qa-primary").code, "QAS");
    // The leading segment is the role, not the environment
    assert_eq!(r.resolve_group_name("prod_web").code, MISC);
    assert_eq!(r.resolve_group_name("monitoring").code, MISC);
}

#[test]
fn test_group_name_with_site_suffix() {
    let r = resolver(false);
    assert_eq!(r.resolve_group_name("web_PRD01").code, "PRD");
    assert_eq!(r.resolve_group_name("db_ACC2").code, "ACC");
    assert_eq!(r.resolve_group_name("cache-qa3-west").code, "QAS");
}
