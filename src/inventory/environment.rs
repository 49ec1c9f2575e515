//! Environment detection
//!
//! Derives a canonical environment code (`PRD`, `ACC`, `TST`, ...) from an
//! environment directory name. Strategies are tried in order and the first
//! one that produces a code wins:
//!
//! 1. Explicit mapping from the configuration (case-insensitive key match,
//!    value used verbatim)
//! 2. Built-in alias table
//! 3. Heuristic patterns, when `auto_environment_patterns` is enabled
//! 4. The name itself, uppercased
//!
//! Files that do not live in an environment directory fall back to
//! [`EnvironmentResolver::resolve_group_name`], which looks for a known
//! environment token inside the group name (`web_PRD` → `PRD`).

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::GitHostsConfig;

/// Code used when no environment can be determined
pub const MISC: &str = "MISC";

/// Built-in alias table, in lookup order
pub static BUILTIN_ENVIRONMENTS: &[(&str, &str)] = &[
    ("prod", "PRD"),
    ("production", "PRD"),
    ("prd", "PRD"),
    ("acc", "ACC"),
    ("acceptance", "ACC"),
    ("tst", "TST"),
    ("test", "TST"),
    ("testing", "TST"),
    ("qas", "QAS"),
    ("quality", "QAS"),
    ("qa", "QAS"),
    ("dev", "DEV"),
    ("development", "DEV"),
    ("staging", "STG"),
    ("stg", "STG"),
];

/// Suffixes stripped by the single-word heuristic, longest first
const STRIPPED_SUFFIXES: &[&str] = &["environment", "ment", "ing", "ion", "env"];

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Look up a lowercase name in the built-in table
pub fn builtin_code(name: &str) -> Option<&'static str> {
    BUILTIN_ENVIRONMENTS
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, code)| *code)
}

/// First tail, in order, that starts with one of `aliases`; the code of the
/// longest matching alias is returned
fn longest_prefix_match<'a>(
    tails: &[&str],
    aliases: impl Iterator<Item = (&'a str, &'a str)> + Clone,
) -> Option<&'a str> {
    tails.iter().find_map(|tail| {
        aliases
            .clone()
            .filter(|(alias, _)| !alias.is_empty() && tail.starts_with(alias))
            .max_by_key(|(alias, _)| alias.len())
            .map(|(_, code)| code)
    })
}

// ============================================================================
// Environment
// ============================================================================

/// How an environment code was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// `environment_mapping` entry
    ExplicitMapping,
    /// Built-in alias table
    BuiltinTable,
    /// Heuristic abbreviation
    AutoPattern,
    /// Uppercased input
    FallbackUppercase,
    /// No usable name, `MISC`
    Unclassified,
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExplicitMapping => "explicit mapping",
            Self::BuiltinTable => "built-in table",
            Self::AutoPattern => "auto pattern",
            Self::FallbackUppercase => "uppercase fallback",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{}", s)
    }
}

/// A resolved environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Canonical code, e.g. `PRD`
    pub code: String,
    /// Directory or group name the code was derived from
    pub source_name: String,
    /// Strategy that produced the code
    pub strategy: DetectionStrategy,
}

impl Environment {
    fn new(code: impl Into<String>, source_name: &str, strategy: DetectionStrategy) -> Self {
        Self {
            code: code.into(),
            source_name: source_name.to_string(),
            strategy,
        }
    }

    /// The `MISC` environment for a name nothing matched
    pub fn unclassified(source_name: &str) -> Self {
        Self::new(MISC, source_name, DetectionStrategy::Unclassified)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} via {})", self.code, self.source_name, self.strategy)
    }
}

// ============================================================================
// Resolver
// ============================================================================

type Strategy = fn(&EnvironmentResolver, &str, &str) -> Option<Environment>;

/// Strategy chain, in precedence order
const STRATEGIES: &[Strategy] = &[
    EnvironmentResolver::from_mapping,
    EnvironmentResolver::from_builtin,
    EnvironmentResolver::from_auto_pattern,
    EnvironmentResolver::from_uppercase,
];

/// Resolves environment directory and group names to environment codes
#[derive(Debug, Default)]
pub struct EnvironmentResolver {
    /// Explicit mapping with lowercased keys
    mapping: IndexMap<String, String>,
    auto_patterns: bool,
    memo: DashMap<String, Environment>,
}

impl EnvironmentResolver {
    /// Create a resolver with an explicit mapping
    pub fn new(mapping: &IndexMap<String, String>, auto_patterns: bool) -> Self {
        Self {
            mapping: mapping
                .iter()
                .map(|(name, code)| (name.trim().to_lowercase(), code.clone()))
                .collect(),
            auto_patterns,
            memo: DashMap::new(),
        }
    }

    /// Create a resolver from an inventory source configuration
    pub fn from_config(config: &GitHostsConfig) -> Self {
        Self::new(&config.environment_mapping, config.auto_environment_patterns)
    }

    /// Resolve an environment directory name. Total: always yields a
    /// non-empty code.
    pub fn resolve(&self, name: &str) -> Environment {
        if let Some(cached) = self.memo.get(name) {
            return cached.value().clone();
        }

        let trimmed = name.trim();
        let env = if trimmed.is_empty() {
            Environment::unclassified(name)
        } else {
            let lower = trimmed.to_lowercase();
            STRATEGIES
                .iter()
                .find_map(|strategy| strategy(self, trimmed, &lower))
                .unwrap_or_else(|| Environment::unclassified(name))
        };

        tracing::trace!("Resolved environment {}", env);
        self.memo.insert(name.to_string(), env.clone());
        env
    }

    /// Resolve a group name for hosts outside any environment directory.
    ///
    /// Every `_` or `-` separator is a candidate start: the text following
    /// it is matched against the explicit mapping keys, then the built-in
    /// aliases, as a case-insensitive prefix (`web_PRD01` → `PRD`). The
    /// leading segment is never matched, and the longest alias wins at a
    /// given position.
    pub fn resolve_group_name(&self, group: &str) -> Environment {
        let lower = group.to_lowercase();
        let tails: Vec<&str> = lower
            .match_indices(['_', '-'])
            .filter(|(i, _)| *i > 0)
            .map(|(i, sep)| &lower[i + sep.len()..])
            .collect();

        let mapped = self
            .mapping
            .iter()
            .map(|(key, code)| (key.as_str(), code.as_str()));
        if let Some(code) = longest_prefix_match(&tails, mapped) {
            return Environment::new(code, group, DetectionStrategy::ExplicitMapping);
        }
        if let Some(code) = longest_prefix_match(&tails, BUILTIN_ENVIRONMENTS.iter().copied()) {
            return Environment::new(code, group, DetectionStrategy::BuiltinTable);
        }
        Environment::unclassified(group)
    }

    /// Number of memoized names
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    fn from_mapping(&self, original: &str, lower: &str) -> Option<Environment> {
        self.mapping
            .get(lower)
            .map(|code| Environment::new(code.clone(), original, DetectionStrategy::ExplicitMapping))
    }

    fn from_builtin(&self, original: &str, lower: &str) -> Option<Environment> {
        builtin_code(lower).map(|code| Environment::new(code, original, DetectionStrategy::BuiltinTable))
    }

    fn from_auto_pattern(&self, original: &str, lower: &str) -> Option<Environment> {
        if !self.auto_patterns {
            return None;
        }
        auto_pattern_code(lower)
            .map(|code| Environment::new(code, original, DetectionStrategy::AutoPattern))
    }

    fn from_uppercase(&self, original: &str, _lower: &str) -> Option<Environment> {
        Some(Environment::new(
            original.to_uppercase(),
            original,
            DetectionStrategy::FallbackUppercase,
        ))
    }
}

// ============================================================================
// Heuristic Patterns
// ============================================================================

/// Derive an abbreviation from a lowercase, trimmed name.
///
/// Returns `None` when no pattern yields at least two letters.
pub fn auto_pattern_code(lower: &str) -> Option<String> {
    if lower.is_empty() {
        return None;
    }

    if lower.chars().count() <= 3 {
        return Some(lower.to_uppercase());
    }

    if lower.contains('-') {
        let initials = initials(lower.split('-'));
        if initials.chars().count() >= 2 {
            return Some(initials.to_uppercase());
        }
    }

    if lower.contains(|c: char| c.is_whitespace() || c == '_') {
        let initials: String = initials(lower.split(|c: char| c.is_whitespace() || c == '_'))
            .chars()
            .take(4)
            .collect();
        return (initials.chars().count() >= 2).then(|| initials.to_uppercase());
    }

    if lower.contains('-') {
        return None;
    }

    Some(single_word_code(lower))
}

/// First letter of each non-empty part
fn initials<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter_map(|part| part.chars().next())
        .filter(|c| c.is_alphabetic())
        .collect()
}

fn single_word_code(word: &str) -> String {
    for suffix in STRIPPED_SUFFIXES {
        if let Some(stem) = word.strip_suffix(suffix) {
            let letters: String = stem.chars().filter(|c| c.is_alphabetic()).collect();
            if letters.chars().count() >= 3 {
                return letters.chars().take(3).collect::<String>().to_uppercase();
            }
        }
    }

    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    if let Some(first) = letters.next() {
        let code: String = std::iter::once(first)
            .chain(letters.filter(|c| !VOWELS.contains(c)))
            .take(3)
            .collect();
        if code.chars().count() >= 2 {
            return code.to_uppercase();
        }
    }

    word.chars().take(3).collect::<String>().to_uppercase()
}
