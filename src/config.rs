//! Inventory source configuration
//!
//! The `git_hosts` inventory source is described by a small YAML document:
//!
//! ```yaml
//! plugin: git_hosts
//! hosts_directory: /var/lib/ansible/inventory
//! environment_dirs: ['prod', 'acc', 'tst', 'qas', 'dt', 'sandbox']
//! dns_resolution: true
//! auto_environment_patterns: true
//! check_interval: 300
//! environment_mapping:
//!   sandbox: "SBOX"
//!   integration: "INT"
//! group_membership:
//!   production: [env_prd]
//! ```
//!
//! Options belonging to the host automation framework (`keyed_groups`,
//! `compose`, `groups`) are accepted and ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};

/// Plugin token expected in the `plugin` field
pub const PLUGIN_NAME: &str = "git_hosts";

/// Default host file name patterns
pub const DEFAULT_HOSTS_FILE_PATTERNS: &[&str] = &["hosts.yml", "hosts.ini", "hosts_*"];

/// Cache backend selected by `cache_plugin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, useful for long-lived callers and tests
    Memory,
    /// One JSON document per fingerprint under `cache_connection`
    #[default]
    #[serde(alias = "ansible.builtin.jsonfile")]
    Jsonfile,
}

/// Configuration for a `git_hosts` inventory source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHostsConfig {
    /// Plugin token, must be `git_hosts`
    pub plugin: String,

    /// Root directory holding environment subdirectories
    pub hosts_directory: PathBuf,

    /// Environment subdirectories to scan; all subdirectories when unset
    pub environment_dirs: Option<Vec<String>>,

    /// File name globs matched inside each environment directory
    pub hosts_file_patterns: Vec<String>,

    /// Resolve CNAME aliases into the `DNSName` host variable
    pub dns_resolution: bool,

    /// Set the `environment` host variable and `env_*` groups
    pub environment_detection: bool,

    /// Directory name to environment code overrides
    pub environment_mapping: IndexMap<String, String>,

    /// Derive codes for unknown directory names heuristically
    pub auto_environment_patterns: bool,

    /// Enable the inventory cache
    pub cache: bool,

    /// Cache backend
    pub cache_plugin: CacheBackend,

    /// Cache directory for the JSON file backend
    pub cache_connection: Option<PathBuf>,

    /// Cache entry lifetime in seconds
    pub cache_timeout: u64,

    /// Change-check interval in seconds, 0 disables cache lookups
    pub check_interval: u64,

    /// Per-lookup DNS timeout in milliseconds
    pub dns_timeout_ms: u64,

    /// Maximum concurrent DNS lookups
    pub dns_concurrency: usize,

    /// Deadline for the whole DNS phase in milliseconds
    pub dns_deadline_ms: u64,

    /// Target group to source groups whose hosts it receives
    pub group_membership: IndexMap<String, Vec<String>>,

    /// Child group to parent groups it is added to
    pub group_parents: IndexMap<String, Vec<String>>,

    /// Options not interpreted by this plugin
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Default for GitHostsConfig {
    fn default() -> Self {
        Self {
            plugin: PLUGIN_NAME.to_string(),
            hosts_directory: PathBuf::new(),
            environment_dirs: None,
            hosts_file_patterns: DEFAULT_HOSTS_FILE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            dns_resolution: false,
            environment_detection: true,
            environment_mapping: IndexMap::new(),
            auto_environment_patterns: false,
            cache: false,
            cache_plugin: CacheBackend::default(),
            cache_connection: None,
            cache_timeout: 3600,
            check_interval: 0,
            dns_timeout_ms: 2000,
            dns_concurrency: 32,
            dns_deadline_ms: 30_000,
            group_membership: IndexMap::new(),
            group_parents: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }
}

impl GitHostsConfig {
    /// Create a configuration for the given hosts directory
    pub fn new(hosts_directory: impl Into<PathBuf>) -> Self {
        Self {
            hosts_directory: hosts_directory.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.plugin != PLUGIN_NAME && !self.plugin.ends_with(".git_hosts") {
            return Err(Error::config(format!(
                "plugin must be '{}', got '{}'",
                PLUGIN_NAME, self.plugin
            )));
        }

        if self.hosts_directory.as_os_str().is_empty() {
            return Err(Error::config("hosts_directory is required"));
        }

        if self.hosts_file_patterns.is_empty() {
            return Err(Error::config("hosts_file_patterns must not be empty"));
        }
        for pattern in &self.hosts_file_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config(format!("invalid hosts_file_patterns entry '{}': {}", pattern, e))
            })?;
        }

        for (name, code) in &self.environment_mapping {
            if code.trim().is_empty() {
                return Err(Error::config(format!(
                    "environment_mapping entry '{}' has an empty code",
                    name
                )));
            }
            if code.to_uppercase() != *code {
                warn!(
                    "environment_mapping code '{}' for '{}' is not uppercase; using it verbatim",
                    code, name
                );
            }
        }

        if self.dns_concurrency == 0 {
            return Err(Error::config("dns_concurrency must be at least 1"));
        }
        if self.dns_timeout_ms == 0 {
            return Err(Error::config("dns_timeout_ms must be greater than 0"));
        }

        for (target, sources) in &self.group_membership {
            if target.trim().is_empty() {
                return Err(Error::config("group_membership target must not be empty"));
            }
            if sources.iter().any(|s| s == target) {
                return Err(Error::config(format!(
                    "group_membership target '{}' lists itself as a source",
                    target
                )));
            }
        }

        for (child, parents) in &self.group_parents {
            if parents.iter().any(|p| p == child) {
                return Err(Error::config(format!(
                    "group_parents entry '{}' lists itself as a parent",
                    child
                )));
            }
        }

        Ok(())
    }

    /// Whether inventory source files with this name belong to this plugin
    pub fn verify_file(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        )
    }

    /// Whether the cache should be consulted before scanning
    pub fn cache_enabled(&self) -> bool {
        self.cache && self.check_interval > 0
    }

    /// Lifetime of a stored cache entry
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_timeout)
    }

    /// Directory used by the JSON file cache backend
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_connection.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("git-hosts")
        })
    }

    /// Per-lookup DNS timeout
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    /// Deadline for the whole DNS phase
    pub fn dns_deadline(&self) -> Duration {
        Duration::from_millis(self.dns_deadline_ms)
    }

    /// Option keys present in the source file that this plugin ignores
    pub fn ignored_options(&self) -> Vec<&str> {
        self.extra.keys().map(String::as_str).collect()
    }

    /// Restrict scanning to the given environment directories
    pub fn with_environment_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_dirs = Some(dirs.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the host file patterns
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts_file_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Add an explicit environment mapping
    pub fn with_mapping(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.environment_mapping.insert(name.into(), code.into());
        self
    }

    /// Toggle heuristic environment codes
    pub fn with_auto_patterns(mut self, enabled: bool) -> Self {
        self.auto_environment_patterns = enabled;
        self
    }

    /// Toggle environment detection
    pub fn with_environment_detection(mut self, enabled: bool) -> Self {
        self.environment_detection = enabled;
        self
    }

    /// Toggle DNS alias resolution
    pub fn with_dns(mut self, enabled: bool) -> Self {
        self.dns_resolution = enabled;
        self
    }

    /// Enable caching with the given backend, check interval and lifetime
    pub fn with_cache(mut self, backend: CacheBackend, check_interval: u64, timeout: u64) -> Self {
        self.cache = true;
        self.cache_plugin = backend;
        self.check_interval = check_interval;
        self.cache_timeout = timeout;
        self
    }

    /// Add a static membership rule
    pub fn with_group_membership<I, S>(mut self, target: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_membership
            .insert(target.into(), sources.into_iter().map(Into::into).collect());
        self
    }

    /// Add a static hierarchy rule
    pub fn with_group_parents<I, S>(mut self, child: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_parents
            .insert(child.into(), parents.into_iter().map(Into::into).collect());
        self
    }
}
