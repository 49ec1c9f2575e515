//! Inventory plugin entry point
//!
//! [`GitHostsPlugin`] runs the whole pipeline for one inventory source:
//!
//! 1. validate the configuration
//! 2. scan the hosts directory
//! 3. consult the cache by fingerprint, when caching is enabled
//! 4. parse, resolve and assemble the graph
//! 5. store the graph back into the cache
//!
//! # Example
//!
//! ```rust,ignore
//! use git_hosts::config::GitHostsConfig;
//! use git_hosts::inventory::{GitHostsPlugin, InventoryPlugin};
//!
//! let config = GitHostsConfig::from_file("inventory/git_hosts.yml".as_ref())?;
//! let plugin = GitHostsPlugin::new(config);
//! let run = plugin.run().await?;
//! println!("{}", run.graph);
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::assembler::InventoryAssembler;
use super::cache::{open_store, CacheStore, Fingerprint};
use super::dns::{DnsResolver, SystemDnsResolver};
use super::render::{host_vars_json, inventory_to_json};
use super::scanner::FileScanner;
use super::InventoryGraph;
use crate::config::{GitHostsConfig, PLUGIN_NAME};
use crate::error::{InventoryWarning, Result};

// ============================================================================
// Plugin Trait
// ============================================================================

/// An inventory source that produces an [`InventoryGraph`]
#[async_trait]
pub trait InventoryPlugin: Send + Sync + fmt::Debug {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Get the plugin description
    fn description(&self) -> &str {
        "Custom inventory plugin"
    }

    /// Verify that the plugin is properly configured
    fn verify(&self) -> Result<()> {
        Ok(())
    }

    /// Build the inventory graph
    async fn parse(&self) -> Result<InventoryGraph>;

    /// Get hosts as dynamic-inventory JSON
    async fn get_hosts_json(&self) -> Result<serde_json::Value> {
        let graph = self.parse().await?;
        Ok(inventory_to_json(&graph))
    }

    /// Get host variables for a specific host
    async fn get_host_vars(&self, hostname: &str) -> Result<serde_json::Value> {
        let graph = self.parse().await?;
        Ok(host_vars_json(&graph, hostname))
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Outcome of one plugin run
#[derive(Debug, Clone)]
pub struct InventoryRun {
    /// The assembled or cached graph
    pub graph: InventoryGraph,
    /// Warnings raised while assembling; empty for cache hits
    pub warnings: Vec<InventoryWarning>,
    /// Whether the graph came from the cache
    pub from_cache: bool,
    /// Fingerprint of the source tree, when caching was enabled
    pub fingerprint: Option<Fingerprint>,
    /// Number of host files merged
    pub files: usize,
}

// ============================================================================
// git_hosts Plugin
// ============================================================================

/// Inventory plugin reading host files from a git-synchronized directory
pub struct GitHostsPlugin {
    config: GitHostsConfig,
    dns: Arc<dyn DnsResolver>,
    cache: Option<Arc<dyn CacheStore>>,
    refresh: bool,
}

impl GitHostsPlugin {
    /// Create a plugin using the system resolver and the configured cache
    pub fn new(config: GitHostsConfig) -> Self {
        let cache = config.cache_enabled().then(|| open_store(&config));
        Self {
            config,
            dns: Arc::new(SystemDnsResolver::new()),
            cache,
            refresh: false,
        }
    }

    /// Use a different DNS resolver
    pub fn with_dns_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.dns = resolver;
        self
    }

    /// Use a different cache store; ignored unless caching is enabled
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        if self.config.cache_enabled() {
            self.cache = Some(store);
        }
        self
    }

    /// Skip the cache lookup and rebuild, still storing the result
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// The configuration in use
    pub fn config(&self) -> &GitHostsConfig {
        &self.config
    }

    /// The cache store, when caching is enabled
    pub fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    /// Run the pipeline and report how the graph was obtained
    pub async fn run(&self) -> Result<InventoryRun> {
        self.config.validate()?;
        for option in self.config.ignored_options() {
            debug!("Ignoring option '{}' handled by the host framework", option);
        }

        let scanner = FileScanner::from_config(&self.config)?;
        let scan = scanner.scan()?;

        let mut cache_warnings = Vec::new();
        let fingerprint = match &self.cache {
            Some(_) => match Fingerprint::for_config(&self.config) {
                Ok(fingerprint) => Some(fingerprint),
                Err(e) => {
                    let warning = InventoryWarning::CacheFailure {
                        operation: "fingerprint".to_string(),
                        message: e.to_string(),
                    };
                    warning.log();
                    cache_warnings.push(warning);
                    None
                }
            },
            None => None,
        };

        if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
            if self.refresh {
                debug!("Cache refresh requested, rebuilding inventory");
            } else if let Some(graph) = cache.get(fingerprint).await {
                info!(
                    "Inventory cache hit ({}): {}",
                    cache.name(),
                    graph
                );
                return Ok(InventoryRun {
                    graph,
                    warnings: Vec::new(),
                    from_cache: true,
                    fingerprint: Some(fingerprint.clone()),
                    files: scan.len(),
                });
            } else {
                debug!("Inventory cache miss for {}", fingerprint);
            }
        }

        let assembler = InventoryAssembler::new(self.config.clone())
            .with_dns_resolver(Arc::clone(&self.dns));
        let mut assembly = assembler.assemble(&scan).await?;

        if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
            if let Err(e) = cache
                .put(fingerprint, &assembly.graph, self.config.cache_ttl())
                .await
            {
                let warning = InventoryWarning::CacheFailure {
                    operation: format!("storing {}", fingerprint),
                    message: e.to_string(),
                };
                warning.log();
                cache_warnings.push(warning);
            }
        }
        assembly.warnings.extend(cache_warnings);

        Ok(InventoryRun {
            graph: assembly.graph,
            warnings: assembly.warnings,
            from_cache: false,
            fingerprint,
            files: assembly.files,
        })
    }
}

impl fmt::Debug for GitHostsPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHostsPlugin")
            .field("hosts_directory", &self.config.hosts_directory)
            .field("dns", &self.dns.name())
            .field("cache", &self.cache.as_ref().map(|c| c.name().to_string()))
            .field("refresh", &self.refresh)
            .finish()
    }
}

#[async_trait]
impl InventoryPlugin for GitHostsPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn description(&self) -> &str {
        "Environment-aware inventory from a git-synchronized hosts directory"
    }

    fn verify(&self) -> Result<()> {
        self.config.validate()
    }

    async fn parse(&self) -> Result<InventoryGraph> {
        Ok(self.run().await?.graph)
    }
}
