//! Inventory assembly
//!
//! Merges parsed host files, resolved environments and DNS results into an
//! [`InventoryGraph`]. Merge rules:
//!
//! - same-named groups from different files are unioned
//! - hosts are deduplicated by exact name; variables merge last-write-wins
//!   in scan order
//! - the `environment` variable comes from the host's environment directory;
//!   hosts outside any environment directory fall back to the group name
//! - every environment code gets a synthetic `env_<code>` group
//! - `group_parents` and `group_membership` rules run last, once every group
//!   exists

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::dns::{resolve_all, DnsResolver, DnsSettings};
use super::environment::{Environment, EnvironmentResolver};
use super::group::GroupRecord;
use super::host::{HostRecord, DNS_NAME_VAR, ENVIRONMENT_VAR};
use super::parser::{HostFileParser, ParsedFile};
use super::scanner::{ScanResult, ScannedFile};
use super::InventoryGraph;
use crate::config::GitHostsConfig;
use crate::error::{Error, InventoryWarning, Result};

/// An assembled inventory with the warnings raised while building it
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    /// The inventory graph
    pub graph: InventoryGraph,
    /// Non-fatal problems, in the order they occurred
    pub warnings: Vec<InventoryWarning>,
    /// Number of host files merged
    pub files: usize,
}

/// Builds inventory graphs from scanned host files
pub struct InventoryAssembler {
    config: GitHostsConfig,
    resolver: EnvironmentResolver,
    parser: HostFileParser,
    dns: Option<Arc<dyn DnsResolver>>,
}

impl InventoryAssembler {
    /// Create an assembler for a configuration
    pub fn new(config: GitHostsConfig) -> Self {
        Self {
            resolver: EnvironmentResolver::from_config(&config),
            parser: HostFileParser::new(),
            dns: None,
            config,
        }
    }

    /// Use `resolver` for DNS lookups when `dns_resolution` is enabled
    pub fn with_dns_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.dns = Some(resolver);
        self
    }

    /// Read, parse and merge every scanned file into a graph
    pub async fn assemble(&self, scan: &ScanResult) -> Result<Assembly> {
        let mut warnings = scan.warnings.clone();

        // Files are independent; parse them in parallel and merge in scan order.
        let parsed: Vec<(&ScannedFile, std::io::Result<ParsedFile>)> = scan
            .files
            .par_iter()
            .map(|file| (file, self.parser.parse_file(&file.path)))
            .collect();

        let mut readable = Vec::with_capacity(parsed.len());
        for (file, result) in parsed {
            match result {
                Ok(parsed) => readable.push((file, parsed)),
                Err(e) => push(
                    &mut warnings,
                    InventoryWarning::UnreadableFile {
                        path: file.path.clone(),
                        message: e.to_string(),
                    },
                ),
            }
        }

        if readable.is_empty() && !scan.files.is_empty() {
            return Err(Error::NoParsableFiles {
                root: self.config.hosts_directory.clone(),
                count: scan.files.len(),
            });
        }

        let mut merger = Merger::new(&self.config, &self.resolver);
        for (file, parsed) in &readable {
            merger.merge_file(file, parsed, &mut warnings);
        }
        let mut graph = merger.finish();

        if self.config.dns_resolution {
            self.apply_dns(&mut graph, &mut warnings).await;
        }

        apply_group_parents(&self.config, &mut graph, &mut warnings);
        apply_group_membership(&self.config, &mut graph);

        if graph.is_empty() {
            push(
                &mut warnings,
                InventoryWarning::EmptyInventory {
                    root: self.config.hosts_directory.clone(),
                },
            );
        }

        debug_assert!(graph.validate().is_ok());
        info!(
            "Assembled inventory from {} files: {}",
            readable.len(),
            graph
        );

        Ok(Assembly {
            graph,
            warnings,
            files: readable.len(),
        })
    }

    async fn apply_dns(&self, graph: &mut InventoryGraph, warnings: &mut Vec<InventoryWarning>) {
        let Some(resolver) = self.dns.clone() else {
            debug!("DNS resolution enabled but no resolver configured");
            return;
        };

        let report = resolve_all(
            resolver,
            graph.hosts.keys().cloned().collect::<Vec<_>>(),
            DnsSettings::from_config(&self.config),
        )
        .await;

        for (name, alias) in report.aliases {
            if let Some(host) = graph.hosts.get_mut(&name) {
                host.set_var(DNS_NAME_VAR, alias);
            }
        }
        warnings.extend(report.warnings);
    }
}

/// Log a warning and keep it for the report
fn push(warnings: &mut Vec<InventoryWarning>, warning: InventoryWarning) {
    warning.log();
    warnings.push(warning);
}

// ============================================================================
// Merge
// ============================================================================

/// Sequential merge state
struct Merger<'a> {
    config: &'a GitHostsConfig,
    resolver: &'a EnvironmentResolver,
    graph: InventoryGraph,
    /// Environment currently assigned to each host
    host_envs: HashMap<String, Environment>,
}

impl<'a> Merger<'a> {
    fn new(config: &'a GitHostsConfig, resolver: &'a EnvironmentResolver) -> Self {
        Self {
            config,
            resolver,
            graph: InventoryGraph::new(),
            host_envs: HashMap::new(),
        }
    }

    fn merge_file(
        &mut self,
        file: &ScannedFile,
        parsed: &ParsedFile,
        warnings: &mut Vec<InventoryWarning>,
    ) {
        for warning in &parsed.warnings {
            push(warnings, warning.clone());
        }

        let dir_env = match (&file.environment_dir, self.config.environment_detection) {
            (Some(dir), true) => Some(self.resolver.resolve(dir)),
            _ => None,
        };

        debug!(
            "Merging {} (environment: {})",
            file.path.display(),
            dir_env.as_ref().map(|e| e.code.as_str()).unwrap_or("none")
        );

        for (name, group) in &parsed.groups {
            self.graph.group_entry(name).absorb(group);

            if let Some(env) = &dir_env {
                self.graph
                    .environments_by_group
                    .insert(name.clone(), env.clone());
            }
        }

        for (name, group) in &parsed.groups {
            for child in &group.children {
                if !self.graph.add_child_edge(name, child) {
                    push(
                        warnings,
                        InventoryWarning::CycleRejected {
                            parent: name.clone(),
                            child: child.clone(),
                        },
                    );
                }
            }
        }

        for (group, host) in &parsed.hosts {
            self.merge_host(group, host, &file.path, warnings);

            if !self.config.environment_detection {
                continue;
            }
            match &dir_env {
                Some(env) => self.assign_environment(&host.name, env.clone(), warnings),
                None if !self.host_envs.contains_key(&host.name) => {
                    let env = self.resolver.resolve_group_name(group);
                    self.graph
                        .environments_by_group
                        .entry(group.clone())
                        .or_insert_with(|| env.clone());
                    self.assign_environment(&host.name, env, warnings);
                }
                None => {}
            }
        }
    }

    fn merge_host(
        &mut self,
        group: &str,
        host: &HostRecord,
        path: &Path,
        warnings: &mut Vec<InventoryWarning>,
    ) {
        match self.graph.hosts.get_mut(&host.name) {
            Some(existing) => {
                if existing.source_file.as_path() != path {
                    push(
                        warnings,
                        InventoryWarning::DuplicateHostConflict {
                            host: host.name.clone(),
                            first: existing.source_file.clone(),
                            second: path.to_path_buf(),
                        },
                    );
                }
                existing.merge_vars(&host.variables);
                existing.source_file = path.to_path_buf();
                existing.source_group = group.to_string();
            }
            None => {
                self.graph.hosts.insert(host.name.clone(), host.clone());
            }
        }
    }

    fn assign_environment(
        &mut self,
        host: &str,
        env: Environment,
        warnings: &mut Vec<InventoryWarning>,
    ) {
        if let Some(previous) = self.host_envs.get(host) {
            if previous.code != env.code {
                push(
                    warnings,
                    InventoryWarning::EnvironmentConflict {
                        host: host.to_string(),
                        previous: previous.code.clone(),
                        current: env.code.clone(),
                    },
                );
            }
        }

        if let Some(record) = self.graph.hosts.get_mut(host) {
            record.set_var(ENVIRONMENT_VAR, env.code.clone());
        }
        self.host_envs.insert(host.to_string(), env);
    }

    /// Add the `env_<code>` groups and return the graph
    fn finish(mut self) -> InventoryGraph {
        let host_names: Vec<String> = self.graph.hosts.keys().cloned().collect();
        for name in host_names {
            let Some(env) = self.host_envs.get(&name) else {
                continue;
            };
            let group_name = GroupRecord::environment_group_name(&env.code);
            self.graph.group_entry(&group_name).add_host(name.clone());
            self.graph
                .environments_by_group
                .entry(group_name)
                .or_insert_with(|| env.clone());
        }
        self.graph
    }
}

// ============================================================================
// Static Rules
// ============================================================================

/// Apply `group_parents`: each child group is added under its parents
fn apply_group_parents(
    config: &GitHostsConfig,
    graph: &mut InventoryGraph,
    warnings: &mut Vec<InventoryWarning>,
) {
    for (child, parents) in &config.group_parents {
        for parent in parents {
            if !graph.add_child_edge(parent, child) {
                push(
                    warnings,
                    InventoryWarning::CycleRejected {
                        parent: parent.clone(),
                        child: child.clone(),
                    },
                );
            }
        }
    }
}

/// Apply `group_membership`: hosts of each source group join the target
fn apply_group_membership(config: &GitHostsConfig, graph: &mut InventoryGraph) {
    for (target, sources) in &config.group_membership {
        graph.group_entry(target);
        for source in sources {
            if !graph.groups.contains_key(source) {
                debug!("group_membership source '{}' does not exist", source);
                continue;
            }
            let hosts = graph.hosts_in_group(source);
            debug!(
                "Adding {} hosts from '{}' to '{}'",
                hosts.len(),
                source,
                target
            );
            graph.group_entry(target).hosts.extend(hosts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::dns::StaticDnsResolver;
    use crate::inventory::scanner::FileScanner;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    async fn assemble(config: GitHostsConfig) -> Assembly {
        let scan = FileScanner::from_config(&config).unwrap().scan().unwrap();
        InventoryAssembler::new(config).assemble(&scan).await.unwrap()
    }

    #[tokio::test]
    async fn test_prod_scenario() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "prod/hosts_web",
            "[web_servers]\nweb01.example.com ansible_user=webuser\n",
        );

        let assembly = assemble(GitHostsConfig::new(dir.path())).await;
        let graph = &assembly.graph;

        let host = graph.get_host("web01.example.com").unwrap();
        assert_eq!(host.get_var("ansible_user"), Some("webuser"));
        assert_eq!(host.environment(), Some("PRD"));
        assert!(graph.get_group("web_servers").unwrap().has_host("web01.example.com"));
        assert!(graph.get_group("env_prd").unwrap().has_host("web01.example.com"));
        assert_eq!(graph.environments_by_group["web_servers"].code, "PRD");
        assert!(assembly.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_last_file_wins_and_warns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prod/hosts_a", "[web]\nweb01 port=80 role=web\n");
        write(dir.path(), "prod/hosts_b", "[web]\nweb01 port=8080\n");

        let assembly = assemble(GitHostsConfig::new(dir.path())).await;
        let host = assembly.graph.get_host("web01").unwrap();

        assert_eq!(host.get_var("port"), Some("8080"));
        assert_eq!(host.get_var("role"), Some("web"));
        assert_eq!(assembly.graph.get_group("web").unwrap().host_count(), 1);
        assert!(assembly
            .warnings
            .iter()
            .any(|w| matches!(w, InventoryWarning::DuplicateHostConflict { .. })));
    }

    #[tokio::test]
    async fn test_environment_conflict_last_scanned_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "acc/hosts_app", "[app]\nshared01\n");
        write(dir.path(), "prod/hosts_app", "[app]\nshared01\n");

        let config = GitHostsConfig::new(dir.path()).with_environment_dirs(["acc", "prod"]);
        let assembly = assemble(config).await;
        let graph = &assembly.graph;

        assert_eq!(graph.get_host("shared01").unwrap().environment(), Some("PRD"));
        assert!(graph.get_group("env_prd").unwrap().has_host("shared01"));
        assert!(graph.get_group("env_acc").is_none());
        assert!(assembly
            .warnings
            .iter()
            .any(|w| matches!(w, InventoryWarning::EnvironmentConflict { .. })));
    }

    #[tokio::test]
    async fn test_detection_disabled() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prod/hosts_web", "[web]\nweb01\n");

        let config = GitHostsConfig::new(dir.path()).with_environment_detection(false);
        let assembly = assemble(config).await;

        assert_eq!(assembly.graph.get_host("web01").unwrap().environment(), None);
        assert!(assembly.graph.get_group("env_prd").is_none());
        assert!(assembly.graph.environments_by_group.is_empty());
    }

    #[tokio::test]
    async fn test_root_files_use_group_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "hosts_legacy", "[web_PRD]\nweb01\n[batch]\nbatch01\n[monitoring]\nweb01\n");

        let assembly = assemble(GitHostsConfig::new(dir.path())).await;
        let graph = &assembly.graph;

        assert_eq!(graph.get_host("web01").unwrap().environment(), Some("PRD"));
        assert_eq!(graph.get_host("batch01").unwrap().environment(), Some("MISC"));
        assert!(graph.get_group("env_misc").unwrap().has_host("batch01"));
    }

    #[tokio::test]
    async fn test_dns_aliases() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prod/hosts_web", "[web]\nwww.example.com\ndb01.example.com\n");

        let resolver = Arc::new(StaticDnsResolver::new().with_alias("www.example.com", "lb01.example.com"));
        let config = GitHostsConfig::new(dir.path()).with_dns(true);
        let scan = FileScanner::from_config(&config).unwrap().scan().unwrap();
        let assembly = InventoryAssembler::new(config)
            .with_dns_resolver(resolver)
            .assemble(&scan)
            .await
            .unwrap();

        let graph = &assembly.graph;
        assert_eq!(graph.get_host("www.example.com").unwrap().dns_name(), Some("lb01.example.com"));
        assert_eq!(graph.get_host("db01.example.com").unwrap().dns_name(), None);
    }

    #[tokio::test]
    async fn test_static_rules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "prod/hosts_web", "[web]\nweb01\n");
        write(dir.path(), "acc/hosts_web", "[web]\nweb02\n");

        let config = GitHostsConfig::new(dir.path())
            .with_group_membership("production", ["env_prd"])
            .with_group_parents("web", ["frontend"]);
        let assembly = assemble(config).await;
        let graph = &assembly.graph;

        let production = graph.get_group("production").unwrap();
        assert!(production.has_host("web01"));
        assert!(!production.has_host("web02"));
        assert!(graph.get_group("frontend").unwrap().has_child("web"));
        assert!(graph.validate().is_ok());
    }

    #[tokio::test]
    async fn test_cycle_from_children_sections_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "prod/hosts_groups",
            "[a:children]\nb\n[b:children]\na\n[a]\nhost01\n",
        );

        let assembly = assemble(GitHostsConfig::new(dir.path())).await;
        assert!(assembly.graph.validate().is_ok());
        assert!(assembly
            .warnings
            .iter()
            .any(|w| matches!(w, InventoryWarning::CycleRejected { .. })));
    }

    #[tokio::test]
    async fn test_empty_inventory_warning() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("prod")).unwrap();

        let assembly = assemble(GitHostsConfig::new(dir.path())).await;
        assert!(assembly.graph.is_empty());
        assert!(matches!(
            assembly.warnings.last(),
            Some(InventoryWarning::EmptyInventory { .. })
        ));
    }
}
