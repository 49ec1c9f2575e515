//! Inventory assembly for git-hosts.
//!
//! This module turns a directory of environment-organized host files into an
//! [`InventoryGraph`]:
//! - [`scanner`] finds host files per environment directory
//! - [`parser`] reads INI-style host files
//! - [`environment`] derives environment codes from directory and group names
//! - [`dns`] resolves DNS aliases
//! - [`assembler`] merges everything into one graph
//! - [`cache`] stores graphs keyed by a fingerprint of the source tree
//! - [`plugin`] runs the whole pipeline for one inventory source
//! - [`render`] produces Ansible dynamic-inventory JSON

pub mod assembler;
pub mod cache;
pub mod dns;
pub mod environment;
pub mod group;
pub mod host;
pub mod parser;
pub mod plugin;
pub mod render;
pub mod scanner;

pub use assembler::{Assembly, InventoryAssembler};
pub use cache::{CacheStore, Fingerprint, JsonFileCacheStore, MemoryCacheStore};
pub use dns::{DnsOutcome, DnsResolver, DnsSettings, StaticDnsResolver, SystemDnsResolver};
pub use environment::{DetectionStrategy, Environment, EnvironmentResolver};
pub use group::GroupRecord;
pub use host::HostRecord;
pub use parser::{HostFileParser, ParsedFile};
pub use plugin::{GitHostsPlugin, InventoryPlugin, InventoryRun};
pub use scanner::{FileScanner, ScanResult, ScannedFile};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The assembled inventory: hosts, groups and per-group environments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryGraph {
    /// All hosts indexed by name, in first-seen order
    pub hosts: IndexMap<String, HostRecord>,

    /// All groups indexed by name, in first-seen order
    pub groups: IndexMap<String, GroupRecord>,

    /// Environment resolved for each group that has one
    pub environments_by_group: IndexMap<String, Environment>,
}

impl InventoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Number of groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Whether the graph has no hosts
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Get a host by name
    pub fn get_host(&self, name: &str) -> Option<&HostRecord> {
        self.hosts.get(name)
    }

    /// Get a group by name
    pub fn get_group(&self, name: &str) -> Option<&GroupRecord> {
        self.groups.get(name)
    }

    /// Get a group, creating it empty if missing
    pub fn group_entry(&mut self, name: &str) -> &mut GroupRecord {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| GroupRecord::new(name))
    }

    /// Names of the groups a host belongs to directly
    pub fn groups_of(&self, host: &str) -> Vec<&str> {
        self.groups
            .values()
            .filter(|g| g.has_host(host))
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Hosts of a group including those of its descendants
    pub fn hosts_in_group(&self, name: &str) -> IndexSet<String> {
        let mut hosts = IndexSet::new();
        let mut seen = HashSet::new();
        let mut stack = vec![name.to_string()];

        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(group) = self.groups.get(&current) {
                hosts.extend(group.hosts.iter().cloned());
                stack.extend(group.children.iter().rev().cloned());
            }
        }

        hosts
    }

    /// Groups that are not a child of any other group
    pub fn top_level_groups(&self) -> Vec<&str> {
        let children: HashSet<&str> = self
            .groups
            .values()
            .flat_map(|g| g.children.iter().map(String::as_str))
            .collect();

        self.groups
            .keys()
            .map(String::as_str)
            .filter(|name| !children.contains(name))
            .collect()
    }

    /// Distinct environment codes assigned to hosts, in first-seen order
    pub fn environment_codes(&self) -> Vec<&str> {
        let codes: IndexSet<&str> = self.hosts.values().filter_map(|h| h.environment()).collect();
        codes.into_iter().collect()
    }

    /// Whether adding `parent -> child` would create a cycle
    pub fn would_create_cycle(&self, parent: &str, child: &str) -> bool {
        if parent == child {
            return true;
        }

        let mut visited = HashSet::new();
        let mut stack = vec![child];
        while let Some(current) = stack.pop() {
            if current == parent {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(group) = self.groups.get(current) {
                stack.extend(group.children.iter().map(String::as_str));
            }
        }
        false
    }

    /// Add a child-group edge, creating both groups if needed.
    ///
    /// Returns false, leaving the graph unchanged, when the edge would
    /// create a cycle.
    pub fn add_child_edge(&mut self, parent: &str, child: &str) -> bool {
        if self.would_create_cycle(parent, child) {
            return false;
        }
        self.group_entry(child);
        self.group_entry(parent).add_child(child);
        true
    }

    /// Check the graph invariants: every group member exists as a host,
    /// every child exists as a group, and the hierarchy is acyclic.
    pub fn validate(&self) -> Result<(), String> {
        for group in self.groups.values() {
            if let Some(host) = group.hosts.iter().find(|h| !self.hosts.contains_key(*h)) {
                return Err(format!("group '{}' references unknown host '{}'", group.name, host));
            }
            if let Some(child) = group.children.iter().find(|c| !self.groups.contains_key(*c)) {
                return Err(format!("group '{}' references unknown child '{}'", group.name, child));
            }
        }

        let mut done = HashSet::new();
        for name in self.groups.keys() {
            let mut path = HashSet::new();
            if self.has_cycle(name, &mut done, &mut path) {
                return Err(format!("group hierarchy has a cycle through '{}'", name));
            }
        }

        Ok(())
    }

    fn has_cycle<'a>(
        &'a self,
        group: &'a str,
        done: &mut HashSet<&'a str>,
        path: &mut HashSet<&'a str>,
    ) -> bool {
        if path.contains(group) {
            return true;
        }
        if done.contains(group) {
            return false;
        }

        path.insert(group);
        if let Some(record) = self.groups.get(group) {
            for child in &record.children {
                if self.has_cycle(child, done, path) {
                    return true;
                }
            }
        }
        path.remove(group);
        done.insert(group);
        false
    }
}

impl fmt::Display for InventoryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hosts, {} groups, {} environments",
            self.host_count(),
            self.group_count(),
            self.environment_codes().len()
        )
    }
}
