//! Group records for the git-hosts inventory.
//!
//! Groups come from `[section]` headers in host files, from the synthetic
//! per-environment groups, and from static membership rules. Same-named
//! groups from different files are unioned.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Implicit group for host lines that precede any section header
pub const UNGROUPED: &str = "ungrouped";

/// Implicit root group
pub const ALL: &str = "all";

/// Prefix of the synthetic per-environment groups
pub const ENV_GROUP_PREFIX: &str = "env_";

/// A group of hosts in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group name
    pub name: String,

    /// Host names belonging to this group, in insertion order
    #[serde(default)]
    pub hosts: IndexSet<String>,

    /// Child group names
    #[serde(default)]
    pub children: IndexSet<String>,

    /// Group variables from `[name:vars]` sections
    #[serde(default)]
    pub vars: IndexMap<String, String>,
}

impl GroupRecord {
    /// Create a new group with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: IndexSet::new(),
            children: IndexSet::new(),
            vars: IndexMap::new(),
        }
    }

    /// Name of the synthetic group for an environment code
    pub fn environment_group_name(code: &str) -> String {
        format!("{}{}", ENV_GROUP_PREFIX, code.to_lowercase())
    }

    /// Add a host; returns false if it was already a member
    pub fn add_host(&mut self, host: impl Into<String>) -> bool {
        self.hosts.insert(host.into())
    }

    /// Check whether a host is a direct member
    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Add a child group; returns false if it was already a child
    pub fn add_child(&mut self, child: impl Into<String>) -> bool {
        self.children.insert(child.into())
    }

    /// Check whether a group is a direct child
    pub fn has_child(&self, child: &str) -> bool {
        self.children.contains(child)
    }

    /// Set a group variable
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Union the hosts and vars of another definition of the same group
    /// into this one; later vars win. Children are left to the caller,
    /// which adds them as cycle-checked edges.
    pub fn absorb(&mut self, other: &GroupRecord) {
        self.hosts.extend(other.hosts.iter().cloned());
        for (key, value) in &other.vars {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    /// Number of direct hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the group has neither hosts nor children
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.children.is_empty()
    }
}
