//! Host records for the git-hosts inventory.
//!
//! A `HostRecord` is created the first time a host name is seen in a host
//! file and accumulates variables from every later definition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Host variable carrying the detected environment code
pub const ENVIRONMENT_VAR: &str = "environment";

/// Host variable carrying the resolved DNS alias
pub const DNS_NAME_VAR: &str = "DNSName";

/// A single host in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host name as written in the host file
    pub name: String,

    /// Host variables, in first-seen key order
    #[serde(default)]
    pub variables: IndexMap<String, String>,

    /// File holding the most recent definition
    pub source_file: PathBuf,

    /// Section holding the most recent definition
    pub source_group: String,
}

impl HostRecord {
    /// Create a new host record
    pub fn new(
        name: impl Into<String>,
        source_file: impl Into<PathBuf>,
        source_group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
            source_file: source_file.into(),
            source_group: source_group.into(),
        }
    }

    /// Set a variable, replacing any previous value
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a variable
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Merge variables from another definition; incoming values win
    pub fn merge_vars(&mut self, other: &IndexMap<String, String>) {
        for (key, value) in other {
            self.variables.insert(key.clone(), value.clone());
        }
    }

    /// Detected environment code, if any
    pub fn environment(&self) -> Option<&str> {
        self.get_var(ENVIRONMENT_VAR)
    }

    /// Resolved DNS alias, if any
    pub fn dns_name(&self) -> Option<&str> {
        self.get_var(DNS_NAME_VAR)
    }
}

impl std::fmt::Display for HostRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
