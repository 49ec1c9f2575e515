//! Shared test utilities and fixtures for the git-hosts test suite.
//!
//! This module provides:
//! - A fluent builder for hosts directories on disk
//! - A DNS resolver that counts its lookups
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use git_hosts::config::GitHostsConfig;
use git_hosts::inventory::{DnsOutcome, DnsResolver};

// ============================================================================
// Hosts Directory Builder
// ============================================================================

/// A temporary hosts directory, removed on drop
pub struct HostsTree {
    dir: TempDir,
}

impl HostsTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Write `content` to `<root>/<relative>`, creating parent directories
    pub fn file(self, relative: &str, content: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write host file");
        self
    }

    /// Create an empty directory
    pub fn dir(self, relative: &str) -> Self {
        fs::create_dir_all(self.dir.path().join(relative)).expect("create dir");
        self
    }

    /// Root of the tree
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file in the tree
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Default configuration pointing at this tree
    pub fn config(&self) -> GitHostsConfig {
        GitHostsConfig::new(self.root())
    }
}

/// The `prod/hosts_web` scenario used across the suite
pub fn web_servers_tree() -> HostsTree {
    HostsTree::new().file(
        "prod/hosts_web",
        "[web_servers]\nweb01.example.com ansible_user=webuser\n",
    )
}

// ============================================================================
// Counting DNS Resolver
// ============================================================================

/// Resolver returning fixed aliases and counting every lookup
#[derive(Debug, Default)]
pub struct CountingDnsResolver {
    aliases: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl CountingDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, host: &str, target: &str) -> Self {
        self.aliases.insert(host.to_string(), target.to_string());
        self
    }

    /// Number of lookups performed so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for CountingDnsResolver {
    fn name(&self) -> &str {
        "counting"
    }

    async fn lookup(&self, host: &str) -> DnsOutcome {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.aliases.get(host) {
            Some(target) => DnsOutcome::Alias(target.clone()),
            None => DnsOutcome::NoAlias,
        }
    }
}
