//! # git-hosts - Environment-Aware Dynamic Inventory
//!
//! git-hosts builds an Ansible inventory from INI-style host files kept in a
//! git checkout. The checkout is laid out by environment: every top-level
//! directory (`prod/`, `qa/`, `development/`, ...) holds the host files for
//! one environment, and every host picks up an `environment` variable and
//! membership in an `env_<code>` group.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────────────┐
//! │ FileScanner  │──▶│ HostFileParser │──▶│ InventoryAssembler  │
//! │ (env dirs +  │   │ (INI sections, │   │ (merge, environment │
//! │  globs)      │   │  host vars)    │   │  codes, rules)      │
//! └──────────────┘   └────────────────┘   └─────────────────────┘
//!                                            │            │
//!                          ┌─────────────────┘            ▼
//!                          ▼                     ┌─────────────────┐
//!                 ┌─────────────────┐            │   DnsResolver   │
//!                 │ InventoryGraph  │◀───────────│ (CNAME aliases, │
//!                 │  + CacheStore   │            │  bounded)       │
//!                 └─────────────────┘            └─────────────────┘
//!                          │
//!                          ▼
//!                 Ansible dynamic-inventory JSON
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use git_hosts::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = GitHostsConfig::new("/srv/ansible-hosts")
//!         .with_auto_patterns(true)
//!         .with_dns(true);
//!
//!     let run = GitHostsPlugin::new(config).run().await?;
//!     println!("{}", inventory_to_json(&run.graph));
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::{CacheBackend, GitHostsConfig};
    pub use crate::error::{Error, InventoryWarning, Result};
    pub use crate::inventory::render::{host_vars_json, inventory_to_json};
    pub use crate::inventory::{
        CacheStore, DnsResolver, Environment, EnvironmentResolver, GitHostsPlugin, GroupRecord,
        HostRecord, InventoryGraph, InventoryPlugin, InventoryRun,
    };
}

/// Error types and the non-fatal warning taxonomy.
pub mod error;

/// Inventory source configuration.
pub mod config;

/// Scanning, parsing, environment detection, DNS, assembly and caching.
pub mod inventory;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
