//! Error types for git-hosts.
//!
//! Two families live here:
//! - [`Error`]: fatal conditions that abort an inventory run
//! - [`InventoryWarning`]: non-fatal conditions collected during a run and
//!   reported alongside the resulting graph

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for git-hosts operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for git-hosts.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The configured hosts directory does not exist.
    #[error("Hosts directory does not exist: {}", path.display())]
    DirectoryNotFound {
        /// Configured root path
        path: PathBuf,
    },

    /// The configured hosts directory exists but is not a directory.
    #[error("Hosts directory path is not a directory: {}", path.display())]
    NotADirectory {
        /// Configured root path
        path: PathBuf,
    },

    /// Host files were found but none of them could be read.
    #[error("None of the {count} host files under '{}' could be read", root.display())]
    NoParsableFiles {
        /// Configured root path
        root: PathBuf,
        /// Number of candidate files
        count: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid inventory source configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("Failed to read configuration '{}': {source}", path.display())]
    ConfigRead {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Cache backend failure.
    #[error("Cache error: {0}")]
    Cache(String),

    // ========================================================================
    // Wrapped Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }
}

/// Non-fatal conditions raised while building an inventory.
///
/// Warnings never stop a run. They are logged as they occur and returned
/// with the assembled graph so callers can surface them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryWarning {
    /// A line or token in a host file could not be interpreted.
    #[error("{}:{line}: {message}", path.display())]
    FileParse {
        /// Host file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was skipped
        message: String,
    },

    /// A candidate host file could not be read.
    #[error("Could not read file {}: {message}", path.display())]
    UnreadableFile {
        /// Host file
        path: PathBuf,
        /// IO error text
        message: String,
    },

    /// An environment directory name was rejected.
    #[error("Skipping potentially unsafe environment directory: {name}")]
    UnsafeEnvironmentDir {
        /// Configured directory name
        name: String,
    },

    /// A DNS lookup failed for a reason other than "no alias".
    #[error("DNS resolution failed for {host}: {reason}")]
    DnsLookupFailure {
        /// Queried host name
        host: String,
        /// Failure description
        reason: String,
    },

    /// A host was defined more than once; later variables overwrite earlier ones.
    #[error("Host {host} found in multiple locations ({} and {}), variables may be overwritten", first.display(), second.display())]
    DuplicateHostConflict {
        /// Host name
        host: String,
        /// File of the first definition
        first: PathBuf,
        /// File of the overriding definition
        second: PathBuf,
    },

    /// A host appears under two environment directories.
    #[error("Host {host} appears in environments {previous} and {current}; using {current}")]
    EnvironmentConflict {
        /// Host name
        host: String,
        /// Environment code assigned first
        previous: String,
        /// Environment code that wins
        current: String,
    },

    /// A child-group edge was dropped because it would create a cycle.
    #[error("Ignoring child group '{child}' of '{parent}': would create a cycle")]
    CycleRejected {
        /// Parent group
        parent: String,
        /// Child group
        child: String,
    },

    /// The cache could not be used; the inventory was built without it.
    #[error("Inventory cache unavailable ({operation}): {message}")]
    CacheFailure {
        /// What failed: fingerprint, read or write
        operation: String,
        /// Underlying error text
        message: String,
    },

    /// The run produced no hosts at all.
    #[error("No hosts found under {}", root.display())]
    EmptyInventory {
        /// Configured root path
        root: PathBuf,
    },
}

impl InventoryWarning {
    /// Emit this warning through `tracing`.
    pub fn log(&self) {
        tracing::warn!("{}", self);
    }

    /// Short machine-readable kind, used for grouping in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileParse { .. } => "file_parse",
            Self::UnreadableFile { .. } => "unreadable_file",
            Self::UnsafeEnvironmentDir { .. } => "unsafe_environment_dir",
            Self::DnsLookupFailure { .. } => "dns_lookup_failure",
            Self::DuplicateHostConflict { .. } => "duplicate_host_conflict",
            Self::EnvironmentConflict { .. } => "environment_conflict",
            Self::CycleRejected { .. } => "cycle_rejected",
            Self::CacheFailure { .. } => "cache_failure",
            Self::EmptyInventory { .. } => "empty_inventory",
        }
    }
}
