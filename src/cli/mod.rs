//! CLI module for git-hosts
//!
//! Argument parsing for the dynamic-inventory executable. Ansible calls it
//! with `--list` or `--host <name>`; `--graph` prints a tree for people.

pub mod output;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use git_hosts::config::GitHostsConfig;
use std::path::PathBuf;

/// Default inventory source file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "git_hosts.yml";

/// git-hosts - environment-aware dynamic inventory
///
/// Builds an Ansible inventory from host files kept in a git checkout,
/// grouping hosts by the environment directory they live in.
#[derive(Parser, Debug, Clone)]
#[command(name = "git-hosts")]
#[command(author = "git-hosts Contributors")]
#[command(version)]
#[command(about = "Environment-aware dynamic inventory from a git checkout", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "host", "graph"])))]
pub struct Cli {
    /// Print the whole inventory
    #[arg(long)]
    pub list: bool,

    /// Print the variables of one host
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,

    /// Print the group hierarchy as a tree
    #[arg(long)]
    pub graph: bool,

    /// Emit YAML instead of JSON
    #[arg(long)]
    pub yaml: bool,

    /// Ignore cached inventory and rebuild it
    #[arg(long)]
    pub refresh_cache: bool,

    /// Path to the inventory source file
    #[arg(short = 'c', long, env = "GIT_HOSTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Hosts directory, overriding the one in the source file
    #[arg(short = 'd', long, env = "GIT_HOSTS_DIRECTORY")]
    pub hosts_directory: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Load the inventory source configuration.
    ///
    /// Uses `--config` when given, otherwise `git_hosts.yml` in the working
    /// directory if present. `--hosts-directory` alone is enough to run with
    /// default options.
    pub fn load_config(&self) -> Result<GitHostsConfig> {
        let path = self.config.clone().or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        });

        let mut config = match (&path, &self.hosts_directory) {
            (Some(path), _) => {
                if !GitHostsConfig::verify_file(path) {
                    anyhow::bail!(
                        "{} is not a git_hosts inventory source (expected a .yml or .yaml file)",
                        path.display()
                    );
                }
                GitHostsConfig::from_file(path)
                    .with_context(|| format!("failed to load {}", path.display()))?
            }
            (None, Some(dir)) => GitHostsConfig::new(dir),
            (None, None) => anyhow::bail!(
                "no inventory source: pass --config, --hosts-directory or create {}",
                DEFAULT_CONFIG_FILE
            ),
        };

        if let Some(dir) = &self.hosts_directory {
            config.hosts_directory = dir.clone();
        }

        Ok(config)
    }
}
