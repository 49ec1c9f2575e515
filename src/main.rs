//! git-hosts - environment-aware dynamic inventory
//!
//! This is the main entry point for the git-hosts CLI. Logs go to stderr so
//! stdout stays a valid inventory document.

mod cli;

use anyhow::{Context, Result};
use cli::output::{DocumentFormat, OutputFormatter};
use cli::Cli;
use git_hosts::inventory::dns;
use git_hosts::inventory::render::{host_vars_json, inventory_to_json};
use git_hosts::inventory::GitHostsPlugin;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), cli.log_json);

    if cli.verbosity() >= 2 {
        eprintln!("git-hosts v{}", git_hosts::VERSION);
    }

    // Timed-out DNS lookups may still hold blocking threads; do not let
    // them delay exit once the inventory has been written.
    dns::block_on(run(cli)).context("failed to start async runtime")?
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    debug!("Using hosts directory {}", config.hosts_directory.display());

    let plugin = GitHostsPlugin::new(config).with_refresh(cli.refresh_cache);
    let run = plugin.run().await.context("failed to build inventory")?;

    let format = if cli.yaml {
        DocumentFormat::Yaml
    } else {
        DocumentFormat::Json
    };
    let output = OutputFormatter::new(!cli.no_color, format, cli.verbosity());
    output.summary(&run);

    if let Some(host) = &cli.host {
        output.document(&host_vars_json(&run.graph, host))?;
    } else if cli.graph {
        output.tree(&run.graph);
    } else {
        output.document(&inventory_to_json(&run.graph))?;
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 3),
            )
            .with(env_filter)
            .init();
    }
}
