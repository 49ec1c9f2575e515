//! Output formatting for git-hosts
//!
//! Inventory documents go to stdout as JSON or YAML; the group tree and the
//! run summary are colored unless `--no-color` or `NO_COLOR` is set.

use anyhow::Result;
use colored::Colorize;
use git_hosts::inventory::plugin::InventoryRun;
use git_hosts::inventory::render::{graph_tree, to_json_string, to_yaml_string};
use git_hosts::inventory::InventoryGraph;
use serde_json::Value;

/// Document format for `--list` and `--host`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// Output formatter for inventory documents and summaries
pub struct OutputFormatter {
    use_color: bool,
    format: DocumentFormat,
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: DocumentFormat, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            format,
            verbosity,
        }
    }

    /// Serialize a document in the selected format
    pub fn render_document(&self, document: &Value) -> Result<String> {
        let text = match self.format {
            DocumentFormat::Json => to_json_string(document)?,
            DocumentFormat::Yaml => to_yaml_string(document)?,
        };
        Ok(text)
    }

    /// Print a document to stdout
    pub fn document(&self, document: &Value) -> Result<()> {
        let text = self.render_document(document)?;
        println!("{}", text.trim_end());
        Ok(())
    }

    /// Render the group tree, coloring groups and hosts
    pub fn render_tree(&self, graph: &InventoryGraph) -> String {
        let tree = graph_tree(graph);
        if !self.use_color {
            return tree;
        }

        tree.lines()
            .map(|line| match line.rfind("--") {
                Some(idx) => {
                    let (prefix, name) = line.split_at(idx + 2);
                    if name.starts_with('@') {
                        format!("{}{}", prefix.bright_black(), name.cyan().bold())
                    } else {
                        format!("{}{}", prefix.bright_black(), name.green())
                    }
                }
                None => line.cyan().bold().to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    /// Print the group tree to stdout
    pub fn tree(&self, graph: &InventoryGraph) {
        print!("{}", self.render_tree(graph));
    }

    /// Print a one-line run summary to stderr when verbose
    pub fn summary(&self, run: &InventoryRun) {
        if self.verbosity == 0 {
            return;
        }

        let source = if run.from_cache {
            "cache".cyan().to_string()
        } else {
            format!("{} files", run.files)
        };
        let warnings = match run.warnings.len() {
            0 => "0 warnings".green().to_string(),
            n => format!("{} warnings", n).yellow().to_string(),
        };
        eprintln!("{} ({}, {})", run.graph, source, warnings);

        if self.verbosity >= 2 {
            for warning in &run.warnings {
                eprintln!("  {} {}", format!("[{}]", warning.kind()).yellow(), warning);
            }
        }
    }
}
