//! Host file parser
//!
//! Host files are INI-like:
//!
//! ```ini
//! # comment
//! [web_servers]
//! web01.example.com ansible_user=webuser http_port=8080
//! web02.example.com note="primary frontend"
//!
//! [web_servers:vars]
//! ntp_server=ntp.example.com
//!
//! [frontend:children]
//! web_servers
//! ```
//!
//! Parsing is best effort. Anything that cannot be interpreted is skipped
//! and reported as an [`InventoryWarning::FileParse`]; the parser itself
//! never fails.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::group::{GroupRecord, UNGROUPED};
use super::host::HostRecord;
use crate::error::InventoryWarning;

/// Result of parsing one host file
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Source file
    pub path: PathBuf,
    /// Host definitions as `(group, host)` pairs in file order
    pub hosts: Vec<(String, HostRecord)>,
    /// Every group the file mentions, with its members, children and vars
    pub groups: IndexMap<String, GroupRecord>,
    /// Skipped lines and tokens
    pub warnings: Vec<InventoryWarning>,
}

impl ParsedFile {
    /// Number of host definitions
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    fn group_mut(&mut self, name: &str) -> &mut GroupRecord {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| GroupRecord::new(name))
    }

    fn warn(&mut self, line: usize, message: impl Into<String>) {
        self.warnings.push(InventoryWarning::FileParse {
            path: self.path.clone(),
            line,
            message: message.into(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Hosts,
    Vars,
    Children,
}

/// Parser for INI-style host files
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFileParser;

impl HostFileParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a host file from disk
    pub fn parse_file(&self, path: &Path) -> std::io::Result<ParsedFile> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.parse(&content, path))
    }

    /// Parse host file text. `path` is only used for reporting.
    pub fn parse(&self, content: &str, path: &Path) -> ParsedFile {
        let mut parsed = ParsedFile {
            path: path.to_path_buf(),
            ..Default::default()
        };

        let mut current_group = UNGROUPED.to_string();
        let mut kind = SectionKind::Hosts;

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = line[1..line.len() - 1].trim();
                let (name, section_kind) = split_section(section);
                if name.is_empty() {
                    parsed.warn(line_no, "empty group name, skipping section header");
                    continue;
                }
                current_group = name.to_string();
                kind = section_kind;
                parsed.group_mut(&current_group);
                continue;
            }

            match kind {
                SectionKind::Hosts => parse_host_line(&mut parsed, &current_group, line, line_no),
                SectionKind::Vars => match line.split_once('=') {
                    Some((key, value)) if !key.trim().is_empty() => {
                        let value = strip_quotes(value.trim()).to_string();
                        parsed.group_mut(&current_group).set_var(key.trim(), value);
                    }
                    _ => parsed.warn(
                        line_no,
                        format!("ignoring group variable line without key=value: '{}'", line),
                    ),
                },
                SectionKind::Children => {
                    let mut tokens = line.split_whitespace();
                    if let Some(child) = tokens.next() {
                        if tokens.next().is_some() {
                            parsed.warn(
                                line_no,
                                format!("ignoring trailing tokens after child group '{}'", child),
                            );
                        }
                        parsed.group_mut(child);
                        parsed.group_mut(&current_group).add_child(child);
                    }
                }
            }
        }

        debug!(
            "Parsed {}: {} host entries, {} groups, {} warnings",
            path.display(),
            parsed.hosts.len(),
            parsed.groups.len(),
            parsed.warnings.len()
        );

        parsed
    }
}

/// Split a section name into group name and section kind
fn split_section(section: &str) -> (&str, SectionKind) {
    if let Some((name, suffix)) = section.rsplit_once(':') {
        match suffix {
            "vars" => return (name.trim(), SectionKind::Vars),
            "children" => return (name.trim(), SectionKind::Children),
            _ => {}
        }
    }
    (section, SectionKind::Hosts)
}

fn parse_host_line(parsed: &mut ParsedFile, group: &str, line: &str, line_no: usize) {
    let tokens = match split_host_line(line) {
        Some(tokens) => tokens,
        None => {
            parsed.warn(line_no, "unbalanced quotes, splitting on whitespace");
            line.split_whitespace().map(String::from).collect()
        }
    };

    let mut tokens = tokens.into_iter();
    let Some(name) = tokens.next() else {
        return;
    };

    let mut host = HostRecord::new(name.as_str(), parsed.path.clone(), group);
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                host.set_var(key, value);
            }
            Some(_) => parsed.warn(
                line_no,
                format!("ignoring variable with empty key '{}' on host {}", token, name),
            ),
            None => parsed.warn(
                line_no,
                format!("ignoring token '{}' without '=' on host {}", token, name),
            ),
        }
    }

    parsed.group_mut(group).add_host(name);
    parsed.hosts.push((group.to_string(), host));
}

/// Split a host line on whitespace outside single or double quotes.
///
/// Quote characters are removed; everything else, backslashes included, is
/// kept verbatim. Returns `None` when a quote is left open.
fn split_host_line(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

/// Remove one level of matching single or double quotes
fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
