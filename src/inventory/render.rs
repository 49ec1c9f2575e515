//! Ansible dynamic-inventory output
//!
//! Produces the document Ansible expects from `--list`:
//!
//! ```json
//! {
//!   "all": {"children": ["web_servers", "env_prd"]},
//!   "web_servers": {"hosts": ["web01.example.com"], "vars": {}},
//!   "_meta": {"hostvars": {"web01.example.com": {"environment": "PRD"}}}
//! }
//! ```
//!
//! plus the per-host variables for `--host` and a plain-text group tree.

use serde_json::{Map, Value};
use std::fmt::Write as _;

use super::group::{GroupRecord, ALL, UNGROUPED};
use super::InventoryGraph;
use crate::error::Result;

fn string_array<'a>(items: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(items.into_iter().map(|s| Value::String(s.clone())).collect())
}

fn vars_object<'a>(vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Value {
    Value::Object(
        vars.into_iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn group_json(group: &GroupRecord) -> Value {
    let mut data = Map::new();

    if !group.hosts.is_empty() {
        data.insert("hosts".to_string(), string_array(&group.hosts));
    }
    if !group.children.is_empty() {
        data.insert("children".to_string(), string_array(&group.children));
    }
    if !group.vars.is_empty() {
        data.insert("vars".to_string(), vars_object(&group.vars));
    }

    Value::Object(data)
}

/// Convert a graph to the dynamic-inventory `--list` document.
///
/// The `all` group is synthesized: its children are the top-level groups,
/// and hosts or vars from an explicit `[all]` section are kept. An empty
/// `ungrouped` group is omitted.
pub fn inventory_to_json(graph: &InventoryGraph) -> Value {
    let mut result = Map::new();

    let mut all = match graph.get_group(ALL) {
        Some(group) => group.clone(),
        None => GroupRecord::new(ALL),
    };
    for name in graph.top_level_groups() {
        if name == ALL {
            continue;
        }
        if name == UNGROUPED && graph.get_group(UNGROUPED).map_or(true, GroupRecord::is_empty) {
            continue;
        }
        all.add_child(name);
    }
    result.insert(ALL.to_string(), group_json(&all));

    for group in graph.groups.values() {
        if group.name == ALL {
            continue;
        }
        if group.name == UNGROUPED && group.is_empty() {
            continue;
        }
        result.insert(group.name.clone(), group_json(group));
    }

    let hostvars: Map<String, Value> = graph
        .hosts
        .values()
        .map(|host| (host.name.clone(), vars_object(&host.variables)))
        .collect();

    let mut meta = Map::new();
    meta.insert("hostvars".to_string(), Value::Object(hostvars));
    result.insert("_meta".to_string(), Value::Object(meta));

    Value::Object(result)
}

/// Variables of one host for `--host`; unknown hosts yield an empty object
pub fn host_vars_json(graph: &InventoryGraph, host: &str) -> Value {
    match graph.get_host(host) {
        Some(record) => vars_object(&record.variables),
        None => Value::Object(Map::new()),
    }
}

/// Serialize a rendered document as pretty JSON
pub fn to_json_string(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Serialize a rendered document as YAML
pub fn to_yaml_string(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Render the group hierarchy as an indented tree, in the layout of
/// `ansible-inventory --graph`
pub fn graph_tree(graph: &InventoryGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "@{}:", ALL);

    for name in graph.top_level_groups() {
        if name == ALL {
            continue;
        }
        write_group(graph, name, 1, &mut Vec::new(), &mut out);
    }

    if let Some(all) = graph.get_group(ALL) {
        for host in &all.hosts {
            let _ = writeln!(out, "  |--{}", host);
        }
    }

    out
}

fn write_group<'a>(
    graph: &'a InventoryGraph,
    name: &'a str,
    depth: usize,
    path: &mut Vec<&'a str>,
    out: &mut String,
) {
    let Some(group) = graph.get_group(name) else {
        return;
    };
    if group.name == UNGROUPED && group.is_empty() {
        return;
    }

    let indent = "  |".repeat(depth);
    let _ = writeln!(out, "{}--@{}:", indent, name);

    // Cycles are rejected during assembly; the path check only guards
    // against graphs built by hand.
    if path.contains(&name) {
        return;
    }
    path.push(name);

    for child in &group.children {
        write_group(graph, child, depth + 1, path, out);
    }

    let host_indent = "  |".repeat(depth + 1);
    for host in &group.hosts {
        let _ = writeln!(out, "{}--{}", host_indent, host);
    }

    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::HostRecord;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> InventoryGraph {
        let mut graph = InventoryGraph::new();
        for (host, group) in [("web01", "web_servers"), ("db01", "databases")] {
            let mut record = HostRecord::new(host, "prod/hosts", group);
            record.set_var("environment", "PRD");
            graph.hosts.insert(host.to_string(), record);
            graph.group_entry(group).add_host(host);
            graph.group_entry("env_prd").add_host(host);
        }
        graph.group_entry("web_servers").set_var("http_port", "80");
        graph.add_child_edge("backend", "databases");
        graph.group_entry(UNGROUPED);
        graph
    }

    #[test]
    fn test_inventory_to_json() {
        let json = inventory_to_json(&sample());

        assert_eq!(
            json["all"],
            json!({"children": ["web_servers", "env_prd", "backend"]})
        );
        assert_eq!(
            json["web_servers"],
            json!({"hosts": ["web01"], "vars": {"http_port": "80"}})
        );
        assert_eq!(json["backend"], json!({"children": ["databases"]}));
        assert_eq!(json["env_prd"]["hosts"], json!(["web01", "db01"]));
        assert_eq!(
            json["_meta"]["hostvars"]["db01"],
            json!({"environment": "PRD"})
        );
        assert!(json.get(UNGROUPED).is_none());
    }

    #[test]
    fn test_explicit_all_section_kept() {
        let mut graph = sample();
        graph.group_entry(ALL).set_var("ntp_server", "ntp.example.com");
        let json = inventory_to_json(&graph);
        assert_eq!(json["all"]["vars"], json!({"ntp_server": "ntp.example.com"}));
        assert_eq!(json["all"]["children"][0], json!("web_servers"));
    }

    #[test]
    fn test_host_vars_json() {
        let graph = sample();
        assert_eq!(host_vars_json(&graph, "web01"), json!({"environment": "PRD"}));
        assert_eq!(host_vars_json(&graph, "missing"), json!({}));
    }

    #[test]
    fn test_yaml_output() {
        let yaml = to_yaml_string(&inventory_to_json(&sample())).unwrap();
        assert!(yaml.contains("web_servers:"));
        assert!(yaml.contains("hostvars:"));
    }

    #[test]
    fn test_graph_tree() {
        let tree = graph_tree(&sample());
        let expected = "\
@all:
  |--@web_servers:
  |  |--web01
  |--@env_prd:
  |  |--web01
  |  |--db01
  |--@backend:
  |  |--@databases:
  |  |  |--db01
";
        assert_eq!(tree, expected);
    }
}
