//! find/list rendering: text, json, tree and dot outputs, per spec.md §6.
//!
//! None of these renderers touch a terminal — colourising the text form for an interactive
//! session is the CLI layer's job, once it has decided whether stdout is redirected.
//!

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tfx_model::{Component, ComponentKind};

use crate::queue::Queue;

/// One relative component path per line, in queue order.
///
pub fn text(queue: &Queue) -> String {
    queue
        .entries()
        .iter()
        .filter(|c| !c.flag_excluded)
        .map(|c| c.display_path().display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct ExcludeDto {
    r#if: bool,
    actions: Vec<String>,
}

#[derive(Serialize)]
struct ComponentDto {
    r#type: &'static str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reading: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude: Option<ExcludeDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<BTreeMap<String, String>>,
}

fn to_dto(component: &Component) -> ComponentDto {
    let parsed = component.parsed_config.as_ref();
    ComponentDto {
        r#type: match component.kind {
            ComponentKind::Unit => "unit",
            ComponentKind::Stack => "stack",
        },
        path: component.display_path().display().to_string(),
        dependencies: parsed
            .filter(|p| !p.dependency_paths.is_empty())
            .map(|p| p.dependency_paths.iter().map(|d| d.display().to_string()).collect()),
        reading: parsed
            .filter(|p| !p.reading.is_empty())
            .map(|p| p.reading.iter().map(|r| r.display().to_string()).collect()),
        exclude: parsed.and_then(|p| p.exclude.as_ref()).map(|e| ExcludeDto {
            r#if: e.r#if,
            actions: e.actions.iter().cloned().collect(),
        }),
        include: parsed.filter(|p| !p.include_paths.is_empty()).map(|p| {
            p.include_paths
                .iter()
                .map(|i| (i.name.clone(), i.path.display().to_string()))
                .collect()
        }),
    }
}

/// Array of `{type, path, dependencies?, reading?, exclude?, include?}`.
///
pub fn json(queue: &Queue) -> serde_json::Result<String> {
    let dtos: Vec<ComponentDto> = queue
        .entries()
        .iter()
        .filter(|c| !c.flag_excluded)
        .map(|c| to_dto(c))
        .collect();
    serde_json::to_string_pretty(&dtos)
}

pub enum GroupBy {
    Fs,
    Dag,
}

/// Unicode tree drawing, grouped either by filesystem nesting or by dependency structure.
///
pub fn tree(queue: &Queue, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Fs => tree_by_fs(queue),
        GroupBy::Dag => tree_by_dag(queue),
    }
}

#[derive(Default)]
struct FsNode {
    children: BTreeMap<String, FsNode>,
    is_component: bool,
}

fn tree_by_fs(queue: &Queue) -> String {
    let mut root = FsNode::default();
    for component in queue.entries() {
        if component.flag_excluded {
            continue;
        }
        let mut node = &mut root;
        let display = component.display_path();
        for part in display.components() {
            let key = part.as_os_str().to_string_lossy().to_string();
            node = node.children.entry(key).or_default();
        }
        node.is_component = true;
    }
    let mut out = String::new();
    render_fs_node(&root, "", &mut out);
    out.trim_end().to_string()
}

fn render_fs_node(node: &FsNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, (name, child)) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(name);
        out.push('\n');
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_fs_node(child, &child_prefix, out);
    }
}

fn tree_by_dag(queue: &Queue) -> String {
    let entries: Vec<&Component> = queue.entries().into_iter().filter(|c| !c.flag_excluded).collect();
    let mut dependents: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for component in &entries {
        for dep in &component.dependencies {
            dependents.entry(dep.clone()).or_default().push(component.path.clone());
        }
    }
    for children in dependents.values_mut() {
        children.sort();
    }

    let roots: Vec<&Component> = entries.iter().filter(|c| c.dependencies.is_empty()).copied().collect();
    let by_path: BTreeMap<&Path, &Component> = entries.iter().map(|c| (c.path.as_path(), *c)).collect();

    let mut out = String::new();
    for (i, root) in roots.iter().enumerate() {
        let last = i + 1 == roots.len();
        out.push_str(&root.display_path().display().to_string());
        out.push('\n');
        let prefix = if last { "    " } else { "│   " };
        render_dag_children(root.path.as_path(), &dependents, &by_path, prefix, &mut out);
    }
    out.trim_end().to_string()
}

fn render_dag_children(
    path: &Path,
    dependents: &BTreeMap<PathBuf, Vec<PathBuf>>,
    by_path: &BTreeMap<&Path, &Component>,
    prefix: &str,
    out: &mut String,
) {
    let Some(children) = dependents.get(path) else {
        return;
    };
    let count = children.len();
    for (i, child_path) in children.iter().enumerate() {
        let Some(component) = by_path.get(child_path.as_path()) else {
            continue;
        };
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&component.display_path().display().to_string());
        out.push('\n');
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_dag_children(child_path, dependents, by_path, &child_prefix, out);
    }
}

/// `digraph { "p1" [color=red]; "p1" -> "p2"; ... }`. Edges within each node are emitted in
/// ascending lexicographic order; excluded nodes get `[color=red]`.
///
pub fn dot(queue: &Queue) -> String {
    let mut out = String::from("digraph {\n");
    for component in queue.entries() {
        let label = component.display_path().display().to_string();
        if component.flag_excluded {
            out.push_str(&format!("  \"{label}\" [color=red];\n"));
        }
    }
    for component in queue.entries() {
        let from = component.display_path().display().to_string();
        let mut deps: Vec<&PathBuf> = component.dependencies.iter().collect();
        deps.sort();
        for dep in deps {
            let to = queue
                .components()
                .get(dep)
                .map(|d| d.display_path().display().to_string())
                .unwrap_or_else(|| dep.display().to_string());
            out.push_str(&format!("  \"{from}\" -> \"{to}\";\n"));
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tfx_model::{Component, ComponentKind, ComponentSet, ExcludePredicate, ParsedConfig};
    use std::collections::BTreeSet;

    fn unit(path: &str, deps: &[&str]) -> Component {
        let mut c = Component::new(PathBuf::from(path), ComponentKind::Unit);
        c.dependencies = deps.iter().map(PathBuf::from).collect();
        c
    }

    #[test]
    fn text_omits_excluded_components() {
        let mut u2 = unit("u2", &["u1"]);
        u2.flag_excluded = true;
        let set: ComponentSet = vec![unit("u1", &[]), u2, unit("u3", &["u2"])].into_iter().collect();
        let queue = Queue::new(set).unwrap();
        let rendered = text(&queue);
        assert_eq!(rendered, "u1\nu3");
    }

    #[test]
    fn json_includes_exclude_block() {
        let mut u1 = unit("u1", &[]);
        u1.parsed_config = Some(ParsedConfig {
            exclude: Some(ExcludePredicate::new(true, BTreeSet::from(["destroy".to_string()]))),
            ..Default::default()
        });
        let set: ComponentSet = vec![u1].into_iter().collect();
        let queue = Queue::new(set).unwrap();
        let rendered = json(&queue).unwrap();
        assert!(rendered.contains("\"exclude\""));
        assert!(rendered.contains("\"destroy\""));
    }

    #[test]
    fn dot_marks_excluded_nodes_red_and_lists_edges() {
        let mut u2 = unit("u2", &["u1"]);
        u2.flag_excluded = true;
        let set: ComponentSet = vec![unit("u1", &[]), u2].into_iter().collect();
        let queue = Queue::new(set).unwrap();
        let rendered = dot(&queue);
        assert!(rendered.contains("\"u2\" [color=red];"));
        assert!(rendered.contains("\"u2\" -> \"u1\";"));
    }
}
