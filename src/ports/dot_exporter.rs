//! Graphviz DOT Exporter
//!
//! Renders a CombinedGraph as a strict digraph. Sources that carry a module
//! are wrapped in `cluster_<module>` subgraphs; with `compound` set, edges
//! leaving or entering a cluster are clipped at its border and edges between
//! the same pair of clusters are drawn once.

use std::collections::{BTreeSet, HashSet};

use crate::domain::combine::{CombinedEdge, CombinedGraph, CombinedNode};
use crate::error::Result;
use crate::ports::GraphExporter;

#[derive(Debug, Default, Clone, Copy)]
pub struct DotExporter;

impl DotExporter {
    /// Convert a CombinedGraph to DOT string.
    pub fn to_dot(graph: &CombinedGraph) -> String {
        let mut lines = Vec::new();

        lines.push(format!("strict digraph \"{}\" {{", Self::escape_label(&graph.title)));
        if graph.compound {
            lines.push("  compound=true".to_string());
        }
        if graph.concentrate {
            lines.push("  concentrate=true".to_string());
        }

        for node in graph.nodes.values() {
            Self::push_node(&mut lines, node);
        }

        // (ltail, lhead) pairs already drawn between two different clusters
        let mut drawn_between_modules: HashSet<(Option<String>, Option<String>)> = HashSet::new();
        for edge in graph.edges.values() {
            let ltail = graph.node(&edge.from).and_then(|n| n.module.as_deref()).map(Self::cluster_name);
            let lhead = graph.node(&edge.to).and_then(|n| n.module.as_deref()).map(Self::cluster_name);
            Self::push_edge(&mut lines, graph.compound, edge, ltail, lhead, &mut drawn_between_modules);
        }

        lines.push("}".to_string());
        lines.join("\n") + "\n"
    }

    /// Distinct clusters in the rendered graph.
    pub fn clusters(graph: &CombinedGraph) -> BTreeSet<String> {
        graph
            .nodes
            .values()
            .filter_map(|node| node.module.as_deref())
            .map(Self::cluster_name)
            .collect()
    }

    fn push_node(lines: &mut Vec<String>, node: &CombinedNode) {
        let attributes = Self::build_attributes(&[
            ("label", Some(node.name.clone())),
            ("id", Some(node.element_id.clone())),
        ]);
        let statement = format!("\"{}\" {}", Self::escape_label(&node.name), attributes);

        match &node.module {
            Some(module) => {
                lines.push(format!(
                    "  subgraph \"{}\" {{",
                    Self::escape_label(&Self::cluster_name(module))
                ));
                lines.push(format!("    label=\"{}\" {}", Self::escape_label(module), statement));
                lines.push("  }".to_string());
            }
            None => lines.push(format!("  {}", statement)),
        }
    }

    fn push_edge(
        lines: &mut Vec<String>,
        compound: bool,
        edge: &CombinedEdge,
        ltail: Option<String>,
        lhead: Option<String>,
        drawn_between_modules: &mut HashSet<(Option<String>, Option<String>)>,
    ) {
        let mut attributes = vec![("id", Some(edge.element_id.clone()))];

        if compound && (ltail.is_some() || lhead.is_some()) {
            let between_modules = ltail != lhead;
            if between_modules && !drawn_between_modules.insert((ltail.clone(), lhead.clone())) {
                return;
            }

            attributes.push(("ltail", ltail));
            attributes.push(("lhead", lhead));
            attributes.push(("minlen", between_modules.then(|| "3".to_string())));
        }

        lines.push(format!(
            "  \"{}\" -> \"{}\" {}",
            Self::escape_label(&edge.from),
            Self::escape_label(&edge.to),
            Self::build_attributes(&attributes)
        ));
    }

    fn cluster_name(module: &str) -> String {
        format!("cluster_{}", module)
    }

    /// `[key="value" ...]`, skipping unset and empty values.
    fn build_attributes(attributes: &[(&str, Option<String>)]) -> String {
        let rendered: Vec<String> = attributes
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}=\"{}\"", key, Self::escape_label(v)))
            })
            .collect();
        format!("[{}]", rendered.join(" "))
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

impl GraphExporter for DotExporter {
    fn render(&self, graph: &CombinedGraph) -> Result<String> {
        Ok(Self::to_dot(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::combine::{combine_definitions, CombineOptions};
    use crate::domain::definition::{Definition, MethodContext};
    use crate::domain::metadata::Metadata;

    fn definition() -> Definition {
        let mut definition = Definition::new(1, "Sample \"run\"");
        for (from, to) in [("A", "B"), ("A", "C"), ("B", "C")] {
            definition
                .find_or_build_source(from)
                .find_or_build_dependency(to)
                .unwrap()
                .find_or_build_method_id("call", MethodContext::Class)
                .add_path("a.rb:1");
            definition.find_or_build_source(to);
        }
        definition
    }

    #[test]
    fn test_to_dot_plain() {
        let graph = combine_definitions(&[definition()], &Metadata::new(), &CombineOptions::default());
        let dot = DotExporter::to_dot(&graph);

        assert!(dot.starts_with("strict digraph \"Sample \\\"run\\\"\" {\n"));
        assert!(dot.contains("  \"A\" [label=\"A\" id=\"graph_1\"]"));
        assert!(dot.contains("  \"A\" -> \"B\" [id=\"graph_4\"]"));
        assert!(!dot.contains("compound=true"));
        assert!(!dot.contains("subgraph"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_to_dot_clusters_and_compound() {
        let metadata = Metadata::new();
        metadata.set_module("A", Some("Web"));
        metadata.set_module("B", Some("Web"));
        metadata.set_module("C", Some("Core"));

        let options = CombineOptions {
            compound: true,
            concentrate: true,
            ..CombineOptions::default()
        };
        let graph = combine_definitions(&[definition()], &metadata, &options);
        let dot = DotExporter::to_dot(&graph);

        assert!(dot.contains("  compound=true\n  concentrate=true"));
        assert!(dot.contains("  subgraph \"cluster_Web\" {\n    label=\"Web\" \"A\" [label=\"A\" id=\"graph_1\"]\n  }"));
        assert_eq!(
            DotExporter::clusters(&graph).into_iter().collect::<Vec<_>>(),
            vec!["cluster_Core", "cluster_Web"]
        );

        // A -> C and B -> C both cross Web -> Core; only the first is drawn
        assert!(dot.contains(
            "  \"A\" -> \"C\" [id=\"graph_5\" ltail=\"cluster_Web\" lhead=\"cluster_Core\" minlen=\"3\"]"
        ));
        assert!(!dot.contains("\"B\" -> \"C\""));
        assert!(dot.contains("  \"A\" -> \"B\" [id=\"graph_4\" ltail=\"cluster_Web\" lhead=\"cluster_Web\"]"));
    }

    #[test]
    fn test_grouped_modules_are_plain_nodes() {
        let metadata = Metadata::new();
        metadata.set_module("A", Some("Web"));
        metadata.set_module("C", Some("Core"));
        let options = CombineOptions {
            group_by_module: true,
            ..CombineOptions::default()
        };
        let graph = combine_definitions(&[definition()], &metadata, &options);
        let dot = DotExporter::to_dot(&graph);

        assert!(!dot.contains("subgraph"));
        assert!(dot.contains("\"Web\" -> \"Core\""));
        assert!(dot.contains("\"B\" -> \"Core\""));
    }
}
