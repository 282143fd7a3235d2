//! Combination Engine
//!
//! Merges stored definitions into one graph. Source names are resolved
//! through the alias registry and, optionally, collapsed into their module,
//! so several sources can land on the same node. Every node and edge gets a
//! stable element id (`graph_1`, `graph_2`, ...) that ties the rendered DOT
//! back to the metadata describing it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::domain::definition::{Definition, DefinitionId, DependencyType, MethodContext, MethodId};
use crate::domain::definition_filter::DefinitionFilter;
use crate::domain::metadata::Metadata;
use crate::domain::source_alias::SourceAlias;
use crate::domain::store::DefinitionStore;

pub const COMBINED_TITLE: &str = "combined";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombineOptions {
    /// Draw every source with a module as one node per module
    pub group_by_module: bool,
    /// Module grouping, dropping sources without a module
    pub only_module: bool,
    pub modules: Vec<String>,
    pub focus_modules: Vec<String>,
    pub remove_internal_sources: bool,
    pub compound: bool,
    pub concentrate: bool,
}

impl CombineOptions {
    fn grouped(&self) -> bool {
        self.group_by_module || self.only_module
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Source,
    Module,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedNode {
    pub name: String,
    pub kind: NodeKind,
    pub element_id: String,
    /// Cluster this node is drawn in, for ungrouped sources with a module
    pub module: Option<String>,
    pub source_names: BTreeSet<String>,
    pub memos: BTreeSet<String>,
    pub modules: BTreeSet<String>,
    pub titles: BTreeSet<String>,
}

impl CombinedNode {
    fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            element_id: String::new(),
            module: None,
            source_names: BTreeSet::new(),
            memos: BTreeSet::new(),
            modules: BTreeSet::new(),
            titles: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedEdge {
    pub from: String,
    pub to: String,
    pub element_id: String,
    method_ids: BTreeMap<(String, MethodContext), MethodId>,
    pub dependency_types: BTreeSet<DependencyType>,
    /// Some merged copy of this edge carried no classification
    pub has_unclassified: bool,
    /// Unresolved `(from, to)` source pairs folded into this edge
    pub source_pairs: BTreeSet<(String, String)>,
}

impl CombinedEdge {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            element_id: String::new(),
            method_ids: BTreeMap::new(),
            dependency_types: BTreeSet::new(),
            has_unclassified: false,
            source_pairs: BTreeSet::new(),
        }
    }

    pub fn method_ids(&self) -> impl Iterator<Item = &MethodId> {
        self.method_ids.values()
    }

    fn merge_method_id(&mut self, method_id: &MethodId) {
        self.method_ids
            .entry((method_id.name.clone(), method_id.context))
            .or_insert_with(|| MethodId::new(&method_id.name, method_id.context))
            .extend_paths(method_id.paths().iter().cloned());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodIdSummary {
    pub name: String,
    pub context: MethodContext,
    pub human_method_name: String,
    pub paths: Vec<String>,
}

impl From<&MethodId> for MethodIdSummary {
    fn from(method_id: &MethodId) -> Self {
        Self {
            name: method_id.name.clone(),
            context: method_id.context,
            human_method_name: method_id.human_method_name(),
            paths: method_id.paths().iter().cloned().collect(),
        }
    }
}

/// Per-element details handed to a renderer alongside the DOT text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DotMetadata {
    Source {
        id: String,
        source_name: String,
        source_names: Vec<String>,
        memos: Vec<String>,
        modules: Vec<String>,
        titles: Vec<String>,
    },
    Module {
        id: String,
        module_name: String,
        source_names: Vec<String>,
    },
    Dependency {
        id: String,
        from: String,
        to: String,
        dependency_types: Vec<DependencyType>,
        has_unclassified: bool,
        method_ids: Vec<MethodIdSummary>,
    },
}

impl DotMetadata {
    pub fn id(&self) -> &str {
        match self {
            DotMetadata::Source { id, .. } | DotMetadata::Module { id, .. } | DotMetadata::Dependency { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedGraph {
    pub title: String,
    pub titles: Vec<String>,
    pub definition_ids: Vec<DefinitionId>,
    pub nodes: BTreeMap<String, CombinedNode>,
    pub edges: BTreeMap<(String, String), CombinedEdge>,
    pub compound: bool,
    pub concentrate: bool,
}

impl CombinedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, name: &str) -> Option<&CombinedNode> {
        self.nodes.get(name)
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&CombinedEdge> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    /// Metadata for every element, nodes first, in element id order.
    pub fn metadata(&self) -> Vec<DotMetadata> {
        let nodes = self.nodes.values().map(|node| match node.kind {
            NodeKind::Source => DotMetadata::Source {
                id: node.element_id.clone(),
                source_name: node.name.clone(),
                source_names: node.source_names.iter().cloned().collect(),
                memos: node.memos.iter().cloned().collect(),
                modules: node.modules.iter().cloned().collect(),
                titles: node.titles.iter().cloned().collect(),
            },
            NodeKind::Module => DotMetadata::Module {
                id: node.element_id.clone(),
                module_name: node.name.clone(),
                source_names: node.source_names.iter().cloned().collect(),
            },
        });

        let edges = self.edges.values().map(|edge| DotMetadata::Dependency {
            id: edge.element_id.clone(),
            from: edge.from.clone(),
            to: edge.to.clone(),
            dependency_types: edge.dependency_types.iter().copied().collect(),
            has_unclassified: edge.has_unclassified,
            method_ids: edge.method_ids().map(MethodIdSummary::from).collect(),
        });

        nodes.chain(edges).collect()
    }

    fn assign_element_ids(&mut self) {
        let mut counter = 0usize;
        let mut next_id = || {
            counter += 1;
            format!("graph_{counter}")
        };

        for node in self.nodes.values_mut() {
            node.element_id = next_id();
        }
        for edge in self.edges.values_mut() {
            edge.element_id = next_id();
        }
    }
}

/// Where a source ends up in the combined graph.
struct Identity {
    name: String,
    kind: NodeKind,
    module: Option<String>,
}

fn identity(alias: &SourceAlias, source_name: &str, module: Option<&str>, options: &CombineOptions) -> Option<Identity> {
    match module {
        Some(module) if options.grouped() => Some(Identity {
            name: module.to_string(),
            kind: NodeKind::Module,
            module: None,
        }),
        None if options.only_module => None,
        _ => Some(Identity {
            name: alias.resolve(source_name).to_string(),
            kind: NodeKind::Source,
            module: module.map(str::to_string),
        }),
    }
}

fn module_of(definition: &Definition, metadata: &Metadata, source_name: &str) -> Option<String> {
    match definition.source(source_name) {
        Some(source) => source.module.clone(),
        None => metadata.source(source_name).module,
    }
}

/// Fetch `ids` from the store and merge them. Missing ids are skipped; no
/// matching id at all gives an empty graph.
pub fn combine(
    store: &dyn DefinitionStore,
    metadata: &Metadata,
    ids: &[DefinitionId],
    options: &CombineOptions,
) -> CombinedGraph {
    let definitions = store.get_all(ids);
    if definitions.len() != ids.len() {
        debug!(requested = ids.len(), found = definitions.len(), "some definitions were not found");
    }
    combine_definitions(&definitions, metadata, options)
}

pub fn combine_definitions(definitions: &[Definition], metadata: &Metadata, options: &CombineOptions) -> CombinedGraph {
    let alias = metadata.source_alias().snapshot();
    let filter = DefinitionFilter::new(
        options.modules.iter().cloned(),
        options.focus_modules.iter().cloned(),
        options.remove_internal_sources,
    );

    let title = match definitions {
        [definition] => definition.title.clone(),
        _ => COMBINED_TITLE.to_string(),
    };

    let mut graph = CombinedGraph {
        title,
        titles: definitions.iter().map(|d| d.title.clone()).collect(),
        definition_ids: definitions.iter().map(|d| d.id).collect(),
        compound: options.compound,
        concentrate: options.concentrate,
        ..CombinedGraph::default()
    };

    for definition in definitions {
        let definition = filter.filter(&metadata.apply_to(definition));
        merge_definition(&mut graph, &definition, &alias, metadata, options);
    }

    graph.assign_element_ids();
    debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "combined graph built");
    graph
}

fn merge_definition(
    graph: &mut CombinedGraph,
    definition: &Definition,
    alias: &SourceAlias,
    metadata: &Metadata,
    options: &CombineOptions,
) {
    for source in definition.sources() {
        let Some(from) = identity(alias, &source.source_name, source.module.as_deref(), options) else {
            continue;
        };

        let node = graph
            .nodes
            .entry(from.name.clone())
            .or_insert_with(|| CombinedNode::new(&from.name, from.kind));
        node.source_names.insert(source.source_name.clone());
        node.titles.insert(definition.title.clone());
        if !source.memo.is_empty() {
            node.memos.insert(source.memo.clone());
        }
        if let Some(module) = &source.module {
            node.modules.insert(module.clone());
        }
        if node.module.is_none() {
            node.module = from.module.clone();
        }

        for dependency in source.dependencies() {
            let to_module = module_of(definition, metadata, &dependency.source_name);
            let Some(to) = identity(alias, &dependency.source_name, to_module.as_deref(), options) else {
                continue;
            };
            if from.name == to.name {
                continue;
            }

            if !graph.nodes.contains_key(&to.name) {
                let mut node = CombinedNode::new(&to.name, to.kind);
                node.module = to.module.clone();
                node.source_names.insert(dependency.source_name.clone());
                graph.nodes.insert(to.name.clone(), node);
            }

            let classification = dependency.dependency_type.or_else(|| {
                match (from.kind, to.kind, source.module.as_deref(), to_module.as_deref()) {
                    (NodeKind::Module, NodeKind::Module, Some(from_module), Some(to_module)) => {
                        metadata.module_dependency_type(from_module, to_module)
                    }
                    _ => metadata.dependency_type(&source.source_name, &dependency.source_name),
                }
            });

            let edge = graph
                .edges
                .entry((from.name.clone(), to.name.clone()))
                .or_insert_with(|| CombinedEdge::new(&from.name, &to.name));
            for method_id in dependency.method_ids() {
                edge.merge_method_id(method_id);
            }
            match classification {
                Some(dependency_type) => {
                    edge.dependency_types.insert(dependency_type);
                }
                None => edge.has_unclassified = true,
            }
            edge.source_pairs
                .insert((source.source_name.clone(), dependency.source_name.clone()));
        }
    }
}
