// Dependency definition model for Callweave.
// Sources, the dependencies between them and the call sites that prove each
// dependency. Built incrementally by the tracer, merged by the combiner.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CallweaveError;

/// Store key of a definition.
pub type DefinitionId = u64;

/// Whether a method was called on a type or on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodContext {
    Class,
    Instance,
}

impl MethodContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodContext::Class => "class",
            MethodContext::Instance => "instance",
        }
    }
}

impl fmt::Display for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodContext {
    type Err = CallweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(MethodContext::Class),
            "instance" => Ok(MethodContext::Instance),
            other => Err(CallweaveError::InvalidContext(other.to_string())),
        }
    }
}

/// Reviewer classification of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Valid,
    Invalid,
    Todo,
    Ignore,
}

/// A called method plus every call site it was observed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodId {
    pub name: String,
    pub context: MethodContext,
    paths: BTreeSet<String>,
}

impl MethodId {
    pub fn new(name: &str, context: MethodContext) -> Self {
        Self {
            name: name.to_string(),
            context,
            paths: BTreeSet::new(),
        }
    }

    pub fn add_path(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn extend_paths<I>(&mut self, paths: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
    }

    /// Sorted call sites, `file:line`.
    pub fn paths(&self) -> &BTreeSet<String> {
        &self.paths
    }

    /// `.name` for class methods, `#name` for instance methods.
    pub fn human_method_name(&self) -> String {
        let prefix = match self.context {
            MethodContext::Class => '.',
            MethodContext::Instance => '#',
        };
        format!("{}{}", prefix, self.name)
    }
}

/// Edge to another source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub source_name: String,
    pub dependency_type: Option<DependencyType>,
    method_ids: BTreeMap<(String, MethodContext), MethodId>,
}

impl Dependency {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            dependency_type: None,
            method_ids: BTreeMap::new(),
        }
    }

    pub fn find_or_build_method_id(&mut self, name: &str, context: MethodContext) -> &mut MethodId {
        self.method_ids
            .entry((name.to_string(), context))
            .or_insert_with(|| MethodId::new(name, context))
    }

    pub fn method_id(&self, name: &str, context: MethodContext) -> Option<&MethodId> {
        self.method_ids.get(&(name.to_string(), context))
    }

    /// Method ids ordered by `(name, context)`.
    pub fn method_ids(&self) -> impl Iterator<Item = &MethodId> {
        self.method_ids.values()
    }

    /// Union another copy of this edge into `self`.
    pub fn merge(&mut self, other: &Dependency) {
        for method_id in other.method_ids() {
            self.find_or_build_method_id(&method_id.name, method_id.context)
                .extend_paths(method_id.paths().iter().cloned());
        }
        if self.dependency_type.is_none() {
            self.dependency_type = other.dependency_type;
        }
    }
}

/// A traced module/class and its outgoing dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Source {
    pub source_name: String,
    pub memo: String,
    pub module: Option<String>,
    dependencies: BTreeMap<String, Dependency>,
}

impl Source {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            ..Self::default()
        }
    }

    /// `None` when `dependency_source_name` is this source: calls into
    /// yourself are not dependencies.
    pub fn find_or_build_dependency(&mut self, dependency_source_name: &str) -> Option<&mut Dependency> {
        if self.source_name == dependency_source_name {
            return None;
        }

        Some(
            self.dependencies
                .entry(dependency_source_name.to_string())
                .or_insert_with(|| Dependency::new(dependency_source_name)),
        )
    }

    pub fn dependency(&self, dependency_source_name: &str) -> Option<&Dependency> {
        self.dependencies.get(dependency_source_name)
    }

    pub fn dependency_mut(&mut self, dependency_source_name: &str) -> Option<&mut Dependency> {
        self.dependencies.get_mut(dependency_source_name)
    }

    /// Dependencies ordered by target name.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.values()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }
}

/// One traced (or imported) dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Definition {
    pub id: DefinitionId,
    pub title: String,
    pub definition_group: Option<String>,
    sources: BTreeMap<String, Source>,
}

impl Definition {
    pub fn new(id: DefinitionId, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, definition_group: Option<String>) -> Self {
        self.definition_group = definition_group;
        self
    }

    pub fn find_or_build_source(&mut self, source_name: &str) -> &mut Source {
        self.sources
            .entry(source_name.to_string())
            .or_insert_with(|| Source::new(source_name))
    }

    pub fn source(&self, source_name: &str) -> Option<&Source> {
        self.sources.get(source_name)
    }

    pub fn source_mut(&mut self, source_name: &str) -> Option<&mut Source> {
        self.sources.get_mut(source_name)
    }

    /// Sources ordered by name.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        self.sources.values_mut()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Merge definitions source by source, unioning their dependencies.
    pub fn combine<'a, I>(id: DefinitionId, title: &str, definitions: I) -> Self
    where
        I: IntoIterator<Item = &'a Definition>,
    {
        let mut combined = Definition::new(id, title);
        for definition in definitions {
            for source in definition.sources() {
                let target = combined.find_or_build_source(&source.source_name);
                if target.memo.is_empty() {
                    target.memo = source.memo.clone();
                }
                if target.module.is_none() {
                    target.module = source.module.clone();
                }
                for dependency in source.dependencies() {
                    if let Some(merged) = target.find_or_build_dependency(&dependency.source_name) {
                        merged.merge(dependency);
                    }
                }
            }
        }
        combined
    }
}
