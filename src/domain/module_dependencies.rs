// Per-module view of a definition: which modules each module calls into,
// which call into it, and the source edges that cross the boundary.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::definition::{Definition, Source};
use crate::domain::metadata::Metadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDependency {
    pub module: String,
    pub module_dependencies: BTreeSet<String>,
    pub module_reverse_dependencies: BTreeSet<String>,
    /// Sources of this module, holding only their cross-module edges
    pub sources: BTreeMap<String, Source>,
    /// Sources elsewhere that call into this module. Edges carry no
    /// method ids.
    pub source_reverse_dependencies: BTreeMap<String, Source>,
}

impl ModuleDependency {
    fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            module_dependencies: BTreeSet::new(),
            module_reverse_dependencies: BTreeSet::new(),
            sources: BTreeMap::new(),
            source_reverse_dependencies: BTreeMap::new(),
        }
    }
}

pub fn module_dependencies(definition: &Definition, metadata: &Metadata) -> BTreeMap<String, ModuleDependency> {
    let module_of = |source_name: &str| metadata.source(source_name).module;
    let mut map: BTreeMap<String, ModuleDependency> = BTreeMap::new();

    for source in definition.sources() {
        let Some(source_module) = module_of(&source.source_name) else {
            continue;
        };

        map.entry(source_module.clone())
            .or_insert_with(|| ModuleDependency::new(&source_module))
            .sources
            .entry(source.source_name.clone())
            .or_insert_with(|| Source::new(&source.source_name));

        for dependency in source.dependencies() {
            let Some(dependency_module) = module_of(&dependency.source_name) else {
                continue;
            };
            if dependency_module == source_module {
                continue;
            }

            let outgoing = map
                .entry(source_module.clone())
                .or_insert_with(|| ModuleDependency::new(&source_module));
            outgoing.module_dependencies.insert(dependency_module.clone());
            if let Some(copy) = outgoing
                .sources
                .entry(source.source_name.clone())
                .or_insert_with(|| Source::new(&source.source_name))
                .find_or_build_dependency(&dependency.source_name)
            {
                copy.merge(dependency);
                copy.dependency_type = None;
            }

            let incoming = map
                .entry(dependency_module.clone())
                .or_insert_with(|| ModuleDependency::new(&dependency_module));
            incoming.module_reverse_dependencies.insert(source_module.clone());
            incoming
                .source_reverse_dependencies
                .entry(source.source_name.clone())
                .or_insert_with(|| Source::new(&source.source_name))
                .find_or_build_dependency(&dependency.source_name);
        }
    }

    map
}
