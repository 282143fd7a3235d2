//! Source Report
//!
//! Everything known about one source across the stored definitions: where
//! it appears, its editorial data and who calls it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::combine::MethodIdSummary;
use crate::domain::definition::{Dependency, DefinitionId};
use crate::domain::metadata::Metadata;
use crate::domain::store::DefinitionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedDefinition {
    pub id: DefinitionId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseDependency {
    /// Caller of the reported source
    pub source_name: String,
    pub method_ids: Vec<MethodIdSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_name: String,
    pub resolved_alias: String,
    pub memo: String,
    pub module: Option<String>,
    pub related_definitions: Vec<RelatedDefinition>,
    pub reverse_dependencies: Vec<ReverseDependency>,
}

/// `None` when no stored definition contains `source_name`.
pub fn source_report(store: &dyn DefinitionStore, metadata: &Metadata, source_name: &str) -> Option<SourceReport> {
    let mut related_definitions = Vec::new();
    let mut callers: BTreeMap<String, Dependency> = BTreeMap::new();

    for definition in store.definitions() {
        if definition.source(source_name).is_some() {
            related_definitions.push(RelatedDefinition {
                id: definition.id,
                title: definition.title.clone(),
            });
        }

        for source in definition.sources() {
            let Some(dependency) = source.dependency(source_name) else {
                continue;
            };
            callers
                .entry(source.source_name.clone())
                .or_insert_with(|| Dependency::new(source_name))
                .merge(dependency);
        }
    }

    if related_definitions.is_empty() {
        return None;
    }

    let source_metadata = metadata.source(source_name);
    let reverse_dependencies = callers
        .into_iter()
        .map(|(caller, dependency)| ReverseDependency {
            source_name: caller,
            method_ids: dependency.method_ids().map(MethodIdSummary::from).collect(),
        })
        .collect();

    Some(SourceReport {
        source_name: source_name.to_string(),
        resolved_alias: metadata.source_alias().resolve(source_name),
        memo: source_metadata.memo,
        module: source_metadata.module,
        related_definitions,
        reverse_dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::{Definition, MethodContext};
    use crate::domain::store::MemoryDefinitionStore;

    fn store() -> MemoryDefinitionStore {
        let store = MemoryDefinitionStore::new();
        for (id, caller, line) in [(1, "A", 1), (2, "A", 2), (3, "C", 3)] {
            let mut definition = Definition::new(id, &format!("def {id}"));
            definition
                .find_or_build_source(caller)
                .find_or_build_dependency("B")
                .unwrap()
                .find_or_build_method_id("call", MethodContext::Instance)
                .add_path(format!("{}.rb:{line}", caller.to_lowercase()));
            definition.find_or_build_source("B");
            store.put(definition);
        }
        store
    }

    #[test]
    fn test_reverse_dependencies_merged_per_caller() {
        let metadata = Metadata::new();
        metadata.set_memo("B", "billing");
        metadata.source_alias().set_alias("Billing", ["B"]).unwrap();

        let report = source_report(&store(), &metadata, "B").unwrap();
        assert_eq!(report.related_definitions.len(), 3);
        assert_eq!(report.resolved_alias, "Billing");
        assert_eq!(report.memo, "billing");

        let callers: Vec<&str> = report.reverse_dependencies.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(callers, vec!["A", "C"]);
        assert_eq!(report.reverse_dependencies[0].method_ids[0].paths, vec!["a.rb:1", "a.rb:2"]);
    }

    #[test]
    fn test_unknown_source() {
        assert!(source_report(&store(), &Metadata::new(), "Z").is_none());
    }
}
