use serde::{Deserialize, Serialize};

use crate::domain::bit_id;
use crate::domain::combine::{CombinedGraph, DotMetadata};
use crate::domain::definition::{Definition, DefinitionId, DependencyType, MethodContext};
use crate::error::{CallweaveError, Result};
use crate::ports::dot_exporter::DotExporter;

// Persisted definition records. Stored as JSON or bincode, so optional
// fields are always written (bincode cannot skip fields).

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    #[serde(default)]
    pub id: DefinitionId,
    pub title: String,
    #[serde(default)]
    pub definition_group: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_name: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub source_name: String,
    #[serde(default)]
    pub dependency_type: Option<DependencyType>,
    #[serde(default)]
    pub method_ids: Vec<MethodIdRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIdRecord {
    pub name: String,
    pub context: MethodContext,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl From<&Definition> for DefinitionRecord {
    fn from(definition: &Definition) -> Self {
        let sources = definition
            .sources()
            .map(|source| SourceRecord {
                source_name: source.source_name.clone(),
                memo: source.memo.clone(),
                module: source.module.clone(),
                dependencies: source
                    .dependencies()
                    .map(|dependency| DependencyRecord {
                        source_name: dependency.source_name.clone(),
                        dependency_type: dependency.dependency_type,
                        method_ids: dependency
                            .method_ids()
                            .map(|method_id| MethodIdRecord {
                                name: method_id.name.clone(),
                                context: method_id.context,
                                paths: method_id.paths().iter().cloned().collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        DefinitionRecord {
            id: definition.id,
            title: definition.title.clone(),
            definition_group: definition.definition_group.clone(),
            sources,
        }
    }
}

impl TryFrom<DefinitionRecord> for Definition {
    type Error = CallweaveError;

    fn try_from(record: DefinitionRecord) -> Result<Self> {
        if record.id > bit_id::MAX_ID {
            return Err(CallweaveError::MalformedRecord(format!(
                "definition '{}' has id {} above the limit of {}",
                record.title,
                record.id,
                bit_id::MAX_ID
            )));
        }

        let mut definition = Definition::new(record.id, &record.title).with_group(record.definition_group);

        for source_record in record.sources {
            if source_record.source_name.trim().is_empty() {
                return Err(CallweaveError::MalformedRecord(format!(
                    "definition '{}' has a source without a name",
                    record.title
                )));
            }

            let source = definition.find_or_build_source(&source_record.source_name);
            source.memo = source_record.memo;
            source.module = source_record.module;

            for dependency_record in source_record.dependencies {
                let Some(dependency) = source.find_or_build_dependency(&dependency_record.source_name) else {
                    return Err(CallweaveError::MalformedRecord(format!(
                        "source '{}' depends on itself",
                        source_record.source_name
                    )));
                };
                if dependency.dependency_type.is_none() {
                    dependency.dependency_type = dependency_record.dependency_type;
                }

                for method_id_record in dependency_record.method_ids {
                    dependency
                        .find_or_build_method_id(&method_id_record.name, method_id_record.context)
                        .extend_paths(method_id_record.paths);
                }
            }
        }

        Ok(definition)
    }
}

impl Definition {
    pub fn to_record(&self) -> DefinitionRecord {
        DefinitionRecord::from(self)
    }

    pub fn from_record(record: DefinitionRecord) -> Result<Self> {
        Definition::try_from(record)
    }
}

/// Combined graph as handed to a viewer: the DOT text plus the metadata of
/// every element id in it.
#[derive(Debug, Serialize)]
pub struct CombinedGraphDto {
    pub title: String,
    pub titles: Vec<String>,
    pub bit_id: String,
    pub dot: String,
    pub dot_metadata: Vec<DotMetadata>,
    pub sources: Vec<String>,
}

impl TryFrom<&CombinedGraph> for CombinedGraphDto {
    type Error = CallweaveError;

    fn try_from(graph: &CombinedGraph) -> Result<Self> {
        let sources = graph
            .nodes
            .values()
            .flat_map(|node| node.source_names.iter().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(CombinedGraphDto {
            title: graph.title.clone(),
            titles: graph.titles.clone(),
            bit_id: bit_id::encode(&graph.definition_ids)?,
            dot: DotExporter::to_dot(graph),
            dot_metadata: graph.metadata(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> Definition {
        let mut definition = Definition::new(7, "record").with_group(Some("web".to_string()));
        let a = definition.find_or_build_source("A");
        a.memo = "entry".to_string();
        a.module = Some("Web".to_string());
        let dependency = a.find_or_build_dependency("B").unwrap();
        dependency.dependency_type = Some(DependencyType::Valid);
        dependency
            .find_or_build_method_id("call", MethodContext::Instance)
            .add_path("a.rb:3");
        definition.find_or_build_source("B");
        definition
    }

    #[test]
    fn test_record_round_trip() {
        let definition = definition();
        assert_eq!(Definition::from_record(definition.to_record()).unwrap(), definition);
    }

    #[test]
    fn test_absent_fields_default() {
        let json = r#"{"title":"t","sources":[{"source_name":"A","dependencies":[{"source_name":"B","method_ids":[{"name":"m","context":"class"}]}]}]}"#;
        let record: DefinitionRecord = serde_json::from_str(json).unwrap();
        let definition = Definition::from_record(record).unwrap();

        let a = definition.source("A").unwrap();
        assert_eq!(a.memo, "");
        assert!(a.module.is_none());
        assert!(definition.definition_group.is_none());
        assert!(a.dependency("B").and_then(|d| d.method_id("m", MethodContext::Class)).is_some());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let json = r#"{"title":"t","sources":[{"source_name":"A","dependencies":[{"source_name":"A"}]}]}"#;
        let record: DefinitionRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(
            Definition::from_record(record),
            Err(CallweaveError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_id_above_bit_id_limit_rejected() {
        let json = format!(r#"{{"id":{},"title":"huge","sources":[]}}"#, u64::MAX);
        let record: DefinitionRecord = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            Definition::from_record(record),
            Err(CallweaveError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_bincode_record() {
        let record = definition().to_record();
        let bytes = bincode::serialize(&record).unwrap();
        let decoded: DefinitionRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
