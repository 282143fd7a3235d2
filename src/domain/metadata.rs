//! Source Metadata
//!
//! Editorial data kept apart from traced definitions: a memo and a module
//! per source, the alias registry and reviewer classifications of
//! dependency edges. Definitions pick these up at read time through
//! [`Metadata::apply_to`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::definition::{Definition, DependencyType};
use crate::domain::source_alias::SharedSourceAlias;
use crate::error::{CallweaveError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub module: Option<String>,
}

/// On-disk form of [`Metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceMetadata>,
    #[serde(default)]
    pub source_alias: BTreeMap<String, Vec<String>>,
    /// from -> to -> classification
    #[serde(default)]
    pub dependency_types: BTreeMap<String, BTreeMap<String, DependencyType>>,
    #[serde(default)]
    pub module_dependency_types: BTreeMap<String, BTreeMap<String, DependencyType>>,
}

#[derive(Debug, Default)]
pub struct Metadata {
    sources: DashMap<String, SourceMetadata>,
    source_alias: SharedSourceAlias,
    dependency_types: DashMap<(String, String), DependencyType>,
    module_dependency_types: DashMap<(String, String), DependencyType>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, source_name: &str) -> SourceMetadata {
        self.sources
            .get(source_name)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn set_memo(&self, source_name: &str, memo: &str) {
        self.sources.entry(source_name.to_string()).or_default().memo = memo.to_string();
    }

    /// `None` or a blank name clears the module.
    pub fn set_module(&self, source_name: &str, module: Option<&str>) {
        let module = module.map(str::trim).filter(|m| !m.is_empty()).map(str::to_string);
        self.sources.entry(source_name.to_string()).or_default().module = module;
    }

    pub fn source_alias(&self) -> &SharedSourceAlias {
        &self.source_alias
    }

    pub fn set_dependency_type(&self, from: &str, to: &str, dependency_type: Option<DependencyType>) {
        let key = (from.to_string(), to.to_string());
        match dependency_type {
            Some(dependency_type) => {
                self.dependency_types.insert(key, dependency_type);
            }
            None => {
                self.dependency_types.remove(&key);
            }
        }
    }

    pub fn dependency_type(&self, from: &str, to: &str) -> Option<DependencyType> {
        self.dependency_types
            .get(&(from.to_string(), to.to_string()))
            .map(|r| *r)
    }

    pub fn set_module_dependency_type(&self, from: &str, to: &str, dependency_type: Option<DependencyType>) {
        let key = (from.to_string(), to.to_string());
        match dependency_type {
            Some(dependency_type) => {
                self.module_dependency_types.insert(key, dependency_type);
            }
            None => {
                self.module_dependency_types.remove(&key);
            }
        }
    }

    pub fn module_dependency_type(&self, from: &str, to: &str) -> Option<DependencyType> {
        self.module_dependency_types
            .get(&(from.to_string(), to.to_string()))
            .map(|r| *r)
    }

    /// Copy of `definition` with editorial fields merged in. A non-empty
    /// memo and a set module override what the definition carries.
    pub fn apply_to(&self, definition: &Definition) -> Definition {
        let mut definition = definition.clone();
        for source in definition.sources_mut() {
            let Some(metadata) = self.sources.get(&source.source_name) else {
                continue;
            };
            if !metadata.memo.is_empty() {
                source.memo = metadata.memo.clone();
            }
            if metadata.module.is_some() {
                source.module = metadata.module.clone();
            }
        }
        definition
    }

    pub fn clear(&self) {
        self.sources.clear();
        self.source_alias.clear();
        self.dependency_types.clear();
        self.module_dependency_types.clear();
    }

    pub fn to_record(&self) -> MetadataRecord {
        let sources = self
            .sources
            .iter()
            .filter(|r| !r.value().memo.is_empty() || r.value().module.is_some())
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        MetadataRecord {
            sources,
            source_alias: self.source_alias.to_map(),
            dependency_types: pair_map(&self.dependency_types),
            module_dependency_types: pair_map(&self.module_dependency_types),
        }
    }

    /// Rebuild from a record. Aliases go through the usual conflict check;
    /// a conflicting alias is logged and skipped.
    pub fn from_record(record: MetadataRecord) -> Self {
        let (metadata, conflicts) = Self::build(record);
        for (alias_name, e) in conflicts {
            warn!(alias = %alias_name, error = %e, "skipping alias");
        }
        metadata
    }

    /// Rebuild from a record, failing on the first conflicting alias.
    pub fn try_from_record(record: MetadataRecord) -> Result<Self> {
        let (metadata, conflicts) = Self::build(record);
        match conflicts.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(metadata),
        }
    }

    fn build(record: MetadataRecord) -> (Self, Vec<(String, CallweaveError)>) {
        let metadata = Self::new();
        let mut conflicts = Vec::new();
        for (source_name, source) in record.sources {
            metadata.sources.insert(source_name, source);
        }
        for (alias_name, source_names) in record.source_alias {
            if let Err(e) = metadata.source_alias.set_alias(&alias_name, &source_names) {
                conflicts.push((alias_name, e));
            }
        }
        for (from, targets) in record.dependency_types {
            for (to, dependency_type) in targets {
                metadata.dependency_types.insert((from.clone(), to), dependency_type);
            }
        }
        for (from, targets) in record.module_dependency_types {
            for (to, dependency_type) in targets {
                metadata.module_dependency_types.insert((from.clone(), to), dependency_type);
            }
        }
        (metadata, conflicts)
    }

    /// Load from a TOML file for reading. A missing file is an empty
    /// registry; an unreadable one is logged and also treated as empty.
    /// Anything that will be flushed back must use [`Metadata::try_load`].
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load metadata, starting empty");
                Self::new()
            }
        }
    }

    /// Load from a TOML file. A missing file is an empty registry; a file
    /// that cannot be read or parsed, or holds conflicting aliases, is an
    /// error.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let record = read_record(path)?;
        info!(path = %path.display(), sources = record.sources.len(), "loaded metadata");
        Self::try_from_record(record)
    }

    /// Load `path` strictly, apply `edit` and write the result back. The
    /// file is left untouched when loading or the edit fails.
    pub fn edit<F>(path: &Path, edit: F) -> Result<Self>
    where
        F: FnOnce(&Metadata) -> Result<()>,
    {
        let metadata = Self::try_load(path)?;
        edit(&metadata)?;
        metadata.flush(path)?;
        Ok(metadata)
    }

    pub fn flush(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&self.to_record())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}

fn read_record(path: &Path) -> Result<MetadataRecord> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn pair_map(
    pairs: &DashMap<(String, String), DependencyType>,
) -> BTreeMap<String, BTreeMap<String, DependencyType>> {
    let mut map: BTreeMap<String, BTreeMap<String, DependencyType>> = BTreeMap::new();
    for r in pairs.iter() {
        let (from, to) = r.key();
        map.entry(from.clone()).or_default().insert(to.clone(), *r.value());
    }
    map
}
