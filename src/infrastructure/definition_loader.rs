use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::api::dto::DefinitionRecord;
use crate::domain::definition::Definition;
use crate::domain::store::{DefinitionStore, MemoryDefinitionStore};
use crate::error::CallweaveError;

/// Record encodings understood by the loader, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Bincode,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(RecordFormat::Json),
            Some("bin") => Some(RecordFormat::Bincode),
            _ => None,
        }
    }
}

/// Outcome of loading one file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub definition: std::result::Result<Definition, CallweaveError>,
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: Vec<PathBuf>,
}

pub struct DefinitionLoader;

impl DefinitionLoader {
    /// Read one record file.
    pub fn load_file(path: &Path) -> std::result::Result<Definition, CallweaveError> {
        let format = RecordFormat::from_path(path)
            .ok_or_else(|| CallweaveError::UnsupportedFormat(path.to_path_buf()))?;
        let bytes = fs::read(path)?;

        let record: DefinitionRecord = match format {
            RecordFormat::Json => serde_json::from_slice(&bytes)?,
            RecordFormat::Bincode => bincode::deserialize(&bytes)?,
        };
        Definition::from_record(record)
    }

    /// Write one record file, encoding chosen by the extension of `path`.
    pub fn write_file(path: &Path, definition: &Definition) -> std::result::Result<(), CallweaveError> {
        let format = RecordFormat::from_path(path)
            .ok_or_else(|| CallweaveError::UnsupportedFormat(path.to_path_buf()))?;
        let record = definition.to_record();

        let bytes = match format {
            RecordFormat::Json => serde_json::to_vec_pretty(&record)?,
            RecordFormat::Bincode => bincode::serialize(&record)?,
        };
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Record files directly under `dir`, sorted by path.
    pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read definitions directory {}", dir.display()))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && RecordFormat::from_path(path).is_some())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load every file in parallel. Each file succeeds or fails on its own.
    pub fn load_files(paths: &[PathBuf]) -> Vec<LoadResult> {
        paths
            .par_iter()
            .map(|path| LoadResult {
                path: path.clone(),
                definition: Self::load_file(path),
            })
            .collect()
    }

    /// Load a directory into `store`. Unreadable files are logged and
    /// skipped. Definitions without an id get the next free one.
    pub fn load_dir(dir: &Path, store: &MemoryDefinitionStore) -> Result<LoadSummary> {
        let files = Self::collect_files(dir)?;
        let mut summary = LoadSummary::default();

        let mut unnumbered = Vec::new();

        // Explicit ids first, so fresh ids never collide with a later file
        for result in Self::load_files(&files) {
            match result.definition {
                Ok(definition) if definition.id == 0 => unnumbered.push(definition),
                Ok(definition) => {
                    store.put(definition);
                    summary.loaded += 1;
                }
                Err(e) => {
                    warn!(path = %result.path.display(), error = %e, "skipping definition file");
                    summary.failed.push(result.path);
                }
            }
        }
        for definition in unnumbered {
            store.insert_new(definition);
            summary.loaded += 1;
        }

        info!(
            dir = %dir.display(),
            loaded = summary.loaded,
            failed = summary.failed.len(),
            "definitions loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension() {
        let err = DefinitionLoader::load_file(Path::new("trace.yaml")).unwrap_err();
        assert!(matches!(err, CallweaveError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(RecordFormat::from_path(Path::new("a/b.json")), Some(RecordFormat::Json));
        assert_eq!(RecordFormat::from_path(Path::new("b.bin")), Some(RecordFormat::Bincode));
        assert_eq!(RecordFormat::from_path(Path::new("b")), None);
    }
}
