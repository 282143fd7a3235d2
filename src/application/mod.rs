// Use cases wiring stores, metadata and exporters together.

pub mod enumerator;
pub mod source_report;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::bit_id;
use crate::domain::combine::{combine, CombineOptions, CombinedGraph};
use crate::domain::definition::DefinitionId;
use crate::domain::metadata::Metadata;
use crate::domain::store::DefinitionStore;
use crate::ports::GraphExporter;

pub struct CombineUsecase<'a> {
    pub store: &'a dyn DefinitionStore,
    pub metadata: &'a Metadata,
    pub exporter: &'a dyn GraphExporter,
}

impl<'a> CombineUsecase<'a> {
    /// Combine `ids` and write the rendered graph to `export_path`.
    pub fn run(&self, ids: &[DefinitionId], options: &CombineOptions, export_path: &Path) -> Result<CombinedGraph> {
        let graph = combine(self.store, self.metadata, ids, options);
        self.exporter
            .export(&graph, export_path)
            .with_context(|| format!("Failed to write combined graph to {}", export_path.display()))?;

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            output = %export_path.display(),
            "combined graph exported"
        );
        Ok(graph)
    }

    /// Same as [`run`](Self::run), selecting definitions by bit id.
    pub fn run_bit_id(&self, bit_id: &str, options: &CombineOptions, export_path: &Path) -> Result<CombinedGraph> {
        let ids: Vec<DefinitionId> = bit_id::decode(bit_id)
            .with_context(|| format!("Invalid definition selection '{}'", bit_id))?
            .into_iter()
            .collect();
        self.run(&ids, options, export_path)
    }
}
