use std::path::Path;

use crate::domain::combine::CombinedGraph;
use crate::error::Result;

pub mod dot_exporter;
pub mod json_exporter;

pub trait GraphExporter {
    fn render(&self, graph: &CombinedGraph) -> Result<String>;

    fn export(&self, graph: &CombinedGraph, path: &Path) -> Result<()> {
        let content = self.render(graph)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
