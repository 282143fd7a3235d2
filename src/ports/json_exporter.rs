//! JSON Exporter
//!
//! Writes the combined graph the way a viewer consumes it: DOT text, the
//! element metadata table and the bit id of the merged definitions.

use crate::api::dto::CombinedGraphDto;
use crate::domain::combine::CombinedGraph;
use crate::error::Result;
use crate::ports::GraphExporter;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter {
    pub pretty: bool,
}

impl GraphExporter for JsonExporter {
    fn render(&self, graph: &CombinedGraph) -> Result<String> {
        let dto = CombinedGraphDto::try_from(graph)?;
        let json = if self.pretty {
            serde_json::to_string_pretty(&dto)?
        } else {
            serde_json::to_string(&dto)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::combine::{combine_definitions, CombineOptions};
    use crate::domain::definition::{Definition, MethodContext};
    use crate::domain::metadata::Metadata;

    #[test]
    fn test_render_json() {
        let mut d1 = Definition::new(1, "one");
        d1.find_or_build_source("A")
            .find_or_build_dependency("B")
            .unwrap()
            .find_or_build_method_id("call", MethodContext::Class)
            .add_path("a.rb:1");
        d1.find_or_build_source("B");
        let d4 = Definition::new(4, "four");

        let graph = combine_definitions(&[d1, d4], &Metadata::new(), &CombineOptions::default());
        let json = JsonExporter::default().render(&graph).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], "combined");
        assert_eq!(value["bit_id"], "J");
        assert_eq!(value["sources"], serde_json::json!(["A", "B"]));
        assert_eq!(value["dot_metadata"][2]["type"], "dependency");
        assert_eq!(value["dot_metadata"][2]["method_ids"][0]["human_method_name"], ".call");
        assert!(value["dot"].as_str().unwrap().starts_with("strict digraph \"combined\""));
    }

    #[test]
    fn test_render_rejects_unencodable_ids() {
        let graph = combine_definitions(
            &[Definition::new(u64::MAX, "huge")],
            &Metadata::new(),
            &CombineOptions::default(),
        );
        let err = JsonExporter::default().render(&graph).unwrap_err();
        assert!(matches!(err, crate::error::CallweaveError::InvalidBitId(_)));
    }
}
