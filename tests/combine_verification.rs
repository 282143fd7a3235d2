/// Combine Verification Tests
/// Stores traced definitions, merges them under editorial metadata and
/// renders the result.

use std::fs;

use tempfile::tempdir;

use callweave::application::CombineUsecase;
use callweave::domain::bit_id;
use callweave::domain::combine::{combine, CombineOptions, NodeKind};
use callweave::domain::definition::{Definition, DependencyType, MethodContext};
use callweave::domain::event::{Receiver, SourceLocation, TraceEvent};
use callweave::domain::metadata::Metadata;
use callweave::domain::store::{DefinitionStore, MemoryDefinitionStore};
use callweave::domain::tracer::{trace_events, TraceOptions};
use callweave::domain::type_registry::TypeRegistry;
use callweave::ports::dot_exporter::DotExporter;
use callweave::ports::json_exporter::JsonExporter;

/// Trace `from.run -> to.call` and return the definition.
fn traced_call(registry: &TypeRegistry, title: &str, from: &str, to: &str, line: u32) -> Definition {
    let from_id = registry.lookup(from).unwrap();
    let to_id = registry.lookup(to).unwrap();
    let entry = SourceLocation::new("main.rb", 1);
    let call_site = SourceLocation::new(&format!("{}.rb", from.to_lowercase()), line);

    let events = vec![
        TraceEvent::enter(Receiver::Type(from_id), "run", vec![entry.clone()]),
        TraceEvent::enter(Receiver::Instance(to_id), "call", vec![call_site, entry]),
        TraceEvent::exit(Receiver::Instance(to_id), "call"),
        TraceEvent::exit(Receiver::Type(from_id), "run"),
    ];
    let options = TraceOptions::new(title).with_target_modules(["A", "B", "C", "D"]);
    trace_events(registry, options, events).unwrap()
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for name in ["A", "B", "C", "D"] {
        registry.register_class(name, None);
    }
    registry
}

#[test]
fn test_disjoint_definitions_union() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    let first = store.insert_new(traced_call(&registry, "first", "A", "B", 3));
    let second = store.insert_new(traced_call(&registry, "second", "C", "D", 7));

    let graph = combine(&store, &Metadata::new(), &[first, second], &CombineOptions::default());

    assert_eq!(graph.title, "combined");
    assert_eq!(graph.titles, vec!["first", "second"]);
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 2);
    assert!(graph.edge("A", "B").is_some());
    assert!(graph.edge("C", "D").is_some());
    assert!(graph.edge("B", "C").is_none());
}

#[test]
fn test_same_edge_merges_call_sites() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    let first = store.insert_new(traced_call(&registry, "first", "A", "B", 3));
    let second = store.insert_new(traced_call(&registry, "second", "A", "B", 9));

    let graph = combine(&store, &Metadata::new(), &[first, second], &CombineOptions::default());
    let edge = graph.edge("A", "B").unwrap();
    let method_id = edge.method_ids().next().unwrap();

    assert_eq!(method_id.context, MethodContext::Instance);
    let paths: Vec<&str> = method_id.paths().iter().map(String::as_str).collect();
    assert_eq!(paths, vec!["a.rb:3", "a.rb:9"]);
    assert_eq!(graph.node("A").unwrap().titles.len(), 2);
}

#[test]
fn test_alias_merges_sources() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    let id = store.insert_new(traced_call(&registry, "alias", "A", "B", 3));

    let metadata = Metadata::new();
    metadata.source_alias().set_alias("C", ["A"]).unwrap();

    let graph = combine(&store, &metadata, &[id], &CombineOptions::default());
    assert_eq!(graph.title, "alias");
    assert!(graph.node("A").is_none());
    assert!(graph.edge("C", "B").is_some());
}

#[test]
fn test_group_by_module_with_classification() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    let ids = vec![
        store.insert_new(traced_call(&registry, "internal", "A", "B", 1)),
        store.insert_new(traced_call(&registry, "external", "B", "C", 2)),
        store.insert_new(traced_call(&registry, "loose", "C", "D", 3)),
    ];

    let metadata = Metadata::new();
    metadata.set_module("A", Some("Core"));
    metadata.set_module("B", Some("Core"));
    metadata.set_module("C", Some("Web"));
    metadata.set_module_dependency_type("Core", "Web", Some(DependencyType::Valid));

    let options = CombineOptions {
        group_by_module: true,
        ..CombineOptions::default()
    };
    let graph = combine(&store, &metadata, &ids, &options);

    assert_eq!(graph.node("Core").unwrap().kind, NodeKind::Module);
    assert_eq!(graph.node("D").unwrap().kind, NodeKind::Source);
    assert!(graph.edge("Core", "Core").is_none());

    let core_to_web = graph.edge("Core", "Web").unwrap();
    assert!(core_to_web.dependency_types.contains(&DependencyType::Valid));
    assert!(!core_to_web.has_unclassified);
    assert!(graph.edge("Web", "D").unwrap().has_unclassified);

    let only = CombineOptions {
        only_module: true,
        ..CombineOptions::default()
    };
    let graph = combine(&store, &metadata, &ids, &only);
    assert!(graph.node("D").is_none());
    assert_eq!(graph.edges.len(), 1);
}

#[test]
fn test_bit_id_selection_and_dot_export() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    store.insert_new(traced_call(&registry, "first", "A", "B", 3));
    store.insert_new(traced_call(&registry, "second", "C", "D", 7));
    let third = store.insert_new(traced_call(&registry, "third", "B", "C", 5));

    let metadata = Metadata::new();
    let exporter = DotExporter;
    let usecase = CombineUsecase {
        store: &store,
        metadata: &metadata,
        exporter: &exporter,
    };

    let dir = tempdir().unwrap();
    let output = dir.path().join("graph.dot");
    let selection = bit_id::encode(&[1, third]).unwrap();
    let graph = usecase
        .run_bit_id(&selection, &CombineOptions::default(), &output)
        .unwrap();

    assert_eq!(graph.definition_ids, vec![1, 3]);
    let dot = fs::read_to_string(&output).unwrap();
    assert!(dot.starts_with("strict digraph \"combined\" {"));
    assert!(dot.contains("\"A\" -> \"B\""));
    assert!(dot.contains("\"B\" -> \"C\""));
    assert!(!dot.contains("\"D\""));
    assert!(dot.ends_with("}\n"));
}

#[test]
fn test_json_export_carries_element_metadata() {
    let registry = registry();
    let store = MemoryDefinitionStore::new();
    store.insert_new(traced_call(&registry, "only", "A", "B", 3));

    let metadata = Metadata::new();
    metadata.set_memo("A", "entry point");
    let exporter = JsonExporter { pretty: false };
    let usecase = CombineUsecase {
        store: &store,
        metadata: &metadata,
        exporter: &exporter,
    };

    let dir = tempdir().unwrap();
    let output = dir.path().join("graph.json");
    usecase.run(&store.ids(), &CombineOptions::default(), &output).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["title"], "only");
    assert_eq!(value["bit_id"], "B");

    let elements = value["dot_metadata"].as_array().unwrap();
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0]["id"], "graph_1");
    assert_eq!(elements[0]["memos"][0], "entry point");
    assert_eq!(elements[2]["type"], "dependency");
}
