// Core model: tracing, definitions and their combination.

pub mod bit_id;
pub mod call_stack;
pub mod combine;
pub mod definition;
pub mod definition_filter;
pub mod event;
pub mod ignored_methods;
pub mod metadata;
pub mod module_dependencies;
pub mod module_set;
pub mod source_alias;
pub mod store;
pub mod tracer;
pub mod type_registry;
