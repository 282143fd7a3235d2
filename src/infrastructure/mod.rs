// Infrastructure implementations for Callweave.

pub mod concurrency;
pub mod definition_loader;
