// Store implementations shipped with the engine.
//
// Production deployments implement `TemplateStore` / `EntityStore`
// against their own persistence; the in-memory pair here backs tests
// and embedded use.

pub mod memory;

pub use memory::{InMemoryEntityStore, InMemoryTemplateStore};
