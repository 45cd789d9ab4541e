// Template Module - Data-Defined State Machines
//
// Templates describe lifecycle states and transitions as data. A
// template may extend a parent; the resolver merges the chain into one
// complete definition and caches the result.

pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::TemplateResolver;
pub use store::TemplateStore;
pub use types::{FsmDefinition, FsmState, FsmTemplate, FsmTransition, StateMetadata};
