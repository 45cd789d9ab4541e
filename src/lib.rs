// Ontoflow - Template-Driven Lifecycle Transition Engine
// This exposes the core components for embedding and integration

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod stores;
pub mod telemetry;
pub mod template;

// Re-export key types for easy access
pub use config::EngineConfig;
pub use engine::{
    ActionCall, ActionHandler, ActionRecord, ActionRegistry, ActionStatus, AuditEntry,
    EntitySnapshot, EntityStore, FnHandler, GuardFailure, TransitionContext, TransitionEngine,
    TransitionRequest, TransitionResult,
};
pub use error::{ActionError, EngineError, StoreError, TemplateError};
pub use guard::{GuardEvaluator, GuardOutcome};
pub use stores::{InMemoryEntityStore, InMemoryTemplateStore};
pub use telemetry::init_telemetry;
pub use template::{
    FsmDefinition, FsmState, FsmTemplate, FsmTransition, TemplateResolver, TemplateStore,
};
