// Error taxonomy for the transition engine.
//
// Only the pre-commit variants of `EngineError` can prevent a state
// write. Everything that goes wrong inside the action pipeline is
// captured as an `ActionRecord` and never surfaces as an error.

use thiserror::Error;

/// Errors from external collaborator I/O (template store, entity store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("store query failed: {message}")]
    QueryFailed { message: String },
}

/// Errors raised while resolving a template into an `FsmDefinition`.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template for type '{type_key}' in scope '{scope}'")]
    NotFound { type_key: String, scope: String },
    #[error("cyclic template ancestry at '{template_id}'")]
    Cyclic { template_id: String },
    #[error("template chain exceeds max depth {max_depth}")]
    DepthExceeded { max_depth: usize },
    #[error("invalid definition: {reason}")]
    InvalidDefinition { reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Terminal errors for a transition request. Any of these guarantees
/// the entity state was left unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid transition request: {reason}")]
    Validation { reason: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("entity '{entity_id}' of type '{entity_type}' not found")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },
    #[error("no transition from state '{state}' on event '{event}'")]
    TransitionNotFound { state: String, event: String },
    #[error("all guard candidates rejected event '{event}' from state '{state}'")]
    GuardRejected { state: String, event: String },
    #[error("state of '{entity_id}' no longer '{expected_from}', transition lost the race")]
    Conflict {
        entity_id: String,
        expected_from: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error returned by an action handler. Converted into a failed
/// `ActionRecord` by the executor, never propagated.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error("downstream collaborator error: {message}")]
    Downstream { message: String },
}

impl EngineError {
    /// Whether a caller can retry the same request after refetching the
    /// entity. Only optimistic-concurrency losses qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    /// Stable machine-readable code, used in serialized results.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::Template(TemplateError::NotFound { .. }) => "TEMPLATE_NOT_FOUND",
            EngineError::Template(TemplateError::Cyclic { .. }) => "CYCLIC_TEMPLATE",
            EngineError::Template(TemplateError::DepthExceeded { .. }) => "CYCLIC_TEMPLATE",
            EngineError::Template(TemplateError::InvalidDefinition { .. }) => "INVALID_TEMPLATE",
            EngineError::Template(TemplateError::Store(_)) => "STORE_ERROR",
            EngineError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            EngineError::TransitionNotFound { .. } => "TRANSITION_NOT_FOUND",
            EngineError::GuardRejected { .. } => "GUARD_REJECTED",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }
}
