// Transition Engine - Template-Driven Lifecycle Pipeline
//
// One transition call runs: validate -> resolve template -> fetch
// snapshot -> match (from, on) -> guard selection -> optimistic commit
// -> action pipeline -> aggregate. Every pre-commit stage can
// short-circuit with a terminal error that leaves the entity untouched.

pub mod actions;
pub mod committer;
pub mod executor;
pub mod matcher;
pub mod types;
pub mod validator;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::engine::executor::ActionExecutor;
use crate::engine::matcher::Selection;
use crate::error::EngineError;
use crate::guard::GuardEvaluator;
use crate::template::TemplateResolver;

pub use actions::{ActionCall, ActionHandler, ActionRegistry, FnHandler};
pub use committer::{EntityStore, StateCommitter};
pub use types::{
    ActionRecord, ActionStatus, AuditEntry, EntitySnapshot, GuardFailure, TransitionContext,
    TransitionRequest, TransitionResult,
};

pub struct TransitionEngine {
    resolver: TemplateResolver,
    entity_store: Arc<dyn EntityStore>,
    registry: ActionRegistry,
    guards: GuardEvaluator,
    action_budget: Duration,
}

impl TransitionEngine {
    pub fn new(
        config: &EngineConfig,
        template_store: Arc<dyn crate::template::TemplateStore>,
        entity_store: Arc<dyn EntityStore>,
        registry: ActionRegistry,
    ) -> Self {
        Self {
            resolver: TemplateResolver::new(
                template_store,
                config.template_cache.max_capacity,
                Duration::from_secs(config.template_cache.ttl_seconds),
                config.template_cache.max_depth,
            ),
            entity_store,
            registry,
            guards: GuardEvaluator::new(config.guard_cache_capacity),
            action_budget: Duration::from_millis(config.action_budget_ms),
        }
    }

    /// Cache-bust hook for the (external) template editing path.
    pub async fn invalidate_template(&self, type_key: &str, scope: &str) {
        self.resolver.invalidate(type_key, scope).await;
    }

    /// Run one transition end to end. Never returns `Err`: terminal
    /// failures are folded into the `Rejected` arm so callers get one
    /// uniform shape to serialize.
    #[instrument(skip(self, context), fields(entity_id = %request.entity_id, on = %request.on))]
    pub async fn transition(
        &self,
        request: &TransitionRequest,
        context: &TransitionContext,
    ) -> TransitionResult {
        match self.run_pipeline(request, context).await {
            Ok(result) => result,
            Err(error) => {
                info!(code = error.code(), "transition rejected");
                TransitionResult::rejected(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &TransitionRequest,
        context: &TransitionContext,
    ) -> Result<TransitionResult, EngineError> {
        validator::validate(request)?;

        let snapshot = self
            .entity_store
            .snapshot(&request.entity_type, &request.entity_id)
            .await?
            .ok_or_else(|| EngineError::EntityNotFound {
                entity_type: request.entity_type.clone(),
                entity_id: request.entity_id.clone(),
            })?;

        // Per-project template overrides ride on the snapshot; entities
        // without one use the global template for their type.
        let scope_key = snapshot
            .fields
            .get("template_scope")
            .and_then(Value::as_str)
            .unwrap_or("global");
        let definition = self.resolver.resolve(&request.entity_type, scope_key).await?;

        let candidates = matcher::candidates(&definition, &snapshot.state_key, &request.on);
        if candidates.is_empty() {
            return Err(EngineError::TransitionNotFound {
                state: snapshot.state_key.clone(),
                event: request.on.clone(),
            });
        }

        let scope = guard_scope(&snapshot, context);
        let transition = match matcher::select(&candidates, &self.guards, &scope) {
            Selection::Chosen(transition) => transition,
            Selection::AllRejected(guard_failures) => {
                return Ok(TransitionResult::Rejected {
                    error: EngineError::GuardRejected {
                        state: snapshot.state_key.clone(),
                        event: request.on.clone(),
                    },
                    guard_failures,
                });
            }
        };

        let audit_recorded = if request.dry_run {
            true
        } else {
            StateCommitter::new(self.entity_store.as_ref())
                .commit(&snapshot, &transition.id, &transition.to, context)
                .await?
        };

        let actions_run = ActionExecutor::new(&self.registry, self.action_budget)
            .run(
                &transition.actions,
                &snapshot,
                context,
                request.dry_run,
                request.idempotency_key.as_deref(),
            )
            .await;

        info!(
            state_after = %transition.to,
            dry_run = request.dry_run,
            actions = actions_run.len(),
            "transition completed"
        );
        Ok(TransitionResult::Completed {
            state_after: transition.to.clone(),
            actions_run,
            audit_recorded,
        })
    }
}

/// Composes the read-only JSON scope guards evaluate against: entity
/// fields at the root, plus `state` (current state key) and an `actor`
/// object. Built fresh per request, never handed out mutably.
fn guard_scope(snapshot: &EntitySnapshot, context: &TransitionContext) -> Value {
    let mut root = match &snapshot.fields {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    root.insert("state".to_string(), Value::String(snapshot.state_key.clone()));
    root.insert(
        "actor".to_string(),
        serde_json::json!({
            "id": context.actor_id,
            "user_id": context.user_id,
        }),
    );
    Value::Object(root)
}
