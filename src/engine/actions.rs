// Action handlers and the name -> handler registry.
//
// Actions are the pluggable side-effecting half of a transition:
// notification sends, document generation, LLM critique runs. The
// engine only knows the registry; concrete handlers live with their
// collaborators (mailer, doc store, LLM client) and are registered by
// name at startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::types::{EntitySnapshot, TransitionContext};
use crate::error::ActionError;

/// Everything a handler gets to see for one invocation.
pub struct ActionCall<'a> {
    pub snapshot: &'a EntitySnapshot,
    pub context: &'a TransitionContext,
    /// Caller-supplied token for at-least-once dedup. Handlers that
    /// enqueue external work must thread it through so a retried
    /// request does not double-fire the side effect.
    pub idempotency_key: Option<&'a str>,
}

/// One named side-effecting step. Implementations must not touch
/// entity state; the transition is already committed when they run.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the side effect. `Ok(detail)` becomes a success record,
    /// `Err` a failed record; neither aborts the pipeline.
    async fn invoke(&self, call: ActionCall<'_>) -> Result<Option<String>, ActionError>;
}

/// Static name -> handler mapping. Unregistered names degrade to a
/// failed `UNKNOWN_ACTION` record at execution time rather than being
/// rejected upfront, so template authors can stage actions ahead of
/// their handlers shipping.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(name)
    }
}

/// Adapter for registering a closure as a handler, mostly for tests
/// and small embedders.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&EntitySnapshot, &TransitionContext) -> Result<Option<String>, ActionError>
        + Send
        + Sync,
{
    async fn invoke(&self, call: ActionCall<'_>) -> Result<Option<String>, ActionError> {
        (self.0)(call.snapshot, call.context)
    }
}

impl ActionRegistry {
    /// Convenience for building a registry in one expression.
    pub fn with(mut self, name: &str, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(name, handler);
        self
    }
}

/// Pulls a dotted field out of a snapshot. Handlers reach for this
/// when composing notification payloads from entity props.
pub fn snapshot_field<'a>(snapshot: &'a EntitySnapshot, path: &str) -> Option<&'a Value> {
    let mut current = &snapshot.fields;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> EntitySnapshot {
        EntitySnapshot {
            entity_id: "doc-1".to_string(),
            entity_type: "document".to_string(),
            state_key: "draft".to_string(),
            fields: json!({ "props": { "title": "Plan", "word_count": 42 } }),
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let registry = ActionRegistry::new().with(
            "email_admin",
            Arc::new(FnHandler(
                |s: &EntitySnapshot, _: &TransitionContext| -> Result<Option<String>, ActionError> {
                    Ok(Some(format!("notified about {}", s.entity_id)))
                },
            )),
        );

        assert!(registry.get("email_admin").is_some());
        assert!(registry.get("send_carrier_pigeon").is_none());

        let snapshot = snapshot();
        let context = TransitionContext::new("svc", "user-1");
        let detail = registry
            .get("email_admin")
            .unwrap()
            .invoke(ActionCall {
                snapshot: &snapshot,
                context: &context,
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert_eq!(detail.as_deref(), Some("notified about doc-1"));
    }

    #[test]
    fn snapshot_field_walks_dotted_paths() {
        let snapshot = snapshot();
        assert_eq!(
            snapshot_field(&snapshot, "props.word_count"),
            Some(&json!(42))
        );
        assert_eq!(snapshot_field(&snapshot, "props.missing"), None);
    }
}
