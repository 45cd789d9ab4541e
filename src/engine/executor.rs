// Ordered action pipeline execution.
//
// Ordering is a correctness requirement: a document-creation action
// may be referenced by a notification action later in the same list,
// so actions run strictly sequentially and are never parallelized.
// Failures are recorded and execution continues; the committed state
// is never rolled back from here.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::engine::actions::{ActionCall, ActionRegistry};
use crate::engine::types::{ActionRecord, EntitySnapshot, TransitionContext};

pub struct ActionExecutor<'a> {
    registry: &'a ActionRegistry,
    /// Wall-clock budget for the whole pipeline of one transition.
    budget: Duration,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(registry: &'a ActionRegistry, budget: Duration) -> Self {
        Self { registry, budget }
    }

    pub async fn run(
        &self,
        actions: &[String],
        snapshot: &EntitySnapshot,
        context: &TransitionContext,
        dry_run: bool,
        idempotency_key: Option<&str>,
    ) -> Vec<ActionRecord> {
        let mut records = Vec::with_capacity(actions.len());

        if dry_run {
            // No handler is invoked at all in dry-run mode, which is
            // the only way to guarantee zero external side effects
            // without trusting every handler to honor a flag.
            for name in actions {
                records.push(ActionRecord::skipped(name, "DRY_RUN"));
            }
            return records;
        }

        let deadline = Instant::now() + self.budget;
        let mut timed_out = false;

        for name in actions {
            if timed_out {
                records.push(ActionRecord::skipped(name, "TIMEOUT"));
                continue;
            }

            let Some(handler) = self.registry.get(name) else {
                warn!(action = %name, "no handler registered for action");
                records.push(ActionRecord::failed(name, "UNKNOWN_ACTION"));
                continue;
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            let call = ActionCall {
                snapshot,
                context,
                idempotency_key,
            };
            let record = match tokio::time::timeout(remaining, handler.invoke(call)).await {
                Ok(Ok(detail)) => ActionRecord::success(name, detail),
                Ok(Err(err)) => {
                    warn!(action = %name, error = %err, "action failed");
                    ActionRecord::failed(name, &err.to_string())
                }
                Err(_) => {
                    warn!(action = %name, budget_ms = self.budget.as_millis() as u64,
                        "action exceeded pipeline budget");
                    timed_out = true;
                    ActionRecord::failed(name, "TIMEOUT")
                }
            };
            records.push(record);
        }

        info!(
            entity_id = %snapshot.entity_id,
            total = records.len(),
            failed = records.iter().filter(|r| r.status == crate::engine::types::ActionStatus::Failed).count(),
            "action pipeline finished"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::engine::actions::{ActionHandler, FnHandler};
    use crate::engine::types::ActionStatus;
    use crate::error::ActionError;

    fn snapshot() -> EntitySnapshot {
        EntitySnapshot {
            entity_id: "doc-1".to_string(),
            entity_type: "document".to_string(),
            state_key: "in_review".to_string(),
            fields: json!({}),
        }
    }

    fn context() -> TransitionContext {
        TransitionContext::new("svc", "user-1")
    }

    fn ok_handler(detail: &'static str) -> Arc<dyn ActionHandler> {
        Arc::new(FnHandler(
            move |_: &EntitySnapshot, _: &TransitionContext| -> Result<Option<String>, ActionError> {
                Ok(Some(detail.to_string()))
            },
        ))
    }

    struct SlowHandler(Duration);

    #[async_trait]
    impl ActionHandler for SlowHandler {
        async fn invoke(&self, _call: ActionCall<'_>) -> Result<Option<String>, ActionError> {
            tokio::time::sleep(self.0).await;
            Ok(None)
        }
    }

    /// Counts invocations and dedups on the idempotency key.
    struct CountingHandler {
        fired: AtomicU32,
        seen_keys: std::sync::Mutex<std::collections::HashSet<String>>,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                fired: AtomicU32::new(0),
                seen_keys: std::sync::Mutex::new(std::collections::HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl ActionHandler for CountingHandler {
        async fn invoke(&self, call: ActionCall<'_>) -> Result<Option<String>, ActionError> {
            if let Some(key) = call.idempotency_key {
                let mut seen = self.seen_keys.lock().unwrap();
                if !seen.insert(key.to_string()) {
                    return Ok(Some("duplicate suppressed".to_string()));
                }
            }
            self.fired.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn records_follow_declaration_order() {
        let registry = ActionRegistry::new()
            .with("create_research_doc", ok_handler("doc created"))
            .with("email_admin", ok_handler("admin notified"))
            .with("email_user", ok_handler("user notified"));

        let actions = vec![
            "email_user".to_string(),
            "create_research_doc".to_string(),
            "email_admin".to_string(),
        ];
        let records = ActionExecutor::new(&registry, Duration::from_secs(5))
            .run(&actions, &snapshot(), &context(), false, None)
            .await;

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, actions.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(records.iter().all(|r| r.status == ActionStatus::Success));
    }

    #[tokio::test]
    async fn unknown_action_fails_but_pipeline_continues() {
        let registry = ActionRegistry::new().with("email_admin", ok_handler("sent"));

        let actions = vec![
            "send_carrier_pigeon".to_string(),
            "email_admin".to_string(),
        ];
        let records = ActionExecutor::new(&registry, Duration::from_secs(5))
            .run(&actions, &snapshot(), &context(), false, None)
            .await;

        assert_eq!(records[0].status, ActionStatus::Failed);
        assert_eq!(records[0].detail.as_deref(), Some("UNKNOWN_ACTION"));
        assert_eq!(records[1].status, ActionStatus::Success);
    }

    #[tokio::test]
    async fn handler_error_does_not_abort_pipeline() {
        let registry = ActionRegistry::new()
            .with(
                "run_llm_critique",
                Arc::new(FnHandler(
                    |_: &EntitySnapshot, _: &TransitionContext| -> Result<Option<String>, ActionError> {
                        Err(ActionError::Downstream {
                            message: "provider 503".to_string(),
                        })
                    },
                )),
            )
            .with("email_user", ok_handler("sent"));

        let actions = vec!["run_llm_critique".to_string(), "email_user".to_string()];
        let records = ActionExecutor::new(&registry, Duration::from_secs(5))
            .run(&actions, &snapshot(), &context(), false, None)
            .await;

        assert_eq!(records[0].status, ActionStatus::Failed);
        assert_eq!(records[1].status, ActionStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_overrun_fails_action_and_skips_remainder() {
        let registry = ActionRegistry::new()
            .with("email_admin", ok_handler("sent"))
            .with(
                "run_llm_critique",
                Arc::new(SlowHandler(Duration::from_secs(60))),
            )
            .with("email_user", ok_handler("sent"));

        let actions = vec![
            "email_admin".to_string(),
            "run_llm_critique".to_string(),
            "email_user".to_string(),
        ];
        let records = ActionExecutor::new(&registry, Duration::from_millis(100))
            .run(&actions, &snapshot(), &context(), false, None)
            .await;

        assert_eq!(records[0].status, ActionStatus::Success);
        assert_eq!(records[1].status, ActionStatus::Failed);
        assert_eq!(records[1].detail.as_deref(), Some("TIMEOUT"));
        assert_eq!(records[2].status, ActionStatus::Skipped);
        assert_eq!(records[2].detail.as_deref(), Some("TIMEOUT"));
    }

    #[tokio::test]
    async fn dry_run_synthesizes_skipped_records_without_invoking() {
        let counter = Arc::new(CountingHandler::new());
        let registry = ActionRegistry::new().with("email_user", counter.clone());

        let actions = vec!["email_user".to_string(), "not_even_registered".to_string()];
        let records = ActionExecutor::new(&registry, Duration::from_secs(5))
            .run(&actions, &snapshot(), &context(), true, None)
            .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == ActionStatus::Skipped));
        assert!(records
            .iter()
            .all(|r| r.detail.as_deref() == Some("DRY_RUN")));
        assert_eq!(counter.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn idempotency_key_dedups_repeat_invocations() {
        let counter = Arc::new(CountingHandler::new());
        let registry = ActionRegistry::new().with("email_user", counter.clone());
        let executor = ActionExecutor::new(&registry, Duration::from_secs(5));

        let actions = vec!["email_user".to_string()];
        for _ in 0..3 {
            executor
                .run(&actions, &snapshot(), &context(), false, Some("req-42"))
                .await;
        }

        assert_eq!(counter.fired.load(Ordering::SeqCst), 1);
    }
}
