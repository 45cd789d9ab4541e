// Core types for the transition pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineError;

/// One transition call, as handed over by the API layer. Ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub on: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl TransitionRequest {
    pub fn new(entity_type: &str, entity_id: &str, on: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            on: on.to_string(),
            dry_run: false,
            idempotency_key: None,
        }
    }

    /// Parse a request from raw JSON. Unknown fields are rejected so a
    /// typo like `dryrun` surfaces as a validation error instead of
    /// silently running a real transition.
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        serde_json::from_value(value).map_err(|err| EngineError::Validation {
            reason: err.to_string(),
        })
    }
}

/// Who is driving the transition. Constructed per request by the
/// (out of scope) authentication layer; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub actor_id: String,
    pub user_id: String,
}

impl TransitionContext {
    pub fn new(actor_id: &str, user_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

/// Read-only view of the entity at transition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: String,
    pub entity_type: String,
    pub state_key: String,
    /// Entity fields and props, addressable from guards by dotted path.
    pub fields: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome of one action in the pipeline. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub name: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionRecord {
    pub fn success(name: &str, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: ActionStatus::Success,
            detail,
        }
    }

    pub fn failed(name: &str, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ActionStatus::Failed,
            detail: Some(detail.to_string()),
        }
    }

    pub fn skipped(name: &str, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ActionStatus::Skipped,
            detail: Some(detail.to_string()),
        }
    }
}

/// Why one guard-bearing candidate did not fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardFailure {
    pub expression: String,
    pub reason: String,
}

/// Final result of a transition call.
#[derive(Debug)]
pub enum TransitionResult {
    Completed {
        state_after: String,
        actions_run: Vec<ActionRecord>,
        /// False when the state moved but the activity log append
        /// failed. The committed state always wins over the log.
        audit_recorded: bool,
    },
    Rejected {
        error: EngineError,
        guard_failures: Vec<GuardFailure>,
    },
}

impl Serialize for TransitionResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            code: &'a str,
            message: String,
        }

        match self {
            TransitionResult::Completed {
                state_after,
                actions_run,
                audit_recorded,
            } => {
                let fields = if *audit_recorded { 3 } else { 4 };
                let mut s = serializer.serialize_struct("TransitionResult", fields)?;
                s.serialize_field("ok", &true)?;
                s.serialize_field("state_after", state_after)?;
                s.serialize_field("actions_run", actions_run)?;
                if !audit_recorded {
                    s.serialize_field("audit_recorded", &false)?;
                }
                s.end()
            }
            TransitionResult::Rejected {
                error,
                guard_failures,
            } => {
                let fields = if guard_failures.is_empty() { 2 } else { 3 };
                let mut s = serializer.serialize_struct("TransitionResult", fields)?;
                s.serialize_field("ok", &false)?;
                s.serialize_field(
                    "error",
                    &ErrorBody {
                        code: error.code(),
                        message: error.to_string(),
                    },
                )?;
                if !guard_failures.is_empty() {
                    s.serialize_field("guard_failures", guard_failures)?;
                }
                s.end()
            }
        }
    }
}

impl TransitionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransitionResult::Completed { .. })
    }

    pub fn rejected(error: EngineError) -> Self {
        TransitionResult::Rejected {
            error,
            guard_failures: Vec::new(),
        }
    }
}

/// Durable record of a committed transition, appended to the activity
/// log by the entity store before actions run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub transition_id: String,
    pub from: String,
    pub to: String,
    pub actor_id: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        snapshot: &EntitySnapshot,
        transition_id: &str,
        to: &str,
        context: &TransitionContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_type: snapshot.entity_type.clone(),
            entity_id: snapshot.entity_id.clone(),
            transition_id: transition_id.to_string(),
            from: snapshot.state_key.clone(),
            to: to.to_string(),
            actor_id: context.actor_id.clone(),
            at: Utc::now(),
        }
    }
}
