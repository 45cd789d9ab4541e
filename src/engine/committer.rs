// Optimistic state commitment.
//
// The entity's persisted `state_key` is the only shared mutable
// resource in the pipeline. The store's compare-and-swap is the single
// serialization point: a request that loses the race gets `Conflict`
// back, and nothing downstream (audit, actions) ever runs for it.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::engine::types::{AuditEntry, EntitySnapshot, TransitionContext};
use crate::error::{EngineError, StoreError};

/// External entity persistence. The engine needs exactly three things
/// from it: a snapshot read, a CAS write on the state key, and an
/// append-only activity log.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn snapshot(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<EntitySnapshot>, StoreError>;

    /// Atomically set the state to `new_to` iff it still equals
    /// `expected_from`. Returns whether the swap happened.
    async fn compare_and_swap_state(
        &self,
        entity_type: &str,
        entity_id: &str,
        expected_from: &str,
        new_to: &str,
    ) -> Result<bool, StoreError>;

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;
}

/// Commits a matched transition: CAS first, audit second. The audit
/// entry lands before any action fires, so the activity log always
/// reflects the state change even when actions later fail.
pub struct StateCommitter<'a> {
    store: &'a dyn EntityStore,
}

impl<'a> StateCommitter<'a> {
    pub fn new(store: &'a dyn EntityStore) -> Self {
        Self { store }
    }

    /// Returns whether the audit entry was recorded. Once the CAS has
    /// landed the state change is irrevocable, so a failed audit append
    /// degrades the result instead of erroring: reporting `Rejected`
    /// for a state that already moved would be a lie.
    pub async fn commit(
        &self,
        snapshot: &EntitySnapshot,
        transition_id: &str,
        new_to: &str,
        context: &TransitionContext,
    ) -> Result<bool, EngineError> {
        let swapped = self
            .store
            .compare_and_swap_state(
                &snapshot.entity_type,
                &snapshot.entity_id,
                &snapshot.state_key,
                new_to,
            )
            .await?;

        if !swapped {
            warn!(
                entity_id = %snapshot.entity_id,
                expected_from = %snapshot.state_key,
                "optimistic concurrency conflict, state moved underneath us"
            );
            return Err(EngineError::Conflict {
                entity_id: snapshot.entity_id.clone(),
                expected_from: snapshot.state_key.clone(),
            });
        }

        let entry = AuditEntry::new(snapshot, transition_id, new_to, context);
        let audit_recorded = match self.store.append_audit(entry).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    entity_id = %snapshot.entity_id,
                    transition_id = %transition_id,
                    error = %err,
                    "state committed but audit append failed"
                );
                false
            }
        };

        info!(
            entity_id = %snapshot.entity_id,
            from = %snapshot.state_key,
            to = %new_to,
            transition_id = %transition_id,
            actor_id = %context.actor_id,
            "state committed"
        );
        Ok(audit_recorded)
    }
}
