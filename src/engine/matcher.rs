// Transition matching and guard selection.

use serde_json::Value;
use tracing::debug;

use crate::engine::types::GuardFailure;
use crate::guard::GuardEvaluator;
use crate::template::types::{FsmDefinition, FsmTransition};

/// All edges leaving `current_state` on `event`, in declaration order.
/// Declaration order is the tie-break for guard-bearing candidates.
pub fn candidates<'a>(
    definition: &'a FsmDefinition,
    current_state: &str,
    event: &str,
) -> Vec<&'a FsmTransition> {
    definition
        .transitions
        .iter()
        .filter(|t| t.from == current_state && t.on == event)
        .collect()
}

/// Outcome of guard selection over a non-empty candidate set.
pub enum Selection<'a> {
    /// First candidate whose guard passed (or that had no guard).
    Chosen(&'a FsmTransition),
    /// Every candidate was evaluated and rejected.
    AllRejected(Vec<GuardFailure>),
}

/// Evaluates candidate guards in declaration order and picks the first
/// passing edge. Guardless candidates always pass. Collects one
/// `GuardFailure` per rejected candidate so the caller can see exactly
/// why nothing fired.
pub fn select<'a>(
    candidates: &[&'a FsmTransition],
    evaluator: &GuardEvaluator,
    scope: &Value,
) -> Selection<'a> {
    let mut failures = Vec::new();
    for transition in candidates {
        let Some(guard) = transition.guard.as_deref() else {
            return Selection::Chosen(transition);
        };
        let outcome = evaluator.evaluate(guard, scope);
        if outcome.passed {
            return Selection::Chosen(transition);
        }
        debug!(
            transition_id = %transition.id,
            guard,
            reason = outcome.reason.as_deref().unwrap_or(""),
            "guard rejected candidate"
        );
        failures.push(GuardFailure {
            expression: guard.to_string(),
            reason: outcome
                .reason
                .unwrap_or_else(|| "guard evaluated to false".to_string()),
        });
    }
    Selection::AllRejected(failures)
}
