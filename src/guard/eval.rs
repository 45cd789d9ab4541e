// Pure tree-walk evaluation of guard expressions.

use std::sync::Arc;

use moka::sync::Cache;
use serde_json::Value;
use tracing::warn;

use crate::guard::ast::{CmpOp, GuardExpr};
use crate::guard::parser;

/// Outcome of evaluating one guard against one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardOutcome {
    pub passed: bool,
    pub reason: Option<String>,
}

impl GuardOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Evaluates guard expressions against a read-only JSON scope.
///
/// Parsing is the expensive half, so parsed ASTs are cached by source
/// string. Evaluation itself never mutates the scope and never calls
/// out: an unparsable guard fails closed rather than silently passing.
pub struct GuardEvaluator {
    ast_cache: Cache<String, Arc<GuardExpr>>,
}

impl GuardEvaluator {
    pub fn new(cache_capacity: u64) -> Self {
        Self {
            ast_cache: Cache::new(cache_capacity),
        }
    }

    /// Evaluate `source` against `scope`. Blank guards always pass.
    pub fn evaluate(&self, source: &str, scope: &Value) -> GuardOutcome {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return GuardOutcome::pass();
        }

        let expr = match self.ast_cache.get(trimmed) {
            Some(cached) => cached,
            None => match parser::parse(trimmed) {
                Ok(parsed) => {
                    let parsed = Arc::new(parsed);
                    self.ast_cache
                        .insert(trimmed.to_string(), Arc::clone(&parsed));
                    parsed
                }
                Err(err) => {
                    warn!(guard = trimmed, error = %err, "guard failed to parse, failing closed");
                    return GuardOutcome::fail("GUARD_PARSE_ERROR");
                }
            },
        };

        if truthy(&eval(&expr, scope)) {
            GuardOutcome::pass()
        } else {
            GuardOutcome::fail("guard evaluated to false")
        }
    }
}

fn eval(expr: &GuardExpr, scope: &Value) -> Value {
    match expr {
        GuardExpr::Literal(value) => value.clone(),
        GuardExpr::Path(segments) => lookup(scope, segments).cloned().unwrap_or(Value::Null),
        GuardExpr::Not(inner) => Value::Bool(!truthy(&eval(inner, scope))),
        GuardExpr::And(lhs, rhs) => {
            Value::Bool(truthy(&eval(lhs, scope)) && truthy(&eval(rhs, scope)))
        }
        GuardExpr::Or(lhs, rhs) => {
            Value::Bool(truthy(&eval(lhs, scope)) || truthy(&eval(rhs, scope)))
        }
        GuardExpr::Cmp { op, lhs, rhs } => {
            Value::Bool(compare(*op, &eval(lhs, scope), &eval(rhs, scope)))
        }
    }
}

fn lookup<'a>(scope: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = scope;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Truthiness for boolean contexts: `false`, `null`, `0`, and the
/// empty string are false; everything else is true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Equality is JSON equality with numbers normalized through f64.
/// Ordering is defined for number/number and string/string pairs only;
/// any other ordering comparison is false.
fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(lhs, rhs),
        CmpOp::Ne => !values_equal(lhs, rhs),
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => match ordering(lhs, rhs) {
            Some(cmp) => match op {
                CmpOp::Gt => cmp.is_gt(),
                CmpOp::Ge => cmp.is_ge(),
                CmpOp::Lt => cmp.is_lt(),
                CmpOp::Le => cmp.is_le(),
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            },
            None => false,
        },
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn ordering(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Some(a.cmp(b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator() -> GuardEvaluator {
        GuardEvaluator::new(64)
    }

    fn scope() -> Value {
        json!({
            "props": { "word_count": 120, "title": "Q3 report", "approved": true },
            "state": "draft",
            "actor": { "id": "user-7", "user_id": "user-7" }
        })
    }

    #[test]
    fn blank_guard_passes() {
        assert!(evaluator().evaluate("", &scope()).passed);
        assert!(evaluator().evaluate("   ", &scope()).passed);
    }

    #[test]
    fn numeric_comparison() {
        let eval = evaluator();
        assert!(eval.evaluate("props.word_count > 0", &scope()).passed);
        assert!(eval.evaluate("props.word_count >= 120", &scope()).passed);
        assert!(!eval.evaluate("props.word_count > 120", &scope()).passed);
        assert!(eval.evaluate("props.word_count != 121", &scope()).passed);
    }

    #[test]
    fn string_equality_and_ordering() {
        let eval = evaluator();
        assert!(eval.evaluate("state == 'draft'", &scope()).passed);
        assert!(!eval.evaluate("state == 'in_review'", &scope()).passed);
        assert!(eval.evaluate("props.title < 'R'", &scope()).passed);
    }

    #[test]
    fn boolean_combinators() {
        let eval = evaluator();
        assert!(
            eval.evaluate("props.approved && props.word_count > 100", &scope())
                .passed
        );
        assert!(
            eval.evaluate("state == 'published' || props.approved", &scope())
                .passed
        );
        assert!(!eval.evaluate("!props.approved", &scope()).passed);
    }

    #[test]
    fn missing_path_reads_as_null() {
        let eval = evaluator();
        assert!(eval.evaluate("props.reviewer == null", &scope()).passed);
        assert!(!eval.evaluate("props.reviewer", &scope()).passed);
        // Ordering against null is false, not an error.
        assert!(!eval.evaluate("props.reviewer > 3", &scope()).passed);
    }

    #[test]
    fn mismatched_ordering_types_evaluate_false() {
        let eval = evaluator();
        assert!(!eval.evaluate("props.title > 5", &scope()).passed);
        assert!(!eval.evaluate("props.approved < 'z'", &scope()).passed);
    }

    #[test]
    fn unparsable_guard_fails_closed() {
        let outcome = evaluator().evaluate("props.word_count >", &scope());
        assert!(!outcome.passed);
        assert_eq!(outcome.reason.as_deref(), Some("GUARD_PARSE_ERROR"));
    }

    #[test]
    fn false_guard_reports_reason() {
        let outcome = evaluator().evaluate("props.word_count > 999", &scope());
        assert!(!outcome.passed);
        assert_eq!(outcome.reason.as_deref(), Some("guard evaluated to false"));
    }

    #[test]
    fn scope_is_not_mutated() {
        let before = scope();
        let after = before.clone();
        evaluator().evaluate("props.word_count > 0 && state == 'draft'", &after);
        assert_eq!(before, after);
    }

    #[test]
    fn repeated_evaluation_uses_cached_ast() {
        let eval = evaluator();
        let s = scope();
        for _ in 0..3 {
            assert!(eval.evaluate("props.word_count > 0", &s).passed);
        }
    }

    #[test]
    fn actor_fields_are_addressable() {
        assert!(
            evaluator()
                .evaluate("actor.id == 'user-7'", &scope())
                .passed
        );
    }

    #[test]
    fn integer_and_float_representations_are_equal() {
        // Parsed literals are f64; snapshot integers must still match.
        assert!(
            evaluator()
                .evaluate("props.word_count == 120", &scope())
                .passed
        );
    }
}
