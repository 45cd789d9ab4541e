// Guard expression AST
//
// Guards are restricted on purpose: field lookups, literals, the six
// comparison operators, boolean combinators, grouping. No calls, no
// assignment, no user-defined anything. The evaluator is a pure tree
// walk, so a guard can never execute code or mutate its inputs.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    /// String/number/boolean/null literal.
    Literal(Value),
    /// Dotted field lookup, e.g. `props.word_count`.
    Path(Vec<String>),
    Not(Box<GuardExpr>),
    And(Box<GuardExpr>, Box<GuardExpr>),
    Or(Box<GuardExpr>, Box<GuardExpr>),
    Cmp {
        op: CmpOp,
        lhs: Box<GuardExpr>,
        rhs: Box<GuardExpr>,
    },
}
