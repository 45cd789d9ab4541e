// Guard Expressions - Sandboxed Transition Predicates
//
// A guard is a string attached to a transition edge, parsed into a
// small boolean AST and evaluated purely against the entity snapshot
// and actor context. There is deliberately no escape hatch into real
// code: the operator set is fixed and unparsable guards fail closed.

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::{CmpOp, GuardExpr};
pub use eval::{GuardEvaluator, GuardOutcome};
pub use parser::ParseError;
