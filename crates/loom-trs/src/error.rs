//! Error types for evaluation, rewriting and ruleset checking.
//!
//! A pattern that does not match is not an error: matching returns `None`.
//! [`EvalError`] rejects only the rule attempt that raised it, while
//! [`RewriteError`] aborts the whole rewrite because the graph can no longer
//! be trusted.

use derive_more::{Display, Error, From};
use loom_ir::{IrError, OpCode, TermKind};

/// Failure to evaluate a condition, a side-computation or a dynamic RHS.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum EvalError {
    #[display("pattern variable `{name}` is not bound")]
    UnboundVariable { name: String },

    #[display("`{label}` has no numeric value")]
    Unresolved { label: String },

    #[display("`{op}` cannot be evaluated arithmetically")]
    UnsupportedArithmetic { op: OpCode },

    #[display("`{pattern}` is not a boolean condition")]
    UnsupportedCondition { pattern: String },

    #[display("`{pattern}` does not evaluate to a scalar")]
    NotScalar { pattern: String },

    #[display("raw literal {value} is not an integer")]
    NonIntegral { value: f64 },

    #[display("raw literal {value} is too large to evaluate exactly")]
    OutOfRange { value: String },

    #[display("vector lengths {left} and {right} differ")]
    LengthMismatch { left: usize, right: usize },

    #[display("{message}")]
    Invalid { message: String },
}

/// Failure while materializing a rule's right-hand side.
#[derive(Clone, Debug, Display, Error, From, PartialEq)]
pub enum SubstituteError {
    #[display("{_0}")]
    Eval(EvalError),

    #[display("{_0}")]
    Graph(IrError),

    /// The right-hand side builds an operation the graph refuses, such as
    /// one with ill-kinded operands.
    #[from(ignore)]
    #[display("right-hand side is ill-formed: {source}")]
    IllFormed { source: IrError },

    #[from(ignore)]
    #[display("replacement has kind {found}, matched term has kind {expected}")]
    KindChanged { expected: TermKind, found: TermKind },

    #[from(ignore)]
    #[display("right-hand side leaf `{pattern}` is neither bound nor a literal")]
    MissingLiteral { pattern: String },
}

/// Fatal rewriting failure; the program must not be used afterwards.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum RewriteError {
    #[display("rule `{rule}` broke graph consistency at `{term}`: {source}")]
    Consistency {
        rule: String,
        term: String,
        source: IrError,
    },

    #[display("rule `{rule}` cannot be applied at `{term}`: {reason}")]
    Build {
        rule: String,
        term: String,
        reason: String,
    },
}

/// Ruleset validation failure in strict mode.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum SoundnessError {
    #[display("rule `{rule}` rejected by order `{order}`: it would increase cost")]
    Rejected { rule: String, order: String },

    #[display("rule `{rule}` is unordered: every component of `{order}` reports equal")]
    Unordered { rule: String, order: String },

    #[display("unknown order `{name}`")]
    UnknownOrder { name: String },
}
