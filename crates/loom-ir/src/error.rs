//! Error types for graph construction and mutation.

use derive_more::{Display, Error};

use crate::refs::TermId;
use crate::types::{OpCode, TermKind};

pub type IrResult<T> = Result<T, IrError>;

#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum IrError {
    #[display("label `{label}` is already used by another term")]
    DuplicateLabel { label: String },

    #[display("label `{label}` is reserved for the raw literal {label}")]
    ReservedLabel { label: String },

    #[display("{op} expects {expected} operand(s), found {found}")]
    ArityMismatch {
        op: OpCode,
        expected: usize,
        found: usize,
    },

    #[display("{op} cannot take a {kind} operand")]
    KindMismatch { op: OpCode, kind: TermKind },

    #[display("an input cannot have kind {kind}")]
    InvalidInputKind { kind: TermKind },

    #[display("term {term} has been erased")]
    ErasedTerm { term: TermId },

    #[display("`{label}` is a leaf, not an operation")]
    NotAnOperation { label: String },

    #[display("`{child}` is not an operand of `{parent}`")]
    MissingOperandSlot { parent: String, child: String },

    #[display("`{label}` still has {uses} use(s) and cannot be erased")]
    StillUsed { label: String, uses: usize },

    #[display("rewriting `{label}` with an operation that uses it would create a cycle")]
    CyclicRewrite { label: String },
}
