//! Dataflow IR for encrypted arithmetic circuits.
//!
//! A circuit is a DAG of terms owned by a [`Program`]. Leaves are inputs,
//! constants (backed by the constants table) and raw numeric literals;
//! every other term applies an [`OpCode`] to an ordered list of operands.
//! Terms live in a `cranelift-entity` arena and keep explicit use-chains,
//! which makes in-place rewriting and replace-all-uses cheap.

pub mod analysis;
pub mod error;
pub mod parser;
pub mod printer;
pub mod program;
pub mod refs;
pub mod types;
pub mod validation;
pub mod walk;

// Re-export smallvec for downstream crates
pub use smallvec;

pub use error::{IrError, IrResult};
pub use parser::{ParseError, parse_circuit};
pub use printer::print_program;
pub use program::{Output, Program, TermData};
pub use refs::{TermId, Use};
pub use types::{ConstantValue, OpCode, TermKind, deduce_kind};
pub use validation::{ConsistencyError, ValidationResult, verify};
