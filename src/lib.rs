//! cipherloom: a term-rewriting optimizer for homomorphic-encryption
//! circuits.
//!
//! The heavy lifting lives in the workspace crates: `loom-ir` for the
//! circuit graph, `loom-trs` for rules, rewriting and soundness checking,
//! and `loom-passes` for the cleanup passes. This crate wires them into
//! a [`pipeline`] and renders [`diagnostics`] for the CLI.

pub mod diagnostics;
pub mod pipeline;

pub use pipeline::{
    CircuitMetrics, PipelineConfig, PipelineError, PipelineReport, check_builtin_ruleset,
    optimize, optimize_source,
};
