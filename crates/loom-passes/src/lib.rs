//! Graph-level passes over loom-ir circuits.
//!
//! These passes mutate a [`Program`](loom_ir::Program) in place through its
//! use-chains: CSE canonicalizes commutative operands and merges
//! structurally identical operations, and the dead-term sweep erases
//! everything the outputs no longer depend on.

pub mod cse;
pub mod dce;

pub use cse::{CseStats, eliminate_common_subexpressions};
pub use dce::{DceResult, eliminate_dead_terms};
