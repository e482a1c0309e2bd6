//! Entity references for the term arena.
//!
//! A [`TermId`] is a thin `u32` wrapper providing type-safe indexing into
//! the `PrimaryMap` storage owned by [`Program`](crate::Program).

use cranelift_entity::entity_impl;

/// Reference to a term in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);
entity_impl!(TermId, "t");

/// A single use of a term: which term uses it, at which operand slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: TermId,
    pub operand_index: u32,
}
