//! Dead-term sweep.
//!
//! Erases every live term the outputs do not depend on. Declared inputs
//! are kept even when unused, since they are part of the circuit's
//! interface.

use loom_ir::{Program, walk};

/// Result of a dead-term sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DceResult {
    /// Number of terms erased.
    pub removed_count: usize,
}

pub fn eliminate_dead_terms(program: &mut Program) -> DceResult {
    let reachable = walk::reachable_from_outputs(program);
    let mut removed_count = 0;

    // Users before operands, so every dead term is unused when reached
    for term in walk::topological_order(program).into_iter().rev() {
        if reachable.contains(term) {
            continue;
        }
        if program.erase_if_dead(term) {
            removed_count += 1;
        }
    }

    tracing::debug!(removed = removed_count, "dead terms erased");
    DceResult { removed_count }
}
