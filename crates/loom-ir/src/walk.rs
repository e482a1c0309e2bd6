//! Graph traversal utilities.
//!
//! All traversals are iterative so deep circuits cannot overflow the stack.
//! Orders are deterministic: operands are visited left to right and roots
//! in the order given.

use std::ops::ControlFlow;

use cranelift_entity::EntitySet;

use crate::program::Program;
use crate::refs::TermId;

/// Terms reachable from `roots`, operands before users.
///
/// Each term appears once even when shared by several users.
pub fn post_order(program: &Program, roots: &[TermId]) -> Vec<TermId> {
    let mut visited = EntitySet::<TermId>::new();
    let mut order = Vec::new();
    // (term, index of the next operand to visit)
    let mut stack: Vec<(TermId, usize)> = Vec::new();

    for &root in roots {
        if !program.is_live(root) || visited.contains(root) {
            continue;
        }
        visited.insert(root);
        stack.push((root, 0));

        while let Some(top) = stack.last_mut() {
            let (term, next) = *top;
            let operands = program.operands(term);
            if next < operands.len() {
                top.1 += 1;
                let child = operands[next];
                if !visited.contains(child) {
                    visited.insert(child);
                    stack.push((child, 0));
                }
            } else {
                stack.pop();
                order.push(term);
            }
        }
    }
    order
}

/// All live terms, every operand before each of its users.
///
/// Roots are taken in allocation order, so unreachable terms are included.
pub fn topological_order(program: &Program) -> Vec<TermId> {
    let roots: Vec<TermId> = program.live_terms().collect();
    post_order(program, &roots)
}

/// Terms the outputs depend on.
pub fn reachable_from_outputs(program: &Program) -> EntitySet<TermId> {
    let roots: Vec<TermId> = program.outputs().iter().map(|o| o.term).collect();
    let mut set = EntitySet::new();
    for term in post_order(program, &roots) {
        set.insert(term);
    }
    set
}

/// Visit live terms in topological order until `f` breaks.
pub fn walk_terms<B>(
    program: &Program,
    f: &mut dyn FnMut(TermId) -> ControlFlow<B, ()>,
) -> ControlFlow<B, ()> {
    for term in topological_order(program) {
        f(term)?;
    }
    ControlFlow::Continue(())
}
