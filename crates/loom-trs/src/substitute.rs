//! Materializing a rule's right-hand side and rewiring the graph.

use loom_ir::{Program, TermId};
use smallvec::SmallVec;

use crate::error::SubstituteError;
use crate::eval::f64_to_raw;
use crate::matcher::MatchingMap;
use crate::pattern::{Pattern, PatternKind};

/// Replace `ir_node` by the instantiation of `rhs` under `bindings`.
///
/// Pattern nodes already bound by the LHS match reuse their IR terms, so
/// shared subexpressions are never duplicated. When the new root is an
/// operation, `ir_node` is rewritten in place and keeps its identity;
/// otherwise every use of `ir_node` is redirected to the new root.
/// Terms left without users are erased.
///
/// Returns `false` when the replacement is `ir_node` itself. On error the
/// graph is left as it was, apart from the terms created for this
/// application, which are erased again.
pub fn substitute(
    ir_node: TermId,
    bindings: &mut MatchingMap,
    rhs: &Pattern,
    program: &mut Program,
) -> Result<bool, SubstituteError> {
    let mut builder = RhsBuilder {
        program,
        target: ir_node,
        created: Vec::new(),
    };
    let (root, uses_target) = match builder.build(rhs, bindings) {
        Ok(built) => built,
        Err(err) => {
            builder.discard();
            return Err(err);
        }
    };
    if root == ir_node {
        builder.discard();
        return Ok(false);
    }

    let expected = builder.program.kind(ir_node);
    let found = builder.program.kind(root);
    if expected != found {
        builder.discard();
        return Err(SubstituteError::KindChanged { expected, found });
    }

    let program = builder.program;
    let old_operands: SmallVec<[TermId; 2]> = program.operands(ir_node).into();
    if program.term(root).is_operation() && !uses_target {
        program.rewrite_with_operation(ir_node, root)?;
        program.erase_unused(root);
    } else {
        program.replace_all_uses(ir_node, root)?;
        program.erase_unused(ir_node);
    }
    for operand in old_operands {
        program.erase_unused(operand);
    }
    Ok(true)
}

struct RhsBuilder<'p> {
    program: &'p mut Program,
    target: TermId,
    /// Terms created by this application, in creation order.
    created: Vec<TermId>,
}

impl RhsBuilder<'_> {
    /// Build `pattern`, returning its term and whether it depends on the target.
    fn build(
        &mut self,
        pattern: &Pattern,
        bindings: &mut MatchingMap,
    ) -> Result<(TermId, bool), SubstituteError> {
        if let Some(term) = bindings.get(pattern.var_id()) {
            return Ok((term, term == self.target));
        }

        if let Some(function) = pattern.function() {
            let literal = function.apply(&pattern.operands()[0], bindings, self.program)?;
            let built = self.build(&literal, bindings)?;
            bindings.bind(pattern.var_id(), built.0);
            return Ok(built);
        }

        if pattern.is_operation() {
            let mut operands: SmallVec<[TermId; 2]> = SmallVec::new();
            let mut uses_target = false;
            for sub in pattern.operands() {
                let (term, dep) = self.build(sub, bindings)?;
                operands.push(term);
                uses_target |= dep;
            }
            let term = self
                .program
                .insert_op(pattern.op_code(), &operands)
                .map_err(|source| SubstituteError::IllFormed { source })?;
            self.created.push(term);
            bindings.bind(pattern.var_id(), term);
            return Ok((term, uses_target));
        }

        let term = self.materialize_literal(pattern)?;
        bindings.bind(pattern.var_id(), term);
        Ok((term, false))
    }

    fn materialize_literal(&mut self, pattern: &Pattern) -> Result<TermId, SubstituteError> {
        let missing = || SubstituteError::MissingLiteral {
            pattern: pattern.to_string(),
        };
        let value = pattern.value().ok_or_else(missing)?;
        match pattern.kind() {
            PatternKind::Boolean => Err(missing()),
            PatternKind::Raw => {
                let v = f64_to_raw(value.as_scalar().ok_or_else(missing)?)?;
                let existed = self.program.find_by_label(&v.to_string()).is_some();
                let term = self.program.raw(v)?;
                if !existed {
                    self.created.push(term);
                }
                Ok(term)
            }
            _ => {
                let term = self.program.add_constant(None, value.clone())?;
                self.created.push(term);
                Ok(term)
            }
        }
    }

    /// Erase whatever this application created and nothing uses.
    fn discard(&mut self) {
        for &term in self.created.iter().rev() {
            self.program.erase_if_dead(term);
        }
        self.created.clear();
    }
}
