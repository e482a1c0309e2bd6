//! Structural consistency checks for a [`Program`].
//!
//! Every mutation primitive keeps the graph consistent, so a failure here
//! means a bug in a pass. The checks are:
//!
//! 1. Operands refer to live terms and the operation arity holds.
//! 2. Use-chains agree with the operand lists in both directions.
//! 3. Leaves resolve to an input, a constants-table entry, or a numeric
//!    raw literal.
//! 4. Stored kinds match the kinds deduced from the operands.
//! 5. Outputs and constants-table entries refer to live terms.

use std::fmt;

use smallvec::SmallVec;

use crate::program::Program;
use crate::refs::{TermId, Use};
use crate::types::{TermKind, deduce_kind};

/// A single inconsistency found by [`verify`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConsistencyError {
    /// Label of the offending term, or `None` for program-level errors.
    pub term: Option<String>,
    pub message: String,
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.term {
            Some(label) => write!(f, "`{label}`: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl fmt::Debug for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConsistencyError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        writeln!(f, "{} consistency error(s) found:", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

/// Check every structural invariant of `program`.
pub fn verify(program: &Program) -> ValidationResult {
    let mut errors = Vec::new();
    let mut report = |term: TermId, message: String| {
        errors.push(ConsistencyError {
            term: Some(program.label(term).to_owned()),
            message,
        });
    };

    for term in program.live_terms() {
        let data = program.term(term);

        if data.operands().len() != data.op().arity() {
            report(
                term,
                format!(
                    "{} expects {} operand(s), found {}",
                    data.op(),
                    data.op().arity(),
                    data.operands().len()
                ),
            );
        }

        // Forward direction: every operand slot is mirrored by a use.
        for (idx, &operand) in data.operands().iter().enumerate() {
            if !program.is_live(operand) {
                report(term, format!("operand #{idx} refers to an erased term"));
                continue;
            }
            let expected = Use {
                user: term,
                operand_index: idx as u32,
            };
            if !program.uses(operand).contains(&expected) {
                report(
                    term,
                    format!(
                        "operand #{idx} `{}` is missing from its use-chain",
                        program.label(operand)
                    ),
                );
            }
        }

        // Backward direction: every use points at a real operand slot.
        for u in program.uses(term) {
            let slot_ok = program.is_live(u.user)
                && program.operands(u.user).get(u.operand_index as usize) == Some(&term);
            if !slot_ok {
                report(
                    term,
                    format!(
                        "stale use by `{}` at operand #{}",
                        program.label(u.user),
                        u.operand_index
                    ),
                );
            }
        }

        if data.is_leaf() {
            let resolved = program.is_input(term)
                || program.constant(term).is_some()
                || (data.kind() == TermKind::RawData && program.raw_value(term).is_some());
            if !resolved {
                report(
                    term,
                    "leaf is neither an input, a constant, nor a numeric literal".to_owned(),
                );
            }
        } else if data.operands().iter().all(|&o| program.is_live(o)) {
            let kinds: SmallVec<[TermKind; 2]> =
                data.operands().iter().map(|&o| program.kind(o)).collect();
            match deduce_kind(data.op(), &kinds) {
                Ok(kind) if kind == data.kind() => {}
                Ok(kind) => report(
                    term,
                    format!("stored kind {} but operands deduce {kind}", data.kind()),
                ),
                Err(err) => report(term, err.to_string()),
            }
        }
    }

    for output in program.outputs() {
        if !program.is_live(output.term) {
            errors.push(ConsistencyError {
                term: None,
                message: format!("output `{}` refers to an erased term", output.name),
            });
        }
    }
    for (term, _) in program.constants() {
        if !program.is_live(term) || program.term(term).is_operation() {
            errors.push(ConsistencyError {
                term: None,
                message: format!("constants table entry for {term} is not a live leaf"),
            });
        }
    }

    ValidationResult { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConstantValue, OpCode};

    #[test]
    fn built_program_is_consistent() {
        let mut p = Program::new("ok");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let c = p.add_constant(None, ConstantValue::Scalar(1.0)).unwrap();
        let n = p.raw(2).unwrap();
        let a = p.insert_op(OpCode::Add, &[x, c]).unwrap();
        let r = p.insert_op(OpCode::Rotate, &[a, n]).unwrap();
        p.set_output("r", r).unwrap();

        let result = verify(&p);
        assert!(result.is_ok(), "{result}");
    }

    #[test]
    fn mutations_keep_program_consistent() {
        let mut p = Program::new("mutated");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let y = p.add_input("y", TermKind::Ciphertext).unwrap();
        let a = p.insert_op(OpCode::Add, &[x, y]).unwrap();
        let m = p.insert_op(OpCode::Mul, &[a, a]).unwrap();
        let sq = p.insert_op(OpCode::Square, &[a]).unwrap();
        p.set_output("r", m).unwrap();

        p.rewrite_with_operation(m, sq).unwrap();
        p.erase(sq).unwrap();
        p.replace_all_uses(a, x).unwrap();
        p.erase(a).unwrap();

        let result = verify(&p);
        assert!(result.is_ok(), "{result}");
        assert_eq!(p.operands(m), &[x]);
    }

    mod prop {
        use proptest::prelude::*;
        use proptest::sample::Index;

        use crate::program::Program;
        use crate::types::{OpCode, TermKind};
        use crate::validation::verify;

        const OPS: [OpCode; 5] = [
            OpCode::Add,
            OpCode::Sub,
            OpCode::Mul,
            OpCode::Square,
            OpCode::Negate,
        ];

        proptest! {
            #[test]
            fn rewiring_to_earlier_terms_keeps_program_consistent(
                steps in prop::collection::vec((0..OPS.len(), any::<Index>(), any::<Index>()), 1..20),
                rewires in prop::collection::vec((any::<Index>(), any::<Index>()), 0..8),
            ) {
                let mut p = Program::new("prop");
                let mut terms = vec![
                    p.add_input("x", TermKind::Ciphertext).unwrap(),
                    p.add_input("y", TermKind::Ciphertext).unwrap(),
                ];
                for (op, a, b) in steps {
                    let op = OPS[op];
                    let operands = [*a.get(&terms), *b.get(&terms)];
                    let term = p.insert_op(op, &operands[..op.arity()]).unwrap();
                    terms.push(term);
                }
                let last = *terms.last().unwrap();
                p.set_output("out", last).unwrap();

                // Operands are always created before their users, so an
                // earlier term can never depend on a later one
                for (old, new) in rewires {
                    let (old, new) = (*old.get(&terms), *new.get(&terms));
                    if new >= old || !p.is_live(old) || !p.is_live(new) || p.is_input(old) {
                        continue;
                    }
                    p.replace_all_uses(old, new).unwrap();
                    p.erase_unused(old);
                }

                let result = verify(&p);
                prop_assert!(result.is_ok(), "{}", result);
            }
        }
    }
}
