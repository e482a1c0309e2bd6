//! Common-subexpression elimination.
//!
//! Terms are visited operands first. A commutative operation has its
//! operands sorted by [`TermId`]; then every operation is looked up by
//! `(opcode, operands)` and, when an identical one was seen before, all of
//! its uses are moved to that earlier term and it is erased.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use loom_ir::{IrResult, OpCode, Program, TermId, walk};
use smallvec::SmallVec;

/// Result of a CSE run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CseStats {
    /// Commutative operations whose operands were reordered.
    pub reordered: usize,
    /// Operations replaced by an identical earlier one.
    pub merged: usize,
}

impl CseStats {
    pub fn changed(&self) -> bool {
        self.reordered + self.merged > 0
    }
}

type Key = (OpCode, SmallVec<[TermId; 2]>);

/// Run CSE over every live term of `program`.
pub fn eliminate_common_subexpressions(program: &mut Program) -> IrResult<CseStats> {
    let mut stats = CseStats::default();
    let mut canonical: HashMap<Key, TermId> = HashMap::new();

    for term in walk::topological_order(program) {
        if !program.is_live(term) || program.term(term).is_leaf() {
            continue;
        }
        let op = program.op(term);
        let mut operands: SmallVec<[TermId; 2]> = program.operands(term).into();

        // Reordering is only sound for commutative operations
        if op.is_commutative() && !operands.is_sorted() {
            operands.sort_unstable();
            program.set_operands(term, &operands)?;
            stats.reordered += 1;
        }

        match canonical.entry((op, operands)) {
            Entry::Occupied(existing) => {
                let replacement = *existing.get();
                program.replace_all_uses(term, replacement)?;
                program.erase_unused(term);
                stats.merged += 1;
                tracing::trace!(
                    term = %program.label(replacement),
                    "merged duplicate operation"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(term);
            }
        }
    }

    tracing::debug!(
        reordered = stats.reordered,
        merged = stats.merged,
        "common subexpressions eliminated"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_ir::parser::parse_test_circuit;
    use loom_ir::{print_program, verify};
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn commuted_duplicates_are_merged() {
        let mut program = parse_test_circuit(
            r#"circuit @c {
  %x = input cipher
  %y = input cipher
  %a = add %y, %x
  %b = add %x, %y
  %p = mul %a, %b
  output %p as "p"
}
"#,
        );
        let stats = eliminate_common_subexpressions(&mut program).unwrap();
        assert_eq!(stats, CseStats { reordered: 1, merged: 1 });
        assert!(verify(&program).is_ok());

        let a = program.find_by_label("a").unwrap();
        let p = program.find_by_label("p").unwrap();
        assert_eq!(program.operands(p), &[a, a]);
        assert!(program.find_by_label("b").is_none());
    }

    #[test]
    fn non_commutative_operands_keep_their_order() {
        let mut program = parse_test_circuit(
            r#"circuit @n {
  %x = input cipher
  %y = input cipher
  %a = sub %y, %x
  %b = sub %x, %y
  %r = rotate %y, 1
  output %a as "a"
  output %b as "b"
  output %r as "r"
}
"#,
        );
        let before = print_program(&program);
        let stats = eliminate_common_subexpressions(&mut program).unwrap();
        assert!(!stats.changed());
        assert_eq!(print_program(&program), before);
    }

    #[test]
    fn merging_cascades_to_users() {
        let mut program = parse_test_circuit(
            r#"circuit @m {
  %x = input cipher
  %a = square %x
  %b = square %x
  %c = negate %a
  %d = negate %b
  output %c as "c"
  output %d as "d"
}
"#,
        );
        let stats = eliminate_common_subexpressions(&mut program).unwrap();
        assert_eq!(stats.merged, 2);
        let c = program.find_by_label("c").unwrap();
        assert!(program.outputs().iter().all(|o| o.term == c));
        assert!(verify(&program).is_ok());
    }

    fn arb_circuit() -> impl Strategy<Value = Program> {
        let op = prop_oneof![
            Just("add"),
            Just("mul"),
            Just("sub"),
            Just("square"),
            Just("negate"),
        ];
        prop::collection::vec((op, any::<prop::sample::Index>(), any::<prop::sample::Index>()), 1..24)
            .prop_map(|steps| {
                let mut text = String::from("circuit @gen {\n  %i0 = input cipher\n  %i1 = input cipher\n");
                let mut names = vec!["i0".to_owned(), "i1".to_owned()];
                for (n, (op, a, b)) in steps.into_iter().enumerate() {
                    let lhs = a.get(&names).clone();
                    let rhs = b.get(&names).clone();
                    let name = format!("t{n}");
                    if matches!(op, "square" | "negate") {
                        text.push_str(&format!("  %{name} = {op} %{lhs}\n"));
                    } else {
                        text.push_str(&format!("  %{name} = {op} %{lhs}, %{rhs}\n"));
                    }
                    names.push(name);
                }
                let last = names.last().cloned().unwrap_or_default();
                text.push_str(&format!("  output %{last} as \"out\"\n}}\n"));
                parse_test_circuit(&text)
            })
    }

    /// Interpret a generated circuit over wrapping integers, by label.
    fn evaluate(program: &Program, inputs: (i64, i64)) -> HashMap<String, i64> {
        let mut values: HashMap<TermId, i64> = HashMap::new();
        for term in walk::topological_order(program) {
            let value = if program.term(term).is_leaf() {
                match program.label(term) {
                    "i0" => inputs.0,
                    _ => inputs.1,
                }
            } else {
                let args: Vec<i64> = program.operands(term).iter().map(|o| values[o]).collect();
                match program.op(term) {
                    OpCode::Add => args[0].wrapping_add(args[1]),
                    OpCode::Sub => args[0].wrapping_sub(args[1]),
                    OpCode::Mul => args[0].wrapping_mul(args[1]),
                    OpCode::Square => args[0].wrapping_mul(args[0]),
                    OpCode::Negate => args[0].wrapping_neg(),
                    op => panic!("unexpected operation {op:?}"),
                }
            };
            values.insert(term, value);
        }
        values
            .into_iter()
            .map(|(term, value)| (program.label(term).to_owned(), value))
            .collect()
    }

    proptest! {
        #[test]
        fn cse_is_idempotent(mut program in arb_circuit()) {
            eliminate_common_subexpressions(&mut program).unwrap();
            let once = print_program(&program);
            let again = eliminate_common_subexpressions(&mut program).unwrap();
            prop_assert!(!again.changed());
            prop_assert_eq!(print_program(&program), once);
            prop_assert!(verify(&program).is_ok());
        }

        #[test]
        fn cse_canonicalizes_without_changing_values(
            mut program in arb_circuit(),
            inputs in (any::<i64>(), any::<i64>()),
        ) {
            let before = evaluate(&program, inputs);
            eliminate_common_subexpressions(&mut program).unwrap();
            let after = evaluate(&program, inputs);
            // A swapped `sub` would change the value of its term
            for (label, value) in &after {
                prop_assert_eq!(before.get(label), Some(value), "value of %{} changed", label);
            }

            let mut keys = HashSet::new();
            for term in program.live_terms() {
                if program.term(term).is_leaf() {
                    continue;
                }
                let op = program.op(term);
                let operands = program.operands(term);
                if op.is_commutative() {
                    prop_assert!(operands.is_sorted(), "%{} is not canonical", program.label(term));
                }
                prop_assert!(
                    keys.insert((op, operands.to_vec())),
                    "%{} duplicates an earlier operation",
                    program.label(term)
                );
            }
        }
    }
}
