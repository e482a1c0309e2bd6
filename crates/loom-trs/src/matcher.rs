//! Structural pattern matching against IR terms.

use std::collections::HashMap;

use loom_ir::{ConstantValue, Program, TermId, TermKind};

use crate::eval::f64_to_raw;
use crate::pattern::{Pattern, PatternKind, PatternVar};

/// Bindings from pattern variables to IR terms for one match attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchingMap {
    bindings: HashMap<PatternVar, TermId>,
}

impl MatchingMap {
    pub fn get(&self, var: PatternVar) -> Option<TermId> {
        self.bindings.get(&var).copied()
    }

    /// Term bound to `pattern`'s node, if any.
    pub fn term_of(&self, pattern: &Pattern) -> Option<TermId> {
        self.get(pattern.var_id())
    }

    pub fn bind(&mut self, var: PatternVar, term: TermId) {
        self.bindings.insert(var, term);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatternVar, TermId)> + '_ {
        self.bindings.iter().map(|(var, term)| (*var, *term))
    }
}

/// Match `pattern` against `term`, returning the bindings on success.
///
/// Matching is depth-first and left to right over operands. A variable
/// that occurs more than once must bind the same term each time.
pub fn match_term(pattern: &Pattern, term: TermId, program: &Program) -> Option<MatchingMap> {
    let mut bindings = MatchingMap::default();
    match_into(pattern, term, program, &mut bindings).then_some(bindings)
}

fn match_into(
    pattern: &Pattern,
    term: TermId,
    program: &Program,
    bindings: &mut MatchingMap,
) -> bool {
    let data = program.term(term);

    if !pattern.kind().admits(data.kind()) {
        return false;
    }

    if let Some(bound) = bindings.get(pattern.var_id()) {
        return bound == term;
    }

    if pattern.kind() == PatternKind::Const && program.constant(term).is_none() {
        return false;
    }

    if pattern.is_call() {
        // Side-computations only appear on right-hand sides and in conditions.
        return false;
    }

    if pattern.is_leaf() {
        if let Some(value) = pattern.value()
            && !literal_matches(value, pattern.kind(), term, program)
        {
            return false;
        }
        bindings.bind(pattern.var_id(), term);
        return true;
    }

    if pattern.op_code() != data.op() || pattern.operands().len() != data.operands().len() {
        return false;
    }
    for (sub, &operand) in pattern.operands().iter().zip(data.operands()) {
        if !match_into(sub, operand, program, bindings) {
            return false;
        }
    }
    bindings.bind(pattern.var_id(), term);
    true
}

/// A literal pattern only matches a leaf holding an equal value.
fn literal_matches(
    value: &ConstantValue,
    kind: PatternKind,
    term: TermId,
    program: &Program,
) -> bool {
    if !program.term(term).is_leaf() {
        return false;
    }
    if kind == PatternKind::Raw {
        let literal = value.as_scalar().and_then(|v| f64_to_raw(v).ok());
        return program.kind(term) == TermKind::RawData
            && literal.is_some_and(|v| program.raw_value(term) == Some(v));
    }
    program.constant(term) == Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{add_plain, rotate, square};
    use loom_ir::parser::parse_test_circuit;

    fn circuit() -> Program {
        parse_test_circuit(
            r#"circuit @m {
  %x = input cipher
  %y = input cipher
  %p = input plain
  %z = const 0
  %xx = mul %x, %x
  %xy = mul %x, %y
  %s = add %xx, %z
  %r = rotate %xy, 3
  %q = add_plain %x, %p
  output %s as "s"
}
"#,
        )
    }

    fn term(program: &Program, label: &str) -> TermId {
        program.find_by_label(label).unwrap()
    }

    #[test]
    fn repeated_variable_requires_identical_term() {
        let program = circuit();
        let x = Pattern::var("x", PatternKind::Cipher);
        let lhs = &x * &x;

        let bindings = match_term(&lhs, term(&program, "xx"), &program).unwrap();
        assert_eq!(bindings.term_of(&x), Some(term(&program, "x")));
        assert_eq!(bindings.term_of(&lhs), Some(term(&program, "xx")));
        assert!(match_term(&lhs, term(&program, "xy"), &program).is_none());
    }

    #[test]
    fn kind_restricts_binding() {
        let program = circuit();
        let a = Pattern::var("a", PatternKind::Cipher);
        let b = Pattern::var("b", PatternKind::Cipher);
        let lhs = add_plain(&a, &b);
        assert!(match_term(&lhs, term(&program, "q"), &program).is_none());

        let plain = Pattern::var("b", PatternKind::Plain);
        assert!(match_term(&add_plain(&a, &plain), term(&program, "q"), &program).is_some());
    }

    #[test]
    fn const_kind_requires_table_entry() {
        let program = circuit();
        let c = Pattern::var("c", PatternKind::Const);
        assert!(match_term(&c, term(&program, "z"), &program).is_some());
        assert!(match_term(&c, term(&program, "p"), &program).is_none());
    }

    #[test]
    fn literal_patterns_compare_values() {
        let program = circuit();
        let a = Pattern::var("a", PatternKind::Any);
        let with_zero = &a + &Pattern::scalar(0.0);
        let with_one = &a + &Pattern::scalar(1.0);
        assert!(match_term(&with_zero, term(&program, "s"), &program).is_some());
        assert!(match_term(&with_one, term(&program, "s"), &program).is_none());

        let x = Pattern::var("x", PatternKind::Cipher);
        assert!(match_term(&rotate(&x, &Pattern::raw(3)), term(&program, "r"), &program).is_some());
        assert!(match_term(&rotate(&x, &Pattern::raw(2)), term(&program, "r"), &program).is_none());
        // Scalar literals only see the constants table
        assert!(match_term(&rotate(&x, &Pattern::scalar(3.0)), term(&program, "r"), &program).is_none());
    }

    #[test]
    fn opcode_and_structure_must_agree() {
        let program = circuit();
        let x = Pattern::var("x", PatternKind::Any);
        assert!(match_term(&square(&x), term(&program, "xx"), &program).is_none());
        let nested = (&x * &x) + Pattern::var("k", PatternKind::Const);
        let bindings = match_term(&nested, term(&program, "s"), &program).unwrap();
        assert_eq!(bindings.len(), 4);
    }
}
