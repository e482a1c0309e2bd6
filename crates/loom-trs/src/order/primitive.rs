//! Primitive rewrite orders.
//!
//! Each order interprets a pattern as a cost that depends on the (unknown)
//! costs of the terms its variables bind to, and compares the two sides of
//! a rule for every possible binding at once. Counting orders use linear
//! interpretations, depth orders use max-plus interpretations. A side only
//! dominates the other when it does so for all bindings; otherwise the
//! order is `NotGeneralizable`.

use std::collections::BTreeMap;

use loom_ir::OpCode;

use super::CompResult;
use crate::pattern::{Pattern, PatternKind, PatternVar};

// ============================================================================
// Kind predicates
// ============================================================================

fn is_boolean(p: &Pattern) -> bool {
    if p.is_operation() {
        let op = p.op_code();
        return op.is_relational() || op.is_logical();
    }
    p.kind() == PatternKind::Boolean
}

/// The pattern is encrypted under some binding.
fn may_be_cipher(p: &Pattern) -> bool {
    if p.is_call() || is_boolean(p) {
        return false;
    }
    if p.is_leaf() {
        return p.is_variable() && matches!(p.kind(), PatternKind::Cipher | PatternKind::Any);
    }
    p.op_code() == OpCode::Encrypt || p.operands().iter().any(may_be_cipher)
}

/// The pattern is never encrypted nor boolean.
fn is_plain(p: &Pattern) -> bool {
    !may_be_cipher(p) && !is_boolean(p)
}

/// Literals, constant-table leaves and raw data.
fn is_constant_like(p: &Pattern) -> bool {
    if p.is_call() || p.is_literal() {
        return true;
    }
    if p.is_variable() {
        return matches!(p.kind(), PatternKind::Const | PatternKind::Raw);
    }
    !p.operands().is_empty() && p.operands().iter().all(is_constant_like)
}

/// Whether a variable of this kind can bind a term containing operations
/// of the measured class.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Cipher,
    Plain,
    Constant,
}

fn var_may_contain(kind: PatternKind, class: Class) -> bool {
    match class {
        Class::Cipher => matches!(kind, PatternKind::Cipher | PatternKind::Any),
        Class::Plain | Class::Constant => matches!(
            kind,
            PatternKind::Plain | PatternKind::Scalar | PatternKind::Numeric | PatternKind::Any
        ),
    }
}

fn vars_multiset(p: &Pattern) -> BTreeMap<PatternVar, usize> {
    let mut vars = BTreeMap::new();
    for sub in p.subterms().filter(|s| s.is_variable()) {
        *vars.entry(sub.var_id()).or_insert(0) += 1;
    }
    vars
}

// ============================================================================
// Linear interpretations
// ============================================================================

/// `constant + sum(coeff * v)` over non-negative variable costs `v`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearCost {
    pub constant: i64,
    pub coeffs: BTreeMap<PatternVar, i64>,
}

impl LinearCost {
    fn add_var(&mut self, var: PatternVar, coeff: i64) {
        *self.coeffs.entry(var).or_insert(0) += coeff;
    }

    /// `self >= other` for every binding.
    fn weakly_dominates(&self, other: &Self) -> bool {
        self.constant >= other.constant && self.coeffs_dominate(other)
    }

    /// `self > other` for every binding.
    fn strictly_dominates(&self, other: &Self) -> bool {
        self.constant > other.constant && self.coeffs_dominate(other)
    }

    fn coeffs_dominate(&self, other: &Self) -> bool {
        let keys = self.coeffs.keys().chain(other.coeffs.keys());
        keys.into_iter().all(|var| {
            let mine = self.coeffs.get(var).copied().unwrap_or(0);
            let theirs = other.coeffs.get(var).copied().unwrap_or(0);
            mine >= theirs
        })
    }
}

fn compare_linear(lhs: &LinearCost, rhs: &LinearCost) -> CompResult {
    if lhs.strictly_dominates(rhs) {
        CompResult::Greater
    } else if rhs.strictly_dominates(lhs) {
        CompResult::Less
    } else if lhs.weakly_dominates(rhs) && rhs.weakly_dominates(lhs) {
        CompResult::Equal
    } else {
        CompResult::NotGeneralizable
    }
}

/// Count operations accepted by `counts`; variables that may contain such
/// operations contribute one unknown per occurrence.
fn count_ops(p: &Pattern, class: Class, counts: &dyn Fn(&Pattern) -> bool) -> LinearCost {
    let mut cost = LinearCost::default();
    for sub in p.subterms() {
        if sub.is_variable() {
            if var_may_contain(sub.kind(), class) {
                cost.add_var(sub.var_id(), 1);
            }
        } else if sub.is_operation() && counts(sub) {
            cost.constant += 1;
        }
    }
    cost
}

fn compare_counts(
    lhs: &Pattern,
    rhs: &Pattern,
    class: Class,
    counts: fn(&Pattern) -> bool,
) -> CompResult {
    let lhs = count_ops(&without_calls(lhs), class, &counts);
    let rhs = count_ops(&without_calls(rhs), class, &counts);
    compare_linear(&lhs, &rhs)
}

/// Call arguments are folded into a literal before they become terms, so
/// they never contribute operations.
fn without_calls(p: &Pattern) -> Pattern {
    if p.is_call() {
        return Pattern::raw(0);
    }
    if p.is_operation() {
        let operands = p.operands().iter().map(without_calls).collect();
        return Pattern::op(p.op_code(), operands);
    }
    p.clone()
}

macro_rules! count_orders {
    ($($(#[$doc:meta])* $name:ident, $class:expr, |$p:ident| $body:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(lhs: &Pattern, rhs: &Pattern) -> CompResult {
                fn counts($p: &Pattern) -> bool {
                    $body
                }
                compare_counts(lhs, rhs, $class, counts)
            }
        )*
    };
}

count_orders! {
    /// Ciphertext-ciphertext multiplications.
    mul_count, Class::Cipher, |p| p.op_code() == OpCode::Mul
        && p.operands().iter().all(may_be_cipher);
    square_count, Class::Cipher, |p| p.op_code() == OpCode::Square && may_be_cipher(p);
    rotate_count, Class::Cipher, |p| p.op_code().is_rotation() && may_be_cipher(p);
    relin_count, Class::Cipher, |p| p.op_code() == OpCode::Relinearize && may_be_cipher(p);
    /// Ciphertext-plaintext multiplications.
    mul_plain_count, Class::Cipher, |p| match p.op_code() {
        OpCode::MulPlain => may_be_cipher(p),
        OpCode::Mul => may_be_cipher(p) && p.operands().iter().any(is_plain),
        _ => false,
    };
    /// Homomorphic additions, subtractions and negations.
    he_add_count, Class::Cipher, |p| p.op_code().is_additive() && may_be_cipher(p);
    /// Binary operations whose two operands may both be encrypted.
    cipher_cipher_op_count, Class::Cipher, |p| p.operands().len() == 2
        && !p.op_code().is_rotation()
        && p.operands().iter().all(may_be_cipher);
    /// Operations evaluated entirely on plaintext values.
    plain_plain_op_count, Class::Plain, |p| !is_boolean(p) && p.operands().iter().all(is_plain);
}

/// Operations over constants only. More of them on the right is better,
/// since they fold away.
pub fn const_op_count(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    fn counts(p: &Pattern) -> bool {
        !is_boolean(p) && p.operands().iter().all(is_constant_like)
    }
    compare_counts(rhs, lhs, Class::Constant, counts)
}

/// Number of leaves. A variable binds at least one leaf.
pub fn leaves_count(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    compare_linear(&leaves(lhs), &leaves(rhs))
}

fn leaves(p: &Pattern) -> LinearCost {
    let mut cost = LinearCost::default();
    let mut stack = vec![p];
    while let Some(sub) = stack.pop() {
        if sub.is_call() || sub.is_literal() {
            cost.constant += 1;
        } else if sub.is_variable() {
            cost.constant += 1;
            cost.add_var(sub.var_id(), 1);
        } else {
            stack.extend(sub.operands());
        }
    }
    cost
}

/// Sum of rotation step magnitudes.
///
/// Variables inside a folded step count as unknown magnitudes, so merging
/// `rotate(rotate(x, n), m)` into `rotate(x, fold(n + m))` is neutral.
pub fn sum_rotation_steps(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    compare_linear(&rotation_steps(lhs), &rotation_steps(rhs))
}

fn rotation_steps(p: &Pattern) -> LinearCost {
    let mut cost = LinearCost::default();
    for sub in p.subterms() {
        if sub.is_variable() && var_may_contain(sub.kind(), Class::Cipher) {
            cost.add_var(sub.var_id(), 1);
        }
        if !(sub.op_code().is_rotation() && may_be_cipher(sub)) {
            continue;
        }
        let step = &sub.operands()[1];
        for leaf in step.subterms() {
            if leaf.is_variable() {
                cost.add_var(leaf.var_id(), 1);
            } else if leaf.is_literal()
                && let Some(v) = leaf.value().and_then(|v| v.as_scalar())
            {
                cost.constant += v.abs() as i64;
            }
        }
    }
    cost
}

// ============================================================================
// Max-plus interpretations
// ============================================================================

/// `max(constant, max(v + offset))` over non-negative variable depths `v`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepthCost {
    pub constant: i64,
    pub offsets: BTreeMap<PatternVar, i64>,
}

impl DepthCost {
    fn join(&mut self, other: &DepthCost) {
        self.constant = self.constant.max(other.constant);
        for (var, offset) in &other.offsets {
            let entry = self.offsets.entry(*var).or_insert(*offset);
            *entry = (*entry).max(*offset);
        }
    }

    fn shift(&mut self, by: i64) {
        self.constant += by;
        for offset in self.offsets.values_mut() {
            *offset += by;
        }
    }

    fn dominates(&self, other: &DepthCost, strict: bool) -> bool {
        let beats = |a: i64, b: i64| if strict { a > b } else { a >= b };
        beats(self.constant, other.constant)
            && other
                .offsets
                .iter()
                .all(|(var, theirs)| self.offsets.get(var).is_some_and(|mine| beats(*mine, *theirs)))
    }
}

fn compare_depth(lhs: &DepthCost, rhs: &DepthCost) -> CompResult {
    if lhs.dominates(rhs, true) {
        CompResult::Greater
    } else if rhs.dominates(lhs, true) {
        CompResult::Less
    } else if lhs.dominates(rhs, false) && rhs.dominates(lhs, false) {
        CompResult::Equal
    } else {
        CompResult::NotGeneralizable
    }
}

fn depth_of(p: &Pattern, weighted: fn(&Pattern) -> bool) -> DepthCost {
    let mut cost = DepthCost::default();
    if p.is_call() || p.is_literal() {
        return cost;
    }
    if p.is_variable() {
        if var_may_contain(p.kind(), Class::Cipher) {
            cost.offsets.insert(p.var_id(), 0);
        }
        return cost;
    }
    for operand in p.operands() {
        cost.join(&depth_of(operand, weighted));
    }
    if weighted(p) {
        cost.shift(1);
    }
    cost
}

/// Multiplicative depth: ciphertext-ciphertext multiplications on the
/// deepest path.
pub fn xdepth(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    fn weighted(p: &Pattern) -> bool {
        match p.op_code() {
            OpCode::Mul => p.operands().iter().all(may_be_cipher),
            OpCode::Square | OpCode::Exponentiate => may_be_cipher(p),
            _ => false,
        }
    }
    compare_depth(&depth_of(lhs, weighted), &depth_of(rhs, weighted))
}

/// Number of ciphertext operations on the deepest path.
pub fn depth(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    compare_depth(&depth_of(lhs, may_be_cipher), &depth_of(rhs, may_be_cipher))
}

// ============================================================================
// Tie-breaks
// ============================================================================

fn compare_strings(lhs: &Pattern, rhs: &Pattern, pick: fn(&Pattern) -> Vec<String>) -> CompResult {
    if vars_multiset(lhs) != vars_multiset(rhs) {
        return CompResult::NotGeneralizable;
    }
    match pick(lhs).cmp(&pick(rhs)) {
        std::cmp::Ordering::Greater => CompResult::Greater,
        std::cmp::Ordering::Less => CompResult::Less,
        std::cmp::Ordering::Equal => CompResult::Equal,
    }
}

/// Rotation steps in pre-order, compared as strings.
pub fn rotate_phi_str(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    fn steps(p: &Pattern) -> Vec<String> {
        p.subterms()
            .filter(|s| s.op_code().is_rotation())
            .map(|s| s.operands()[1].to_string())
            .collect()
    }
    compare_strings(lhs, rhs, steps)
}

/// Constant literals in pre-order, compared as strings.
pub fn const_phi_str(lhs: &Pattern, rhs: &Pattern) -> CompResult {
    fn literals(p: &Pattern) -> Vec<String> {
        p.subterms()
            .filter(|s| s.is_literal() && s.kind() != PatternKind::Raw)
            .map(ToString::to_string)
            .collect()
    }
    compare_strings(lhs, rhs, literals)
}
