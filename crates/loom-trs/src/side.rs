//! Named side-computations invoked from patterns.
//!
//! A side-computation turns its argument pattern, under the current
//! bindings, into a literal pattern. The literal is then either evaluated
//! (inside conditions) or materialized as a new leaf (inside right-hand
//! sides).

use loom_ir::{ConstantValue, OpCode, Program, TermId, TermKind, analysis};

use crate::error::EvalError;
use crate::eval::{f64_to_raw, raw_to_f64};
use crate::matcher::MatchingMap;
use crate::pattern::Pattern;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SideComputation {
    /// Constant folding of `+`, `-`, `*` and negation.
    Fold,
    /// Multiplicative depth of the bound term, as a raw literal.
    MulDepth,
    /// The bound term is a leaf or has at most one parent.
    SingleUse,
    /// The bound term has a constants-table entry.
    IsConstant,
}

impl SideComputation {
    pub fn name(self) -> &'static str {
        match self {
            SideComputation::Fold => "fold",
            SideComputation::MulDepth => "mul_depth",
            SideComputation::SingleUse => "single_use",
            SideComputation::IsConstant => "is_const",
        }
    }

    /// Compute the literal this side-computation produces for `arg`.
    pub fn apply(
        self,
        arg: &Pattern,
        bindings: &MatchingMap,
        program: &Program,
    ) -> Result<Pattern, EvalError> {
        match self {
            SideComputation::Fold => fold_pattern(arg, bindings, program)?.into_pattern(),
            SideComputation::MulDepth => {
                let term = bound_term(arg, bindings)?;
                Ok(Pattern::raw(i64::from(analysis::term_depth(program, term))))
            }
            SideComputation::SingleUse => {
                let term = bound_term(arg, bindings)?;
                let single = program.term(term).is_leaf() || program.parents(term).len() <= 1;
                Ok(Pattern::boolean(single))
            }
            SideComputation::IsConstant => {
                let term = bound_term(arg, bindings)?;
                Ok(Pattern::boolean(program.constant(term).is_some()))
            }
        }
    }
}

fn bound_term(arg: &Pattern, bindings: &MatchingMap) -> Result<TermId, EvalError> {
    bindings
        .get(arg.var_id())
        .ok_or_else(|| EvalError::UnboundVariable {
            name: arg.display_name(),
        })
}

// ============================================================================
// Constant folding
// ============================================================================

/// Intermediate folding result.
#[derive(Clone, Debug, PartialEq)]
struct Folded {
    value: ConstantValue,
    /// Every leaf was raw data, so the result is raw data too.
    raw: bool,
}

impl Folded {
    fn into_pattern(self) -> Result<Pattern, EvalError> {
        if !self.raw {
            return Ok(Pattern::constant(self.value));
        }
        match self.value {
            ConstantValue::Scalar(v) => Ok(Pattern::raw(f64_to_raw(v)?)),
            ConstantValue::Vector(_) => Err(EvalError::NotScalar {
                pattern: "raw vector".to_owned(),
            }),
        }
    }
}

fn fold_pattern(
    pattern: &Pattern,
    bindings: &MatchingMap,
    program: &Program,
) -> Result<Folded, EvalError> {
    if let Some(term) = bindings.get(pattern.var_id()) {
        return fold_term(program, term);
    }
    if let Some(function) = pattern.function() {
        let literal = function.apply(&pattern.operands()[0], bindings, program)?;
        return fold_pattern(&literal, bindings, program);
    }
    if let Some(value) = pattern.value() {
        return Ok(Folded {
            value: value.clone(),
            raw: pattern.kind() == crate::pattern::PatternKind::Raw,
        });
    }
    if pattern.is_variable() {
        return Err(EvalError::UnboundVariable {
            name: pattern.display_name(),
        });
    }
    let operands = pattern
        .operands()
        .iter()
        .map(|operand| fold_pattern(operand, bindings, program))
        .collect::<Result<Vec<_>, _>>()?;
    combine(pattern.op_code(), operands)
}

fn fold_term(program: &Program, term: TermId) -> Result<Folded, EvalError> {
    let data = program.term(term);
    if data.is_leaf() {
        if let Some(value) = program.constant(term) {
            return Ok(Folded {
                value: value.clone(),
                raw: false,
            });
        }
        if data.kind() == TermKind::RawData
            && let Some(v) = program.raw_value(term)
        {
            return Ok(Folded {
                value: ConstantValue::Scalar(raw_to_f64(v)?),
                raw: true,
            });
        }
        return Err(EvalError::Unresolved {
            label: data.label().to_owned(),
        });
    }
    let operands = data
        .operands()
        .iter()
        .map(|&operand| fold_term(program, operand))
        .collect::<Result<Vec<_>, _>>()?;
    combine(data.op(), operands)
}

fn combine(op: OpCode, operands: Vec<Folded>) -> Result<Folded, EvalError> {
    let raw = operands.iter().all(|f| f.raw);
    let value = match (op, operands.as_slice()) {
        (OpCode::Negate, [a]) => map_values(&a.value, |v| -v),
        (OpCode::Add | OpCode::AddPlain, [a, b]) => zip_values(&a.value, &b.value, |x, y| x + y)?,
        (OpCode::Sub | OpCode::SubPlain, [a, b]) => zip_values(&a.value, &b.value, |x, y| x - y)?,
        (OpCode::Mul | OpCode::MulPlain, [a, b]) => zip_values(&a.value, &b.value, |x, y| x * y)?,
        (op, _) => return Err(EvalError::UnsupportedArithmetic { op }),
    };
    Ok(Folded { value, raw })
}

fn map_values(value: &ConstantValue, f: impl Fn(f64) -> f64) -> ConstantValue {
    match value {
        ConstantValue::Scalar(v) => ConstantValue::Scalar(f(*v)),
        ConstantValue::Vector(vs) => ConstantValue::Vector(vs.iter().map(|v| f(*v)).collect()),
    }
}

/// Element-wise combination; scalars broadcast over vectors.
fn zip_values(
    a: &ConstantValue,
    b: &ConstantValue,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ConstantValue, EvalError> {
    Ok(match (a, b) {
        (ConstantValue::Scalar(x), ConstantValue::Scalar(y)) => ConstantValue::Scalar(f(*x, *y)),
        (ConstantValue::Scalar(x), ConstantValue::Vector(ys)) => {
            ConstantValue::Vector(ys.iter().map(|y| f(*x, *y)).collect())
        }
        (ConstantValue::Vector(xs), ConstantValue::Scalar(y)) => {
            ConstantValue::Vector(xs.iter().map(|x| f(*x, *y)).collect())
        }
        (ConstantValue::Vector(xs), ConstantValue::Vector(ys)) => {
            if xs.len() != ys.len() {
                return Err(EvalError::LengthMismatch {
                    left: xs.len(),
                    right: ys.len(),
                });
            }
            ConstantValue::Vector(xs.iter().zip(ys).map(|(x, y)| f(*x, *y)).collect())
        }
    })
}
