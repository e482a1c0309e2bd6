//! Condition and arithmetic evaluation over bound patterns.

use loom_ir::{ConstantValue, OpCode, Program};

use crate::error::EvalError;
use crate::matcher::MatchingMap;
use crate::pattern::{Pattern, PatternKind};

/// Evaluate a rule condition under `bindings`.
pub fn evaluate_condition(
    condition: &Pattern,
    bindings: &MatchingMap,
    program: &Program,
) -> Result<bool, EvalError> {
    if let Some(function) = condition.function() {
        let literal = function.apply(&condition.operands()[0], bindings, program)?;
        return evaluate_condition(&literal, bindings, program);
    }
    let operands = condition.operands();
    match condition.op_code() {
        OpCode::Undefined => match (condition.kind(), condition.value()) {
            (PatternKind::Boolean, Some(ConstantValue::Scalar(v))) => Ok(*v != 0.0),
            _ => Err(EvalError::UnsupportedCondition {
                pattern: condition.to_string(),
            }),
        },
        OpCode::Not => Ok(!evaluate_condition(&operands[0], bindings, program)?),
        OpCode::And => Ok(evaluate_condition(&operands[0], bindings, program)?
            && evaluate_condition(&operands[1], bindings, program)?),
        OpCode::Or => Ok(evaluate_condition(&operands[0], bindings, program)?
            || evaluate_condition(&operands[1], bindings, program)?),
        op if op.is_relational() => {
            let lhs = arithmetic_eval(&operands[0], bindings, program)?;
            let rhs = arithmetic_eval(&operands[1], bindings, program)?;
            Ok(match op {
                OpCode::LessThan => lhs < rhs,
                OpCode::LessEqual => lhs <= rhs,
                OpCode::GreaterThan => lhs > rhs,
                OpCode::GreaterEqual => lhs >= rhs,
                OpCode::Equal => lhs == rhs,
                _ => lhs != rhs,
            })
        }
        _ => Err(EvalError::UnsupportedCondition {
            pattern: condition.to_string(),
        }),
    }
}

/// Resolve an arithmetic pattern to a number.
///
/// Side-computations are applied first; literals evaluate to themselves;
/// bound leaves read a raw label or a scalar constant; `+`, `-` and `*`
/// combine two operands.
pub fn arithmetic_eval(
    pattern: &Pattern,
    bindings: &MatchingMap,
    program: &Program,
) -> Result<f64, EvalError> {
    if let Some(function) = pattern.function() {
        let literal = function.apply(&pattern.operands()[0], bindings, program)?;
        return arithmetic_eval(&literal, bindings, program);
    }
    if let Some(value) = pattern.value() {
        return value.as_scalar().ok_or_else(|| EvalError::NotScalar {
            pattern: pattern.to_string(),
        });
    }
    if pattern.is_variable() {
        let term = bindings
            .get(pattern.var_id())
            .ok_or_else(|| EvalError::UnboundVariable {
                name: pattern.display_name(),
            })?;
        if let Some(v) = program.raw_value(term) {
            return raw_to_f64(v);
        }
        return program
            .constant(term)
            .and_then(ConstantValue::as_scalar)
            .ok_or_else(|| EvalError::Unresolved {
                label: program.label(term).to_owned(),
            });
    }
    let operands = pattern.operands();
    let combine: fn(f64, f64) -> f64 = match pattern.op_code() {
        OpCode::Add => |a, b| a + b,
        OpCode::Sub => |a, b| a - b,
        OpCode::Mul => |a, b| a * b,
        op => return Err(EvalError::UnsupportedArithmetic { op }),
    };
    Ok(combine(
        arithmetic_eval(&operands[0], bindings, program)?,
        arithmetic_eval(&operands[1], bindings, program)?,
    ))
}

/// Largest raw-literal magnitude that `f64` arithmetic represents exactly.
const MAX_EXACT_RAW: u64 = 1 << 53;

/// Widen a raw literal for arithmetic, refusing values `f64` would round.
pub(crate) fn raw_to_f64(value: i64) -> Result<f64, EvalError> {
    if value.unsigned_abs() > MAX_EXACT_RAW {
        return Err(EvalError::OutOfRange {
            value: value.to_string(),
        });
    }
    Ok(value as f64)
}

/// Narrow an arithmetic result back to a raw literal.
pub(crate) fn f64_to_raw(value: f64) -> Result<i64, EvalError> {
    if value.fract() != 0.0 {
        return Err(EvalError::NonIntegral { value });
    }
    if value.abs() > MAX_EXACT_RAW as f64 {
        return Err(EvalError::OutOfRange {
            value: value.to_string(),
        });
    }
    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_term;
    use crate::pattern::{is_const, rotate, single_use, square};
    use loom_ir::parser::parse_test_circuit;

    fn rotation() -> (Program, MatchingMap, Pattern, Pattern) {
        let program = parse_test_circuit(
            "circuit @r {\n  %x = input cipher\n  %r = rotate %x, 3\n  output %r as \"r\"\n}\n",
        );
        let x = Pattern::var("x", PatternKind::Cipher);
        let n = Pattern::var("n", PatternKind::Raw);
        let r = program.find_by_label("r").unwrap();
        let bindings = match_term(&rotate(&x, &n), r, &program).unwrap();
        (program, bindings, x, n)
    }

    #[test]
    fn raw_label_is_parsed_for_comparison() {
        let (program, bindings, _x, n) = rotation();
        let cond = n.less_than(&Pattern::raw(5));
        assert_eq!(evaluate_condition(&cond, &bindings, &program), Ok(true));
        let cond = n.greater_equal(&Pattern::scalar(4.0));
        assert_eq!(evaluate_condition(&cond, &bindings, &program), Ok(false));
    }

    #[test]
    fn arithmetic_combines_operands() {
        let (program, bindings, _x, n) = rotation();
        let expr = &(&n * &Pattern::raw(2)) - &Pattern::raw(1);
        assert_eq!(arithmetic_eval(&expr, &bindings, &program), Ok(5.0));
    }

    #[test]
    fn logical_connectives() {
        let (program, bindings, x, n) = rotation();
        let small = n.less_than(&Pattern::raw(5));
        let zero = n.equal_to(&Pattern::raw(0));
        let cond = small.and(&!&zero).or(&Pattern::boolean(false));
        assert_eq!(evaluate_condition(&cond, &bindings, &program), Ok(true));

        assert_eq!(
            evaluate_condition(&single_use(&x), &bindings, &program),
            Ok(true)
        );
        assert_eq!(
            evaluate_condition(&is_const(&x), &bindings, &program),
            Ok(false)
        );
    }

    #[test]
    fn raw_literal_beyond_exact_range_is_an_error() {
        let program = parse_test_circuit(
            "circuit @big {\n  %x = input cipher\n  %r = rotate %x, 9007199254740993\n  output %r as \"r\"\n}\n",
        );
        let x = Pattern::var("x", PatternKind::Cipher);
        let n = Pattern::var("n", PatternKind::Raw);
        let r = program.find_by_label("r").unwrap();
        let bindings = match_term(&rotate(&x, &n), r, &program).unwrap();
        assert_eq!(
            arithmetic_eval(&n, &bindings, &program),
            Err(EvalError::OutOfRange {
                value: "9007199254740993".to_owned()
            })
        );
    }

    #[test]
    fn narrowing_to_raw_is_checked() {
        assert_eq!(f64_to_raw(-4.0), Ok(-4));
        assert_eq!(f64_to_raw(2.5), Err(EvalError::NonIntegral { value: 2.5 }));
        assert!(matches!(f64_to_raw(1e300), Err(EvalError::OutOfRange { .. })));
        assert_eq!(raw_to_f64(1 << 53), Ok(9007199254740992.0));
        assert!(matches!(raw_to_f64(i64::MIN), Err(EvalError::OutOfRange { .. })));
    }

    #[test]
    fn cipher_leaf_in_arithmetic_is_an_error() {
        let (program, bindings, x, _n) = rotation();
        let cond = x.less_than(&Pattern::raw(5));
        assert_eq!(
            evaluate_condition(&cond, &bindings, &program),
            Err(EvalError::Unresolved {
                label: "x".to_owned()
            })
        );
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let (program, bindings, x, _n) = rotation();
        assert_eq!(
            arithmetic_eval(&square(&x), &bindings, &program),
            Err(EvalError::UnsupportedArithmetic {
                op: OpCode::Square
            })
        );
        let unbound = Pattern::var("k", PatternKind::Raw);
        assert!(matches!(
            arithmetic_eval(&unbound, &bindings, &program),
            Err(EvalError::UnboundVariable { .. })
        ));
    }
}
