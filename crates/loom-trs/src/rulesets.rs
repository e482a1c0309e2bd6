//! Built-in rulesets.

use crate::error::EvalError;
use crate::eval::arithmetic_eval;
use crate::pattern::{Pattern, PatternKind, exponentiate, fold, negate, rotate, square};
use crate::rule::{Rule, Ruleset};

/// Names accepted by [`builtin`].
pub const BUILTIN: &[&str] = &["simplify"];

pub fn builtin(name: &str) -> Option<Ruleset> {
    match name {
        "simplify" => Some(simplify()),
        _ => None,
    }
}

/// Algebraic simplifications that never increase operation cost.
pub fn simplify() -> Ruleset {
    let x = Pattern::var("x", PatternKind::Any);
    let y = Pattern::var("y", PatternKind::Any);
    let cx = Pattern::var("x", PatternKind::Cipher);
    let cy = Pattern::var("y", PatternKind::Cipher);
    let cz = Pattern::var("z", PatternKind::Cipher);
    let a = Pattern::var("a", PatternKind::Const);
    let b = Pattern::var("b", PatternKind::Const);
    let n = Pattern::var("n", PatternKind::Raw);
    let m = Pattern::var("m", PatternKind::Raw);
    let zero = Pattern::scalar(0.0);
    let one = Pattern::scalar(1.0);

    Ruleset::with_rules(
        "simplify",
        [
            Rule::new("add-zero-right", &x + &zero, x.clone()),
            Rule::new("add-zero-left", &zero + &x, x.clone()),
            Rule::new("sub-zero", &x - &zero, x.clone()),
            Rule::new("mul-one-right", &x * &one, x.clone()),
            Rule::new("mul-one-left", &one * &x, x.clone()),
            Rule::new("negate-negate", negate(&negate(&x)), x.clone()),
            Rule::new("fold-add", &a + &b, fold(&(&a + &b))),
            Rule::new("fold-sub", &a - &b, fold(&(&a - &b))),
            Rule::new("fold-mul", &a * &b, fold(&(&a * &b))),
            Rule::new("fold-negate", negate(&a), fold(&negate(&a))),
            Rule::new("mul-to-square", &cx * &cx, square(&cx)),
            Rule::new(
                "factor-mul",
                &(&cx * &cy) + &(&cx * &cz),
                &cx * &(&cy + &cz),
            ),
            Rule::new(
                "rotate-distribute",
                &rotate(&x, &n) + &rotate(&y, &n),
                rotate(&(&x + &y), &n),
            ),
            Rule::new("rotate-zero", rotate(&x, &n), x.clone())
                .with_condition(n.equal_to(&Pattern::raw(0))),
            Rule::new(
                "rotate-merge",
                rotate(&rotate(&x, &n), &m),
                rotate(&x, &fold(&(&n + &m))),
            ),
            exponentiation_rule(),
        ],
    )
}

/// `exponentiate(x, n)` becomes a square-and-multiply chain.
fn exponentiation_rule() -> Rule {
    let x = Pattern::var("x", PatternKind::Cipher);
    let n = Pattern::var("n", PatternKind::Raw);
    let lhs = exponentiate(&x, &n);
    Rule::dynamic("expand-exponent", lhs, move |bindings, program| {
        let exponent = arithmetic_eval(&n, bindings, program)?;
        if exponent < 1.0 || exponent.fract() != 0.0 {
            return Err(EvalError::Invalid {
                message: format!("exponent {exponent} is not a positive integer"),
            });
        }
        Ok(square_and_multiply(&x, exponent as u64))
    })
}

fn square_and_multiply(x: &Pattern, exponent: u64) -> Pattern {
    let mut result = x.clone();
    let top = u64::BITS - 1 - exponent.leading_zeros();
    for bit in (0..top).rev() {
        result = square(&result);
        if (exponent >> bit) & 1 == 1 {
            result = &result * x;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{RuleVerdict, check_ruleset};
    use crate::order::LexicoProductOrder;
    use crate::rewriter::{RewriteConfig, Rewriter};
    use loom_ir::parser::parse_test_circuit;
    use loom_ir::{OpCode, verify};

    #[test]
    fn square_and_multiply_chain() {
        let x = Pattern::var("x", PatternKind::Cipher);
        assert_eq!(square_and_multiply(&x, 1).to_string(), "x");
        assert_eq!(square_and_multiply(&x, 4).to_string(), "square(square(x))");
        assert_eq!(
            square_and_multiply(&x, 5).to_string(),
            "(square(square(x)) * x)"
        );
        assert_eq!(
            square_and_multiply(&x, 7).to_string(),
            "(square((square(x) * x)) * x)"
        );
    }

    #[test]
    fn exponent_is_expanded() {
        let mut program = parse_test_circuit(
            "circuit @e {\n  %x = input cipher\n  %e = exponentiate %x, 5\n  output %e as \"e\"\n}\n",
        );
        let stats = Rewriter::new(&simplify(), RewriteConfig::default())
            .rewrite(&mut program)
            .unwrap();
        assert_eq!(stats.applied.get("expand-exponent"), Some(&1));

        let e = program.find_by_label("e").unwrap();
        let x = program.find_by_label("x").unwrap();
        assert_eq!(program.op(e), OpCode::Mul);
        assert_eq!(program.operands(e)[1], x);
        assert_eq!(program.op(program.operands(e)[0]), OpCode::Square);
        assert!(program.find_by_label("5").is_none());
        assert!(verify(&program).is_ok());
    }

    #[test]
    fn zero_exponent_is_rejected() {
        let mut program = parse_test_circuit(
            "circuit @z {\n  %x = input cipher\n  %e = exponentiate %x, 0\n  output %e as \"e\"\n}\n",
        );
        let stats = Rewriter::new(&simplify(), RewriteConfig::default())
            .rewrite(&mut program)
            .unwrap();
        assert_eq!(stats.total_changes, 0);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn simplify_is_sound_under_cost_orders() {
        let ruleset = simplify();
        for order in [LexicoProductOrder::ops_cost(), LexicoProductOrder::joined()] {
            let report = check_ruleset(&ruleset, &order);
            assert!(report.is_sound(), "{report}");
        }
        let report = check_ruleset(&ruleset, &LexicoProductOrder::ops_cost());
        let dynamic = report
            .reports()
            .filter(|r| r.verdict == RuleVerdict::DynamicRhs)
            .count();
        assert_eq!(dynamic, 1);
    }

    #[test]
    fn folds_and_identities() {
        let mut program = parse_test_circuit(
            r#"circuit @s {
  %x = input cipher
  %two = const 2
  %three = const 3
  %k = mul %two, %three
  %zero = const 0
  %t = mul %x, %k
  %u = add %t, %zero
  %r = rotate %u, 2
  %s = rotate %r, -2
  output %s as "s"
}
"#,
        );
        let stats = Rewriter::new(&simplify(), RewriteConfig::default())
            .rewrite(&mut program)
            .unwrap();
        assert!(stats.reached_fixpoint);
        assert!(verify(&program).is_ok());

        let out = program.outputs()[0].term;
        assert_eq!(program.op(out), OpCode::Mul);
        let factor = program.operands(out)[1];
        assert_eq!(
            program.constant(factor),
            Some(&loom_ir::ConstantValue::Scalar(6.0))
        );
    }
}
