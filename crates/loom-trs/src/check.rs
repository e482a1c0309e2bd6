//! Ruleset soundness checking.
//!
//! Every rule with a static right-hand side is compared against a
//! [`LexicoProductOrder`]. Accepted rules strictly decrease the order's
//! cost, so rewriting with them terminates.

use std::fmt;

use loom_ir::OpCode;

use crate::error::SoundnessError;
use crate::order::{CompResult, LexicoProductOrder};
use crate::rule::{Rule, Ruleset};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleVerdict {
    /// The left-hand side is greater under `component`.
    Accepted { component: &'static str },
    /// The rule increases cost under `component`.
    Rejected { component: &'static str },
    /// Every component reports equal.
    Unordered,
    /// `component` cannot decide without a condition of application.
    NeedsCondition {
        component: &'static str,
        has_condition: bool,
    },
    /// The right-hand side is computed at rewrite time.
    DynamicRhs,
}

impl RuleVerdict {
    /// Whether strict validation fails on this verdict.
    pub fn is_failure(&self) -> bool {
        matches!(self, RuleVerdict::Rejected { .. } | RuleVerdict::Unordered)
    }
}

impl fmt::Display for RuleVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleVerdict::Accepted { component } => write!(f, "accepted by {component}"),
            RuleVerdict::Rejected { component } => write!(f, "rejected by {component}"),
            RuleVerdict::Unordered => f.write_str("unordered"),
            RuleVerdict::NeedsCondition {
                component,
                has_condition: true,
            } => write!(
                f,
                "{component} needs a condition; the existing condition is not verified"
            ),
            RuleVerdict::NeedsCondition {
                component,
                has_condition: false,
            } => write!(f, "{component} needs a condition; none is provided"),
            RuleVerdict::DynamicRhs => f.write_str("dynamic rhs, invariants needed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleReport {
    pub name: String,
    /// Textual form of the rule.
    pub rule: String,
    pub verdict: RuleVerdict,
}

/// Per-rule verdicts grouped by root opcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub ruleset: String,
    pub order: &'static str,
    pub groups: Vec<(OpCode, Vec<RuleReport>)>,
}

impl CheckReport {
    pub fn reports(&self) -> impl Iterator<Item = &RuleReport> + '_ {
        self.groups.iter().flat_map(|(_, reports)| reports)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> + '_ {
        self.reports().filter(|report| report.verdict.is_failure())
    }

    pub fn is_sound(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Strict mode: the first rejected or unordered rule is an error.
    pub fn into_strict(self) -> Result<Self, SoundnessError> {
        let failure = self.failures().next().map(|report| match report.verdict {
            RuleVerdict::Rejected { .. } => SoundnessError::Rejected {
                rule: report.name.clone(),
                order: self.order.to_owned(),
            },
            _ => SoundnessError::Unordered {
                rule: report.name.clone(),
                order: self.order.to_owned(),
            },
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn count(&self, pred: impl Fn(&RuleVerdict) -> bool) -> usize {
        self.reports().filter(|r| pred(&r.verdict)).count()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ruleset {} (order {})", self.ruleset, self.order)?;
        for (op, reports) in &self.groups {
            writeln!(f, "{op} rules:")?;
            for report in reports {
                writeln!(f, "  {}", report.rule)?;
                writeln!(f, "    {}", report.verdict)?;
            }
        }
        write!(
            f,
            "{} accepted, {} rejected, {} unordered, {} need conditions, {} dynamic",
            self.count(|v| matches!(v, RuleVerdict::Accepted { .. })),
            self.count(|v| matches!(v, RuleVerdict::Rejected { .. })),
            self.count(|v| matches!(v, RuleVerdict::Unordered)),
            self.count(|v| matches!(v, RuleVerdict::NeedsCondition { .. })),
            self.count(|v| matches!(v, RuleVerdict::DynamicRhs)),
        )
    }
}

/// Decide one rule.
pub fn check_rule(rule: &Rule, order: &LexicoProductOrder) -> RuleVerdict {
    let Some(rhs) = rule.static_rhs() else {
        return RuleVerdict::DynamicRhs;
    };
    let verdict = order.compare(rule.lhs(), rhs);
    match (verdict.result, verdict.component) {
        (CompResult::Greater, Some(component)) => RuleVerdict::Accepted { component },
        (CompResult::Less, Some(component)) => RuleVerdict::Rejected { component },
        (CompResult::NotGeneralizable, Some(component)) => RuleVerdict::NeedsCondition {
            component,
            has_condition: rule.condition().is_some(),
        },
        _ => RuleVerdict::Unordered,
    }
}

/// Check every rule of `ruleset`, logging each verdict.
pub fn check_ruleset(ruleset: &Ruleset, order: &LexicoProductOrder) -> CheckReport {
    tracing::info!(ruleset = ruleset.name(), order = order.name(), "checking ruleset");
    let groups = ruleset
        .rules_by_root_op()
        .map(|(op, rules)| {
            let reports = rules
                .iter()
                .map(|rule| {
                    let verdict = check_rule(rule, order);
                    if verdict.is_failure() {
                        tracing::warn!(rule = rule.name(), order = order.name(), %verdict, "unsound rule");
                    } else {
                        tracing::debug!(rule = rule.name(), order = order.name(), %verdict, "rule checked");
                    }
                    RuleReport {
                        name: rule.name().to_owned(),
                        rule: rule.to_string(),
                        verdict,
                    }
                })
                .collect();
            (op, reports)
        })
        .collect();
    CheckReport {
        ruleset: ruleset.name().to_owned(),
        order: order.name(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::error::EvalError;
    use crate::pattern::{Pattern, PatternKind, rotate, square};

    fn sample() -> Ruleset {
        let x = Pattern::var("x", PatternKind::Cipher);
        let y = Pattern::var("y", PatternKind::Cipher);
        let n = Pattern::var("n", PatternKind::Raw);
        Ruleset::with_rules(
            "sample",
            [
                Rule::new("mul-to-square", &x * &x, square(&x)),
                Rule::new("square-to-mul", square(&x), &x * &x),
                Rule::new("commute", &x + &y, &y + &x),
                Rule::new("rotate-zero", rotate(&x, &n), x.clone())
                    .with_condition(n.equal_to(&Pattern::raw(0))),
                Rule::dynamic("expand", square(&y), |_, _| {
                    Err(EvalError::Invalid {
                        message: "unused".to_owned(),
                    })
                }),
            ],
        )
    }

    #[test]
    fn report_lists_verdicts_by_root_op() {
        let report = check_ruleset(&sample(), &LexicoProductOrder::ops_cost());
        assert_snapshot!(report, @r"
        ruleset sample (order ops_cost)
        add rules:
          commute: (x + y) => (y + x)
            unordered
        mul rules:
          mul-to-square: (x * x) => square(x)
            accepted by mul_count
        rotate rules:
          rotate-zero: rotate(x, n) => x if (n == 0)
            accepted by rotate_count
        square rules:
          square-to-mul: square(x) => (x * x)
            rejected by mul_count
          expand: square(y) => <dynamic>
            dynamic rhs, invariants needed
        2 accepted, 1 rejected, 1 unordered, 0 need conditions, 1 dynamic
        ");
    }

    #[test]
    fn strict_mode_reports_first_failure() {
        let report = check_ruleset(&sample(), &LexicoProductOrder::ops_cost());
        let failing: Vec<&str> = report.failures().map(|r| r.name.as_str()).collect();
        assert_eq!(failing, vec!["commute", "square-to-mul"]);
        assert!(!report.is_sound());

        let err = report.into_strict().unwrap_err();
        assert_eq!(
            err,
            SoundnessError::Unordered {
                rule: "commute".to_owned(),
                order: "ops_cost".to_owned()
            }
        );
    }

    #[test]
    fn conditioned_rule_is_noted() {
        let x = Pattern::var("x", PatternKind::Cipher);
        let y = Pattern::var("y", PatternKind::Cipher);
        let guarded = Rule::new("keep-left", &x * &y, square(&x))
            .with_condition(crate::pattern::single_use(&y));
        assert_eq!(
            check_rule(&guarded, &LexicoProductOrder::depth()),
            RuleVerdict::NeedsCondition {
                component: "xdepth",
                has_condition: true
            }
        );
    }

    #[test]
    fn equal_sides_are_unordered() {
        let x = Pattern::var("x", PatternKind::Cipher);
        let rule = Rule::new("noop", square(&x), square(&x));
        let verdict = check_rule(&rule, &LexicoProductOrder::joined());
        assert_eq!(verdict, RuleVerdict::Unordered);
        assert!(verdict.is_failure());
    }
}
