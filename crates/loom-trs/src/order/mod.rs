//! Rewrite orders used to validate rulesets.
//!
//! A rule `lhs => rhs` is safe to apply left to right when a well-founded
//! cost strictly decreases from `lhs` to `rhs` for every possible binding
//! of its variables. [`LexicoProductOrder`] combines the primitive orders
//! from [`primitive`] in priority sequence.

pub mod primitive;

use std::fmt;

use crate::error::SoundnessError;
use crate::pattern::Pattern;

/// Outcome of comparing a left-hand side against a right-hand side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompResult {
    Less,
    Equal,
    Greater,
    /// The outcome depends on what the variables bind to.
    NotGeneralizable,
}

impl CompResult {
    /// Result of the comparison with both sides swapped.
    pub fn reverse(self) -> Self {
        match self {
            CompResult::Less => CompResult::Greater,
            CompResult::Greater => CompResult::Less,
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompResult::Less => "less",
            CompResult::Equal => "equal",
            CompResult::Greater => "greater",
            CompResult::NotGeneralizable => "not_generalizable",
        }
    }
}

impl fmt::Display for CompResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive order.
pub type OrderFn = fn(&Pattern, &Pattern) -> CompResult;

/// Result of a lexicographic comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub result: CompResult,
    /// Component that decided the result; `None` when every one was equal.
    pub component: Option<&'static str>,
}

/// Named primitive orders compared in priority sequence.
#[derive(Clone, Debug)]
pub struct LexicoProductOrder {
    name: &'static str,
    components: Vec<(&'static str, OrderFn)>,
}

impl LexicoProductOrder {
    pub fn new(name: &'static str, components: Vec<(&'static str, OrderFn)>) -> Self {
        Self { name, components }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn components(&self) -> &[(&'static str, OrderFn)] {
        &self.components
    }

    /// Compare with the first decisive component; `NotGeneralizable`
    /// stops the comparison.
    pub fn compare(&self, lhs: &Pattern, rhs: &Pattern) -> Verdict {
        for &(component, order) in &self.components {
            let result = order(lhs, rhs);
            tracing::trace!(order = self.name, component, %result, "component compared");
            if result != CompResult::Equal {
                return Verdict {
                    result,
                    component: Some(component),
                };
            }
        }
        Verdict {
            result: CompResult::Equal,
            component: None,
        }
    }

    /// Depth first: multiplicative depth, then overall ciphertext depth.
    pub fn depth() -> Self {
        Self::new("depth", depth_components())
    }

    /// Operation counts weighted by their runtime cost.
    pub fn ops_cost() -> Self {
        Self::new("ops_cost", ops_cost_components())
    }

    /// `depth` followed by `ops_cost`.
    pub fn joined() -> Self {
        let mut components = depth_components();
        components.extend(ops_cost_components());
        Self::new("joined", components)
    }

    pub fn by_name(name: &str) -> Result<Self, SoundnessError> {
        match name {
            "depth" => Ok(Self::depth()),
            "ops_cost" | "ops-cost" => Ok(Self::ops_cost()),
            "joined" => Ok(Self::joined()),
            _ => Err(SoundnessError::UnknownOrder {
                name: name.to_owned(),
            }),
        }
    }
}

fn depth_components() -> Vec<(&'static str, OrderFn)> {
    vec![
        ("xdepth", primitive::xdepth),
        ("depth", primitive::depth),
    ]
}

fn ops_cost_components() -> Vec<(&'static str, OrderFn)> {
    vec![
        ("mul_count", primitive::mul_count),
        ("square_count", primitive::square_count),
        ("rotate_count", primitive::rotate_count),
        ("relin_count", primitive::relin_count),
        ("mul_plain_count", primitive::mul_plain_count),
        ("he_add_count", primitive::he_add_count),
        ("sum_rotation_steps", primitive::sum_rotation_steps),
        ("cipher_cipher_op_count", primitive::cipher_cipher_op_count),
        ("plain_plain_op_count", primitive::plain_plain_op_count),
        ("const_op_count", primitive::const_op_count),
        ("leaves_count", primitive::leaves_count),
        ("rotate_phi_str", primitive::rotate_phi_str),
        ("const_phi_str", primitive::const_phi_str),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use proptest::prelude::*;

    use super::*;
    use crate::pattern::{PatternKind, relinearize, rotate, square};

    #[test]
    fn mul_to_square_is_decided_by_mul_count() {
        let x = Pattern::var("x", PatternKind::Cipher);
        let order = LexicoProductOrder::joined();
        let verdict = order.compare(&(&x * &x), &square(&x));
        assert_eq!(verdict.result, CompResult::Greater);
        assert_eq!(verdict.component, Some("mul_count"));

        let verdict = order.compare(&square(&x), &(&x * &x));
        assert_eq!(verdict.result, CompResult::Less);
    }

    #[test]
    fn identical_sides_are_equal() {
        let x = Pattern::var("x", PatternKind::Cipher);
        let verdict = LexicoProductOrder::ops_cost().compare(&x, &x);
        assert_eq!(
            verdict,
            Verdict {
                result: CompResult::Equal,
                component: None
            }
        );
    }

    #[test]
    fn not_generalizable_stops_comparison() {
        let x = Pattern::var("x", PatternKind::Cipher);
        let y = Pattern::var("y", PatternKind::Cipher);
        let verdict = LexicoProductOrder::depth().compare(&x, &y);
        assert_eq!(verdict.result, CompResult::NotGeneralizable);
        assert_eq!(verdict.component, Some("xdepth"));
    }

    #[test]
    fn orders_resolve_by_name() {
        assert_eq!(LexicoProductOrder::by_name("ops-cost").unwrap().name(), "ops_cost");
        assert_eq!(LexicoProductOrder::joined().components().len(), 15);
        assert_eq!(
            LexicoProductOrder::by_name("size").unwrap_err(),
            SoundnessError::UnknownOrder {
                name: "size".to_owned()
            }
        );
    }

    static VARS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
        vec![
            Pattern::var("x", PatternKind::Cipher),
            Pattern::var("y", PatternKind::Cipher),
            Pattern::var("p", PatternKind::Plain),
            Pattern::var("c", PatternKind::Const),
            Pattern::var("a", PatternKind::Any),
        ]
    });

    fn arb_pattern() -> impl Strategy<Value = Pattern> {
        let leaf = prop_oneof![
            (0..VARS.len()).prop_map(|i| VARS[i].clone()),
            (-3i64..4).prop_map(Pattern::raw),
            (0u8..3).prop_map(|v| Pattern::scalar(f64::from(v))),
        ];
        leaf.prop_recursive(4, 24, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| &a * &b),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| &a + &b),
                (inner.clone(), -3i64..4).prop_map(|(a, n)| rotate(&a, &Pattern::raw(n))),
                inner.clone().prop_map(|a| square(&a)),
                inner.prop_map(|a| relinearize(&a)),
            ]
        })
    }

    proptest! {
        #[test]
        fn every_component_is_reflexive(t in arb_pattern()) {
            for (name, order) in LexicoProductOrder::joined().components() {
                prop_assert_eq!(order(&t, &t), CompResult::Equal, "{}", name);
            }
        }

        #[test]
        fn every_component_is_antisymmetric(a in arb_pattern(), b in arb_pattern()) {
            for (name, order) in LexicoProductOrder::joined().components() {
                let forward = order(&a, &b);
                let backward = order(&b, &a);
                prop_assert_eq!(forward, backward.reverse(), "{}", name);
            }
        }
    }
}
