//! Term rewriting for loom-ir circuits.
//!
//! - [`pattern`]: pattern trees with free variables, literals and
//!   side-computation calls
//! - [`matcher`] and [`eval`]: structural matching and condition evaluation
//! - [`substitute`]: materializing a right-hand side in the graph
//! - [`rewriter`]: fixpoint driver applying a [`Ruleset`]
//! - [`order`] and [`check`]: cost orders proving that rules terminate
//! - [`rulesets`]: built-in rulesets

pub mod check;
pub mod error;
pub mod eval;
pub mod matcher;
pub mod order;
pub mod pattern;
pub mod rewriter;
pub mod rule;
pub mod rulesets;
pub mod side;
pub mod substitute;

pub use check::{CheckReport, RuleReport, RuleVerdict, check_rule, check_ruleset};
pub use error::{EvalError, RewriteError, SoundnessError, SubstituteError};
pub use eval::{arithmetic_eval, evaluate_condition};
pub use matcher::{MatchingMap, match_term};
pub use order::{CompResult, LexicoProductOrder, OrderFn, Verdict};
pub use pattern::{Pattern, PatternKind, PatternVar};
pub use rewriter::{RewriteConfig, RewriteStats, Rewriter, Traversal};
pub use rule::{DynamicRhs, Rhs, Rule, Ruleset};
pub use side::SideComputation;
pub use substitute::substitute;
