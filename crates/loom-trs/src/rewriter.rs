//! Rewriting driver.
//!
//! Fixpoint iteration that applies a [`Ruleset`] to every term reachable
//! from the program outputs. Each iteration snapshots the traversal order
//! and skips terms erased by earlier rewrites in the same sweep; at most one
//! rule is applied per term per iteration.

use std::collections::BTreeMap;

use loom_ir::{Program, TermId, walk};

use crate::error::{RewriteError, SubstituteError};
use crate::eval::evaluate_condition;
use crate::matcher::{MatchingMap, match_term};
use crate::pattern::Pattern;
use crate::rule::{Rule, Ruleset};
use crate::substitute::substitute;

/// Order in which terms are visited during one iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Traversal {
    /// Operands before users.
    #[default]
    BottomUp,
    /// Users before operands.
    TopDown,
}

#[derive(Clone, Debug)]
pub struct RewriteConfig {
    pub traversal: Traversal,
    pub max_iterations: usize,
    /// Only apply a rule when every non-root operation matched by its LHS
    /// binds a term with a single parent.
    pub circuit_saving: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            traversal: Traversal::BottomUp,
            max_iterations: 64,
            circuit_saving: false,
        }
    }
}

/// Result of a rewrite run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Number of fixpoint iterations performed.
    pub iterations: usize,
    /// Applications per rule name.
    pub applied: BTreeMap<String, usize>,
    /// Total number of rewrites applied.
    pub total_changes: usize,
    /// Rule attempts dropped because evaluation failed.
    pub rejected: usize,
    /// Whether the fixpoint was reached (no changes in last iteration).
    pub reached_fixpoint: bool,
}

pub struct Rewriter<'a> {
    ruleset: &'a Ruleset,
    config: RewriteConfig,
}

enum Attempt {
    Applied,
    Skipped,
}

impl<'a> Rewriter<'a> {
    pub fn new(ruleset: &'a Ruleset, config: RewriteConfig) -> Self {
        Self { ruleset, config }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrite `program` until no rule applies or the iteration limit is hit.
    pub fn rewrite(&self, program: &mut Program) -> Result<RewriteStats, RewriteError> {
        let mut stats = RewriteStats::default();

        for _ in 0..self.config.max_iterations {
            stats.iterations += 1;
            let changes = self.run_one_iteration(program, &mut stats)?;
            stats.total_changes += changes;
            if changes == 0 {
                stats.reached_fixpoint = true;
                break;
            }
        }

        tracing::info!(
            ruleset = self.ruleset.name(),
            iterations = stats.iterations,
            changes = stats.total_changes,
            fixpoint = stats.reached_fixpoint,
            "rewriting finished"
        );
        Ok(stats)
    }

    fn run_one_iteration(
        &self,
        program: &mut Program,
        stats: &mut RewriteStats,
    ) -> Result<usize, RewriteError> {
        let roots: Vec<TermId> = program.outputs().iter().map(|o| o.term).collect();
        let mut order = walk::post_order(program, &roots);
        if self.config.traversal == Traversal::TopDown {
            order.reverse();
        }

        let mut changes = 0;
        for term in order {
            // Skip terms erased by an earlier rewrite in this sweep
            if !program.is_live(term) || program.term(term).is_leaf() {
                continue;
            }
            for rule in self.ruleset.rules_for(program.op(term)) {
                match self.try_rule(rule, term, program, stats)? {
                    Attempt::Applied => {
                        *stats.applied.entry(rule.name().to_owned()).or_default() += 1;
                        changes += 1;
                        break; // Only apply one rule per term per iteration
                    }
                    Attempt::Skipped => {}
                }
            }
        }
        Ok(changes)
    }

    fn try_rule(
        &self,
        rule: &Rule,
        term: TermId,
        program: &mut Program,
        stats: &mut RewriteStats,
    ) -> Result<Attempt, RewriteError> {
        let Some(mut bindings) = match_term(rule.lhs(), term, program) else {
            return Ok(Attempt::Skipped);
        };

        if self.config.circuit_saving && !circuit_saving_condition(rule.lhs(), &bindings, program)
        {
            tracing::trace!(rule = rule.name(), term = program.label(term), "circuit saving");
            return Ok(Attempt::Skipped);
        }

        if let Some(condition) = rule.condition() {
            match evaluate_condition(condition, &bindings, program) {
                Ok(true) => {}
                Ok(false) => return Ok(Attempt::Skipped),
                Err(err) => {
                    tracing::warn!(
                        rule = rule.name(),
                        term = program.label(term),
                        error = %err,
                        "condition could not be evaluated, rule skipped"
                    );
                    stats.rejected += 1;
                    return Ok(Attempt::Skipped);
                }
            }
        }

        let rhs = match rule.resolve_rhs(&bindings, program) {
            Ok(rhs) => rhs,
            Err(err) => {
                tracing::warn!(
                    rule = rule.name(),
                    term = program.label(term),
                    error = %err,
                    "right-hand side could not be computed, rule skipped"
                );
                stats.rejected += 1;
                return Ok(Attempt::Skipped);
            }
        };

        let label = program.label(term).to_owned();
        match substitute(term, &mut bindings, &rhs, program) {
            Ok(true) => {
                tracing::debug!(rule = rule.name(), term = %label, "rewrite applied");
                Ok(Attempt::Applied)
            }
            Ok(false) => Ok(Attempt::Skipped),
            Err(SubstituteError::Eval(err)) => {
                tracing::warn!(rule = rule.name(), term = %label, error = %err, "rule skipped");
                stats.rejected += 1;
                Ok(Attempt::Skipped)
            }
            Err(err @ (SubstituteError::KindChanged { .. } | SubstituteError::IllFormed { .. })) => {
                tracing::warn!(rule = rule.name(), term = %label, error = %err, "rule skipped");
                stats.rejected += 1;
                Ok(Attempt::Skipped)
            }
            Err(SubstituteError::MissingLiteral { pattern }) => Err(RewriteError::Build {
                rule: rule.name().to_owned(),
                term: label,
                reason: format!("right-hand side leaf `{pattern}` is neither bound nor a literal"),
            }),
            Err(SubstituteError::Graph(source)) => Err(RewriteError::Consistency {
                rule: rule.name().to_owned(),
                term: label,
                source,
            }),
        }
    }
}

/// Every operation matched below the LHS root binds a single-parent term.
pub fn circuit_saving_condition(lhs: &Pattern, bindings: &MatchingMap, program: &Program) -> bool {
    lhs.subterms()
        .skip(1)
        .filter(|sub| sub.is_operation())
        .all(|sub| match bindings.term_of(sub) {
            Some(term) => program.parents(term).len() <= 1,
            None => false,
        })
}
