//! Optimization pipeline.
//!
//! ```text
//! source ─► parse_circuit ─► Program
//!     │
//!     ▼
//! Rewriter (ruleset, traversal) ─► Program (rewritten)
//!     │
//!     ▼
//! eliminate_common_subexpressions ─► Program (canonical operands, shared terms)
//!     │
//!     ▼
//! eliminate_dead_terms ─► Program (only what the outputs need)
//!     │
//!     ▼
//! verify ─► optimized Program
//! ```
//!
//! A consistency error during rewriting aborts the whole pipeline; the
//! program is not returned in that case.

use std::fmt;

use derive_more::{Display, Error, From};
use loom_ir::analysis::{self, OpStats};
use loom_ir::{IrError, ParseError, Program, ValidationResult, parse_circuit, verify};
use loom_passes::{CseStats, eliminate_common_subexpressions, eliminate_dead_terms};
use loom_trs::rulesets;
use loom_trs::{
    CheckReport, LexicoProductOrder, RewriteConfig, RewriteError, RewriteStats, Rewriter,
    SoundnessError, check_ruleset,
};

#[derive(Debug, Display, Error, From)]
pub enum PipelineError {
    #[display("{_0}")]
    Parse(ParseError),

    #[display("{_0}")]
    Rewrite(RewriteError),

    #[display("{_0}")]
    Graph(IrError),

    #[display("{_0}")]
    Soundness(SoundnessError),

    #[from(ignore)]
    #[display("unknown ruleset `{name}`")]
    UnknownRuleset { name: String },

    #[from(ignore)]
    #[display("optimized circuit is inconsistent: {report}")]
    Invalid { report: ValidationResult },
}

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Name of a built-in ruleset.
    pub ruleset: String,
    pub rewrite: RewriteConfig,
    /// Run common-subexpression elimination after rewriting.
    pub cse: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ruleset: "simplify".to_owned(),
            rewrite: RewriteConfig::default(),
            cse: true,
        }
    }
}

/// What the pipeline did to a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    pub rewrite: RewriteStats,
    pub cse: Option<CseStats>,
    pub removed: usize,
    pub before: CircuitMetrics,
    pub after: CircuitMetrics,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitMetrics {
    pub depth: u32,
    pub ops: OpStats,
}

impl CircuitMetrics {
    pub fn measure(program: &Program) -> Self {
        Self {
            depth: analysis::multiplicative_depth(program),
            ops: analysis::op_stats(program),
        }
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rewrites: {} in {} iteration(s)",
            self.rewrite.total_changes, self.rewrite.iterations
        )?;
        if !self.rewrite.reached_fixpoint {
            f.write_str(" (iteration limit reached)")?;
        }
        writeln!(f)?;
        for (rule, count) in &self.rewrite.applied {
            writeln!(f, "  {rule}: {count}")?;
        }
        if self.rewrite.rejected > 0 {
            writeln!(f, "rejected attempts: {}", self.rewrite.rejected)?;
        }
        if let Some(cse) = &self.cse {
            writeln!(f, "cse: {} reordered, {} merged", cse.reordered, cse.merged)?;
        }
        writeln!(f, "dead terms removed: {}", self.removed)?;
        write!(
            f,
            "depth: {} -> {}, operations: {} -> {}, rotations: {} -> {}",
            self.before.depth,
            self.after.depth,
            self.before.ops.operations,
            self.after.ops.operations,
            self.before.ops.rotations,
            self.after.ops.rotations,
        )
    }
}

/// Optimize `program` in place.
pub fn optimize(
    program: &mut Program,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    let ruleset =
        rulesets::builtin(&config.ruleset).ok_or_else(|| PipelineError::UnknownRuleset {
            name: config.ruleset.clone(),
        })?;
    let before = CircuitMetrics::measure(program);

    let rewrite = Rewriter::new(&ruleset, config.rewrite.clone()).rewrite(program)?;
    let cse = if config.cse {
        Some(eliminate_common_subexpressions(program)?)
    } else {
        None
    };
    let removed = eliminate_dead_terms(program).removed_count;

    let report = verify(program);
    if !report.is_ok() {
        return Err(PipelineError::Invalid { report });
    }

    let after = CircuitMetrics::measure(program);
    tracing::info!(
        circuit = program.name(),
        depth_before = before.depth,
        depth_after = after.depth,
        "circuit optimized"
    );
    Ok(PipelineReport {
        rewrite,
        cse,
        removed,
        before,
        after,
    })
}

/// Parse `source` and optimize the resulting circuit.
pub fn optimize_source(
    source: &str,
    config: &PipelineConfig,
) -> Result<(Program, PipelineReport), PipelineError> {
    let mut program = parse_circuit(source)?;
    let report = optimize(&mut program, config)?;
    Ok((program, report))
}

/// Check a built-in ruleset against a named order.
///
/// In strict mode a rejected or unordered rule is an error.
pub fn check_builtin_ruleset(
    ruleset: &str,
    order: &str,
    strict: bool,
) -> Result<CheckReport, PipelineError> {
    let rules = rulesets::builtin(ruleset).ok_or_else(|| PipelineError::UnknownRuleset {
        name: ruleset.to_owned(),
    })?;
    let order = LexicoProductOrder::by_name(order)?;
    let report = check_ruleset(&rules, &order);
    if strict {
        return Ok(report.into_strict()?);
    }
    Ok(report)
}
