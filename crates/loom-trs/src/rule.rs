//! Rewrite rules and rulesets.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use loom_ir::{OpCode, Program};

use crate::error::EvalError;
use crate::matcher::MatchingMap;
use crate::pattern::Pattern;

/// Callback computing a right-hand side from the bindings of a match.
pub type DynamicRhs =
    Arc<dyn Fn(&MatchingMap, &Program) -> Result<Pattern, EvalError> + Send + Sync>;

#[derive(Clone)]
pub enum Rhs {
    Static(Pattern),
    Dynamic(DynamicRhs),
}

impl fmt::Debug for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Static(pattern) => f.debug_tuple("Static").field(pattern).finish(),
            Rhs::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A conditional rewrite step `lhs => rhs if condition`.
#[derive(Clone, Debug)]
pub struct Rule {
    name: String,
    lhs: Pattern,
    rhs: Rhs,
    condition: Option<Pattern>,
}

impl Rule {
    pub fn new(name: impl Into<String>, lhs: Pattern, rhs: Pattern) -> Self {
        Self {
            name: name.into(),
            lhs,
            rhs: Rhs::Static(rhs),
            condition: None,
        }
    }

    pub fn dynamic<F>(name: impl Into<String>, lhs: Pattern, rhs: F) -> Self
    where
        F: Fn(&MatchingMap, &Program) -> Result<Pattern, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            lhs,
            rhs: Rhs::Dynamic(Arc::new(rhs)),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Pattern) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lhs(&self) -> &Pattern {
        &self.lhs
    }

    pub fn rhs(&self) -> &Rhs {
        &self.rhs
    }

    /// The static right-hand side, if there is one.
    pub fn static_rhs(&self) -> Option<&Pattern> {
        match &self.rhs {
            Rhs::Static(pattern) => Some(pattern),
            Rhs::Dynamic(_) => None,
        }
    }

    pub fn has_dynamic_rhs(&self) -> bool {
        matches!(self.rhs, Rhs::Dynamic(_))
    }

    pub fn condition(&self) -> Option<&Pattern> {
        self.condition.as_ref()
    }

    pub fn root_op(&self) -> OpCode {
        self.lhs.op_code()
    }

    /// Right-hand side for a concrete match.
    pub fn resolve_rhs(
        &self,
        bindings: &MatchingMap,
        program: &Program,
    ) -> Result<Pattern, EvalError> {
        match &self.rhs {
            Rhs::Static(pattern) => Ok(pattern.clone()),
            Rhs::Dynamic(callback) => callback(bindings, program),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} => ", self.name, self.lhs)?;
        match &self.rhs {
            Rhs::Static(pattern) => write!(f, "{pattern}")?,
            Rhs::Dynamic(_) => f.write_str("<dynamic>")?,
        }
        if let Some(condition) = &self.condition {
            write!(f, " if {condition}")?;
        }
        Ok(())
    }
}

/// Named collection of rules indexed by the opcode of their LHS root.
///
/// Rules sharing a root opcode are tried in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Ruleset {
    name: String,
    rules: BTreeMap<OpCode, Vec<Rule>>,
}

impl Ruleset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rules(name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut ruleset = Self::new(name);
        for rule in rules {
            ruleset.add(rule);
        }
        ruleset
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.entry(rule.root_op()).or_default().push(rule);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules_for(&self, op: OpCode) -> &[Rule] {
        self.rules.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules_by_root_op(&self) -> impl Iterator<Item = (OpCode, &[Rule])> + '_ {
        self.rules.iter().map(|(op, rules)| (*op, rules.as_slice()))
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
