//! Pattern terms.
//!
//! A [`Pattern`] is a tree describing a class of IR subgraphs. Leaves are
//! either free variables (restricted by a [`PatternKind`]) or literals;
//! interior nodes carry an [`OpCode`] or a [`SideComputation`] call.
//!
//! Every pattern node has a [`PatternVar`] used as its key in a
//! [`MatchingMap`](crate::MatchingMap). Cloning a pattern keeps its
//! variables, so using the same pattern twice in a rule refers to the same
//! IR term:
//!
//! ```
//! use loom_trs::pattern::{Pattern, PatternKind, square};
//!
//! let x = Pattern::var("x", PatternKind::Cipher);
//! let lhs = &x * &x;
//! let rhs = square(&x);
//! assert_eq!(lhs.to_string(), "(x * x)");
//! assert_eq!(rhs.to_string(), "square(x)");
//! ```

use std::fmt;
use std::ops;
use std::sync::atomic::{AtomicU32, Ordering};

use loom_ir::{ConstantValue, OpCode, TermKind};

use crate::side::SideComputation;

// ============================================================================
// PatternVar
// ============================================================================

/// Key of a pattern node in a binding map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternVar(u32);

static NEXT_VAR: AtomicU32 = AtomicU32::new(0);

impl PatternVar {
    fn fresh() -> Self {
        PatternVar(NEXT_VAR.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PatternVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================================================
// PatternKind
// ============================================================================

/// Set of IR kinds a pattern leaf may bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Any,
    Cipher,
    /// Encoded plaintext or plaintext scalar.
    Plain,
    /// Plaintext or scalar leaf with a constants-table entry.
    Const,
    Scalar,
    Raw,
    /// Scalar or raw data.
    Numeric,
    Boolean,
}

impl PatternKind {
    pub fn admits(self, kind: TermKind) -> bool {
        match self {
            PatternKind::Any => true,
            PatternKind::Cipher => kind == TermKind::Ciphertext,
            PatternKind::Plain | PatternKind::Const => {
                matches!(kind, TermKind::Plaintext | TermKind::Scalar)
            }
            PatternKind::Scalar => kind == TermKind::Scalar,
            PatternKind::Raw => kind == TermKind::RawData,
            PatternKind::Numeric => matches!(kind, TermKind::Scalar | TermKind::RawData),
            PatternKind::Boolean => kind == TermKind::Boolean,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Any => "any",
            PatternKind::Cipher => "cipher",
            PatternKind::Plain => "plain",
            PatternKind::Const => "const",
            PatternKind::Scalar => "scalar",
            PatternKind::Raw => "raw",
            PatternKind::Numeric => "numeric",
            PatternKind::Boolean => "bool",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Pattern
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    var: PatternVar,
    name: Option<String>,
    op: OpCode,
    kind: PatternKind,
    value: Option<ConstantValue>,
    function: Option<SideComputation>,
    operands: Vec<Pattern>,
}

impl Pattern {
    fn leaf(name: Option<String>, kind: PatternKind, value: Option<ConstantValue>) -> Self {
        Self {
            var: PatternVar::fresh(),
            name,
            op: OpCode::Undefined,
            kind,
            value,
            function: None,
            operands: Vec::new(),
        }
    }

    /// Free variable binding any IR term admitted by `kind`.
    pub fn var(name: impl Into<String>, kind: PatternKind) -> Self {
        Self::leaf(Some(name.into()), kind, None)
    }

    /// Scalar literal; matches scalar constants holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::leaf(None, PatternKind::Const, Some(ConstantValue::Scalar(value)))
    }

    /// Plaintext vector literal.
    pub fn vector(values: Vec<f64>) -> Self {
        Self::leaf(None, PatternKind::Const, Some(ConstantValue::Vector(values)))
    }

    /// Scalar or vector literal.
    pub fn constant(value: ConstantValue) -> Self {
        Self::leaf(None, PatternKind::Const, Some(value))
    }

    /// Raw-data literal such as a rotation step.
    pub fn raw(value: i64) -> Self {
        Self::leaf(
            None,
            PatternKind::Raw,
            Some(ConstantValue::Scalar(value as f64)),
        )
    }

    /// Boolean literal, only meaningful inside conditions.
    pub fn boolean(value: bool) -> Self {
        Self::leaf(
            None,
            PatternKind::Boolean,
            Some(ConstantValue::Scalar(if value { 1.0 } else { 0.0 })),
        )
    }

    /// Operation pattern. The operand count must equal the opcode's arity.
    pub fn op(op: OpCode, operands: Vec<Pattern>) -> Self {
        debug_assert_eq!(op.arity(), operands.len(), "arity mismatch for {op}");
        Self {
            var: PatternVar::fresh(),
            name: None,
            op,
            kind: PatternKind::Any,
            value: None,
            function: None,
            operands,
        }
    }

    /// Side-computation applied to `arg`.
    pub fn call(function: SideComputation, arg: &Pattern) -> Self {
        Self {
            var: PatternVar::fresh(),
            name: None,
            op: OpCode::Undefined,
            kind: PatternKind::Any,
            value: None,
            function: Some(function),
            operands: vec![arg.clone()],
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn var_id(&self) -> PatternVar {
        self.var
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn op_code(&self) -> OpCode {
        self.op
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn value(&self) -> Option<&ConstantValue> {
        self.value.as_ref()
    }

    pub fn function(&self) -> Option<SideComputation> {
        self.function
    }

    pub fn operands(&self) -> &[Pattern] {
        &self.operands
    }

    pub fn is_operation(&self) -> bool {
        self.op != OpCode::Undefined
    }

    pub fn is_call(&self) -> bool {
        self.function.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_operation() && !self.is_call()
    }

    pub fn is_literal(&self) -> bool {
        self.is_leaf() && self.value.is_some()
    }

    /// Free variable leaf (no literal).
    pub fn is_variable(&self) -> bool {
        self.is_leaf() && self.value.is_none()
    }

    /// Pre-order iterator over this pattern and its descendants.
    pub fn subterms(&self) -> Subterms<'_> {
        Subterms { stack: vec![self] }
    }

    /// Human-readable name: the variable name, or the node's key.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.var.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Condition builders
    // ------------------------------------------------------------------

    pub fn less_than(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::LessThan, vec![self.clone(), rhs.clone()])
    }

    pub fn less_equal(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::LessEqual, vec![self.clone(), rhs.clone()])
    }

    pub fn greater_than(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::GreaterThan, vec![self.clone(), rhs.clone()])
    }

    pub fn greater_equal(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::GreaterEqual, vec![self.clone(), rhs.clone()])
    }

    pub fn equal_to(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::Equal, vec![self.clone(), rhs.clone()])
    }

    pub fn not_equal_to(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::NotEqual, vec![self.clone(), rhs.clone()])
    }

    pub fn and(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::And, vec![self.clone(), rhs.clone()])
    }

    pub fn or(&self, rhs: &Pattern) -> Pattern {
        Pattern::op(OpCode::Or, vec![self.clone(), rhs.clone()])
    }
}

/// Pre-order traversal over a pattern tree.
pub struct Subterms<'a> {
    stack: Vec<&'a Pattern>,
}

impl<'a> Iterator for Subterms<'a> {
    type Item = &'a Pattern;

    fn next(&mut self) -> Option<&'a Pattern> {
        let next = self.stack.pop()?;
        self.stack.extend(next.operands.iter().rev());
        Some(next)
    }
}

// ============================================================================
// Named builders
// ============================================================================

macro_rules! unary_builders {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(x: &Pattern) -> Pattern {
                Pattern::op(OpCode::$op, vec![x.clone()])
            }
        )*
    };
}

macro_rules! binary_builders {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(a: &Pattern, b: &Pattern) -> Pattern {
                Pattern::op(OpCode::$op, vec![a.clone(), b.clone()])
            }
        )*
    };
}

unary_builders! {
    assign => Assign,
    encrypt => Encrypt,
    square => Square,
    negate => Negate,
    modswitch => ModSwitch,
    relinearize => Relinearize,
    rescale => Rescale,
}

binary_builders! {
    add => Add,
    sub => Sub,
    mul => Mul,
    add_plain => AddPlain,
    sub_plain => SubPlain,
    mul_plain => MulPlain,
    rotate => Rotate,
    rotate_rows => RotateRows,
    rotate_columns => RotateColumns,
    exponentiate => Exponentiate,
}

/// Constant folding of an arithmetic pattern.
pub fn fold(arg: &Pattern) -> Pattern {
    Pattern::call(SideComputation::Fold, arg)
}

/// Multiplicative depth of the term bound to `arg`.
pub fn mul_depth(arg: &Pattern) -> Pattern {
    Pattern::call(SideComputation::MulDepth, arg)
}

/// Whether the term bound to `arg` is a leaf or has at most one parent.
pub fn single_use(arg: &Pattern) -> Pattern {
    Pattern::call(SideComputation::SingleUse, arg)
}

/// Whether the term bound to `arg` has a constants-table entry.
pub fn is_const(arg: &Pattern) -> Pattern {
    Pattern::call(SideComputation::IsConstant, arg)
}

// ============================================================================
// Operator overloads
// ============================================================================

macro_rules! binary_overloads {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl ops::$trait<&Pattern> for &Pattern {
                type Output = Pattern;
                fn $method(self, rhs: &Pattern) -> Pattern {
                    Pattern::op(OpCode::$op, vec![self.clone(), rhs.clone()])
                }
            }

            impl ops::$trait<Pattern> for Pattern {
                type Output = Pattern;
                fn $method(self, rhs: Pattern) -> Pattern {
                    Pattern::op(OpCode::$op, vec![self, rhs])
                }
            }

            impl ops::$trait<&Pattern> for Pattern {
                type Output = Pattern;
                fn $method(self, rhs: &Pattern) -> Pattern {
                    Pattern::op(OpCode::$op, vec![self, rhs.clone()])
                }
            }

            impl ops::$trait<Pattern> for &Pattern {
                type Output = Pattern;
                fn $method(self, rhs: Pattern) -> Pattern {
                    Pattern::op(OpCode::$op, vec![self.clone(), rhs])
                }
            }
        )*
    };
}

binary_overloads! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
}

impl ops::Neg for &Pattern {
    type Output = Pattern;
    fn neg(self) -> Pattern {
        negate(self)
    }
}

impl ops::Neg for Pattern {
    type Output = Pattern;
    fn neg(self) -> Pattern {
        Pattern::op(OpCode::Negate, vec![self])
    }
}

impl ops::Not for &Pattern {
    type Output = Pattern;
    fn not(self) -> Pattern {
        Pattern::op(OpCode::Not, vec![self.clone()])
    }
}

impl ops::Not for Pattern {
    type Output = Pattern;
    fn not(self) -> Pattern {
        Pattern::op(OpCode::Not, vec![self])
    }
}

// ============================================================================
// Display (infix, explicit parentheses)
// ============================================================================

fn infix_symbol(op: OpCode) -> Option<&'static str> {
    Some(match op {
        OpCode::Add => "+",
        OpCode::Sub => "-",
        OpCode::Mul => "*",
        OpCode::LessThan => "<",
        OpCode::LessEqual => "<=",
        OpCode::GreaterThan => ">",
        OpCode::GreaterEqual => ">=",
        OpCode::Equal => "==",
        OpCode::NotEqual => "!=",
        OpCode::And => "&&",
        OpCode::Or => "||",
        _ => return None,
    })
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(function) = self.function {
            return write!(f, "{}({})", function.name(), self.operands[0]);
        }
        match self.op {
            OpCode::Undefined => match (&self.value, self.kind) {
                (Some(value), PatternKind::Boolean) => {
                    let truth = value.as_scalar().is_some_and(|v| v != 0.0);
                    write!(f, "{truth}")
                }
                (Some(value), _) => write!(f, "{value}"),
                (None, _) => f.write_str(&self.display_name()),
            },
            OpCode::Negate => write!(f, "(-{})", self.operands[0]),
            OpCode::Not => write!(f, "!{}", self.operands[0]),
            op => match infix_symbol(op) {
                Some(symbol) => write!(
                    f,
                    "({} {symbol} {})",
                    self.operands[0], self.operands[1]
                ),
                None => {
                    write!(f, "{op}(")?;
                    for (i, operand) in self.operands.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{operand}")?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}
