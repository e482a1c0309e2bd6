//! Opcodes, term kinds and literal values.

use std::fmt;

use crate::error::{IrError, IrResult};

// ============================================================================
// OpCode
// ============================================================================

/// Operation performed by a term.
///
/// Leaves (inputs, constants, raw literals) carry [`OpCode::Undefined`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpCode {
    Undefined,
    Assign,
    Encrypt,
    Add,
    AddPlain,
    Mul,
    MulPlain,
    Sub,
    SubPlain,
    Rotate,
    RotateRows,
    RotateColumns,
    Square,
    Negate,
    Exponentiate,
    ModSwitch,
    Relinearize,
    Rescale,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
}

impl OpCode {
    pub const ALL: [OpCode; 27] = [
        OpCode::Undefined,
        OpCode::Assign,
        OpCode::Encrypt,
        OpCode::Add,
        OpCode::AddPlain,
        OpCode::Mul,
        OpCode::MulPlain,
        OpCode::Sub,
        OpCode::SubPlain,
        OpCode::Rotate,
        OpCode::RotateRows,
        OpCode::RotateColumns,
        OpCode::Square,
        OpCode::Negate,
        OpCode::Exponentiate,
        OpCode::ModSwitch,
        OpCode::Relinearize,
        OpCode::Rescale,
        OpCode::LessThan,
        OpCode::LessEqual,
        OpCode::GreaterThan,
        OpCode::GreaterEqual,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::And,
        OpCode::Or,
        OpCode::Not,
    ];

    /// Name used by the textual circuit format.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Undefined => "undefined",
            OpCode::Assign => "assign",
            OpCode::Encrypt => "encrypt",
            OpCode::Add => "add",
            OpCode::AddPlain => "add_plain",
            OpCode::Mul => "mul",
            OpCode::MulPlain => "mul_plain",
            OpCode::Sub => "sub",
            OpCode::SubPlain => "sub_plain",
            OpCode::Rotate => "rotate",
            OpCode::RotateRows => "rotate_rows",
            OpCode::RotateColumns => "rotate_columns",
            OpCode::Square => "square",
            OpCode::Negate => "negate",
            OpCode::Exponentiate => "exponentiate",
            OpCode::ModSwitch => "modswitch",
            OpCode::Relinearize => "relinearize",
            OpCode::Rescale => "rescale",
            OpCode::LessThan => "lt",
            OpCode::LessEqual => "le",
            OpCode::GreaterThan => "gt",
            OpCode::GreaterEqual => "ge",
            OpCode::Equal => "eq",
            OpCode::NotEqual => "ne",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<OpCode> {
        OpCode::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Number of operands a term with this opcode must have.
    pub fn arity(self) -> usize {
        match self {
            OpCode::Undefined => 0,
            OpCode::Assign
            | OpCode::Encrypt
            | OpCode::Square
            | OpCode::Negate
            | OpCode::ModSwitch
            | OpCode::Relinearize
            | OpCode::Rescale
            | OpCode::Not => 1,
            OpCode::Add
            | OpCode::AddPlain
            | OpCode::Mul
            | OpCode::MulPlain
            | OpCode::Sub
            | OpCode::SubPlain
            | OpCode::Rotate
            | OpCode::RotateRows
            | OpCode::RotateColumns
            | OpCode::Exponentiate
            | OpCode::LessThan
            | OpCode::LessEqual
            | OpCode::GreaterThan
            | OpCode::GreaterEqual
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::And
            | OpCode::Or => 2,
        }
    }

    /// Whether swapping the operands preserves the meaning of the operation.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::AddPlain
                | OpCode::Mul
                | OpCode::MulPlain
                | OpCode::Equal
                | OpCode::NotEqual
                | OpCode::And
                | OpCode::Or
        )
    }

    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            OpCode::Rotate | OpCode::RotateRows | OpCode::RotateColumns
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            OpCode::LessThan
                | OpCode::LessEqual
                | OpCode::GreaterThan
                | OpCode::GreaterEqual
                | OpCode::Equal
                | OpCode::NotEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, OpCode::And | OpCode::Or | OpCode::Not)
    }

    /// Additive homomorphic operations (`add`, `sub`, their plaintext forms, `negate`).
    pub fn is_additive(self) -> bool {
        matches!(
            self,
            OpCode::Add | OpCode::AddPlain | OpCode::Sub | OpCode::SubPlain | OpCode::Negate
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TermKind
// ============================================================================

/// Semantic category of the value a term produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKind {
    /// Encrypted value.
    Ciphertext,
    /// Encoded plaintext vector.
    Plaintext,
    /// Plaintext scalar.
    Scalar,
    /// Raw numeric literal (rotation steps, exponents).
    RawData,
    Boolean,
}

impl TermKind {
    pub fn name(self) -> &'static str {
        match self {
            TermKind::Ciphertext => "cipher",
            TermKind::Plaintext => "plain",
            TermKind::Scalar => "scalar",
            TermKind::RawData => "raw",
            TermKind::Boolean => "bool",
        }
    }

    pub fn from_name(name: &str) -> Option<TermKind> {
        [
            TermKind::Ciphertext,
            TermKind::Plaintext,
            TermKind::Scalar,
            TermKind::RawData,
            TermKind::Boolean,
        ]
        .into_iter()
        .find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deduce the kind of an operation term from the kinds of its operands.
///
/// Encrypted dominates plaintext, plaintext dominates scalar, scalar
/// dominates raw data. Comparisons produce booleans; logical connectives
/// require boolean operands.
pub fn deduce_kind(op: OpCode, operands: &[TermKind]) -> IrResult<TermKind> {
    if op.is_logical() {
        if let Some(&kind) = operands.iter().find(|k| **k != TermKind::Boolean) {
            return Err(IrError::KindMismatch { op, kind });
        }
        return Ok(TermKind::Boolean);
    }
    if let Some(&kind) = operands.iter().find(|k| **k == TermKind::Boolean) {
        return Err(IrError::KindMismatch { op, kind });
    }
    if op.is_relational() {
        return Ok(TermKind::Boolean);
    }
    if op == OpCode::Encrypt {
        return Ok(TermKind::Ciphertext);
    }
    let deduced = [
        TermKind::Ciphertext,
        TermKind::Plaintext,
        TermKind::Scalar,
        TermKind::RawData,
    ]
    .into_iter()
    .find(|kind| operands.contains(kind));
    deduced.ok_or(IrError::ArityMismatch {
        op,
        expected: op.arity(),
        found: 0,
    })
}

// ============================================================================
// ConstantValue
// ============================================================================

/// Literal held by a constants-table entry.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl ConstantValue {
    /// Kind of the leaf that holds this value.
    pub fn kind(&self) -> TermKind {
        match self {
            ConstantValue::Scalar(_) => TermKind::Scalar,
            ConstantValue::Vector(_) => TermKind::Plaintext,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ConstantValue::Scalar(v) => Some(*v),
            ConstantValue::Vector(_) => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Scalar(v) => write!(f, "{v}"),
            ConstantValue::Vector(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}
