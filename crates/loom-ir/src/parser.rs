//! Textual circuit format parser.
//!
//! Parses the format produced by [`crate::printer`]:
//!
//! ```text
//! circuit @name {
//!   %x = input cipher
//!   %c = const 0
//!   %v = const [1, 2, 3]
//!   %t = add %x, %c
//!   %r = rotate %t, 3
//!   output %r as "out"
//! }
//! ```
//!
//! Bare integer operands denote raw-data literals (rotation steps,
//! exponents); they share one leaf per literal value.
//!
//! # Two-stage parsing
//!
//! 1. **Raw parse**: winnow combinators turn text into `Raw*` statements,
//!    each tagged with its byte offset.
//! 2. **Build**: `CircuitBuilder` resolves value names and creates terms,
//!    reporting graph errors at the offending statement.

use std::collections::HashMap;

use derive_more::{Display, Error};
use winnow::ascii;
use winnow::combinator::{alt, delimited, preceded, separated};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::program::Program;
use crate::refs::TermId;
use crate::types::{ConstantValue, OpCode, TermKind};

// ============================================================================
// Error type
// ============================================================================

/// Parse error for the circuit text format.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source text.
    pub offset: usize,
}

// ============================================================================
// Raw (unresolved) structures
// ============================================================================

#[derive(Debug, Clone)]
struct RawCircuit<'a> {
    name: String,
    statements: Vec<RawStatement<'a>>,
}

#[derive(Debug, Clone)]
struct RawStatement<'a> {
    offset: usize,
    kind: RawStatementKind<'a>,
}

#[derive(Debug, Clone)]
enum RawStatementKind<'a> {
    Input {
        result: &'a str,
        kind: &'a str,
    },
    Const {
        result: &'a str,
        value: ConstantValue,
    },
    Op {
        result: &'a str,
        op: &'a str,
        operands: Vec<RawOperand<'a>>,
    },
    Output {
        value: RawOperand<'a>,
        name: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum RawOperand<'a> {
    Value(&'a str),
    Raw(i64),
}

// ============================================================================
// Winnow parsers
// ============================================================================

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// Parse an identifier: [a-zA-Z_][a-zA-Z0-9_]*
fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Parse a value reference: %name
fn value_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(
        '%',
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
    .parse_next(input)
}

fn string_lit(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut result = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => break,
            '\\' => match any.parse_next(input)? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                escaped => result.push(escaped),
            },
            c => result.push(c),
        }
    }
    Ok(result)
}

fn number(input: &mut &str) -> ModalResult<f64> {
    ascii::float(input)
}

fn raw_literal(input: &mut &str) -> ModalResult<i64> {
    ascii::dec_int(input)
}

fn const_value(input: &mut &str) -> ModalResult<ConstantValue> {
    alt((
        delimited(
            ('[', ws),
            separated(0.., delimited(ws, number, ws), ','),
            (ws, ']'),
        )
        .map(ConstantValue::Vector),
        number.map(ConstantValue::Scalar),
    ))
    .parse_next(input)
}

fn operand<'a>(input: &mut &'a str) -> ModalResult<RawOperand<'a>> {
    alt((
        value_ref.map(RawOperand::Value),
        raw_literal.map(RawOperand::Raw),
    ))
    .parse_next(input)
}

/// `output %value as "name"` or `output 3 as "name"`
fn output_statement<'a>(input: &mut &'a str) -> ModalResult<RawStatementKind<'a>> {
    ("output", ws, operand, ws, "as", ws, string_lit)
        .map(|(_, _, value, _, _, _, name)| RawStatementKind::Output { value, name })
        .parse_next(input)
}

/// `%result = input kind`, `%result = const value`, or `%result = op operands`
fn assign_statement<'a>(input: &mut &'a str) -> ModalResult<RawStatementKind<'a>> {
    let (result, _, _, _, keyword, _) = (value_ref, ws, '=', ws, ident, ws).parse_next(input)?;
    match keyword {
        "input" => {
            let kind = ident.parse_next(input)?;
            Ok(RawStatementKind::Input { result, kind })
        }
        "const" => {
            let value = const_value.parse_next(input)?;
            Ok(RawStatementKind::Const { result, value })
        }
        op => {
            let operands: Vec<RawOperand<'a>> =
                separated(0.., delimited(ws, operand, ws), ',').parse_next(input)?;
            Ok(RawStatementKind::Op {
                result,
                op,
                operands,
            })
        }
    }
}

fn circuit_name(input: &mut &str) -> ModalResult<String> {
    '@'.parse_next(input)?;
    if input.starts_with('"') {
        string_lit.parse_next(input)
    } else {
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
            .map(|s: &str| s.to_owned())
            .parse_next(input)
    }
}

fn raw_circuit<'a>(source: &'a str) -> Result<RawCircuit<'a>, ParseError> {
    let mut remaining = source;
    let offset = |remaining: &str| source.len() - remaining.len();
    let lex_error = |remaining: &str, e: winnow::error::ErrMode<winnow::error::ContextError>| {
        ParseError {
            message: format!("syntax error: {e}"),
            offset: source.len() - remaining.len(),
        }
    };

    let name = (ws, "circuit", ws, circuit_name, ws, '{')
        .map(|(_, _, _, name, _, _)| name)
        .parse_next(&mut remaining)
        .map_err(|e| lex_error(remaining, e))?;

    let mut statements = Vec::new();
    loop {
        ws.parse_next(&mut remaining)
            .map_err(|e| lex_error(remaining, e))?;
        if remaining.starts_with('}') {
            remaining = &remaining[1..];
            break;
        }
        if remaining.is_empty() {
            return Err(ParseError {
                message: "unexpected end of input, expected `}`".to_owned(),
                offset: offset(remaining),
            });
        }
        let start = offset(remaining);
        let kind = alt((output_statement, assign_statement))
            .parse_next(&mut remaining)
            .map_err(|e| lex_error(remaining, e))?;
        statements.push(RawStatement {
            offset: start,
            kind,
        });
    }

    ws.parse_next(&mut remaining)
        .map_err(|e| lex_error(remaining, e))?;
    if !remaining.is_empty() {
        return Err(ParseError {
            message: "trailing input after circuit".to_owned(),
            offset: offset(remaining),
        });
    }
    Ok(RawCircuit { name, statements })
}

// ============================================================================
// CircuitBuilder (Raw -> Program)
// ============================================================================

struct CircuitBuilder<'a> {
    program: Program,
    values: HashMap<&'a str, TermId>,
}

impl<'a> CircuitBuilder<'a> {
    fn new(name: &str) -> Self {
        Self {
            program: Program::new(name),
            values: HashMap::new(),
        }
    }

    fn resolve(&mut self, operand: RawOperand<'a>, offset: usize) -> Result<TermId, ParseError> {
        match operand {
            RawOperand::Value(name) => self.values.get(name).copied().ok_or(ParseError {
                message: format!("undefined value `%{name}`"),
                offset,
            }),
            RawOperand::Raw(value) => self.program.raw(value).map_err(|e| ParseError {
                message: e.to_string(),
                offset,
            }),
        }
    }

    fn define(&mut self, name: &'a str, term: TermId) {
        self.values.insert(name, term);
    }

    fn build_statement(&mut self, statement: &RawStatement<'a>) -> Result<(), ParseError> {
        let offset = statement.offset;
        let graph_error = |e: crate::IrError| ParseError {
            message: e.to_string(),
            offset,
        };
        match &statement.kind {
            RawStatementKind::Input { result, kind } => {
                let kind = TermKind::from_name(kind).ok_or_else(|| ParseError {
                    message: format!("unknown kind `{kind}`"),
                    offset,
                })?;
                let term = self.program.add_input(result, kind).map_err(graph_error)?;
                self.define(*result, term);
            }
            RawStatementKind::Const { result, value } => {
                let term = self
                    .program
                    .add_constant(Some(*result), value.clone())
                    .map_err(graph_error)?;
                self.define(*result, term);
            }
            RawStatementKind::Op {
                result,
                op,
                operands,
            } => {
                let opcode = OpCode::from_name(op)
                    .filter(|op| *op != OpCode::Undefined)
                    .ok_or_else(|| ParseError {
                        message: format!("unknown operation `{op}`"),
                        offset,
                    })?;
                let mut resolved = Vec::with_capacity(operands.len());
                for &operand in operands {
                    resolved.push(self.resolve(operand, offset)?);
                }
                let term = self
                    .program
                    .insert_labeled_op(result, opcode, &resolved)
                    .map_err(graph_error)?;
                self.define(*result, term);
            }
            RawStatementKind::Output { value, name } => {
                let term = self.resolve(*value, offset)?;
                self.program.set_output(name, term).map_err(graph_error)?;
            }
        }
        Ok(())
    }
}

/// Parse a circuit from its textual form.
pub fn parse_circuit(source: &str) -> Result<Program, ParseError> {
    let raw = raw_circuit(source)?;
    let mut builder = CircuitBuilder::new(&raw.name);
    for statement in &raw.statements {
        builder.build_statement(statement)?;
    }
    Ok(builder.program)
}

/// Parse a circuit, panicking with the offending input on failure.
pub fn parse_test_circuit(source: &str) -> Program {
    parse_circuit(source).unwrap_or_else(|e| {
        panic!(
            "Failed to parse test circuit at offset {}:\n  {}\n\nInput:\n{}",
            e.offset, e.message, source
        )
    })
}

// ============================================================================
// Tests
// ============================================================================
