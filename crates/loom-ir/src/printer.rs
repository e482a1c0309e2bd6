//! Text format printer.
//!
//! Prints a [`Program`] in the format read by [`crate::parser`]. Inputs come
//! first in declaration order, then every other live term in topological
//! order, then the outputs. Raw-data leaves are printed inline as integer
//! operands.

use std::fmt::{self, Write};

use crate::program::Program;
use crate::refs::TermId;
use crate::types::TermKind;
use crate::walk;

/// Print `program` to a string.
pub fn print_program(program: &Program) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_program(&mut out, program);
    out
}

/// Print `program` into any formatter sink.
pub fn write_program(out: &mut impl Write, program: &Program) -> fmt::Result {
    writeln!(out, "circuit @{} {{", program.name())?;
    for &input in program.inputs() {
        writeln!(
            out,
            "  %{} = input {}",
            program.label(input),
            program.kind(input)
        )?;
    }
    for term in walk::topological_order(program) {
        if program.is_input(term) || is_inline_raw(program, term) {
            continue;
        }
        write!(out, "  %{} = ", program.label(term))?;
        if let Some(value) = program.constant(term) {
            writeln!(out, "const {value}")?;
            continue;
        }
        write!(out, "{}", program.op(term))?;
        for (idx, &operand) in program.operands(term).iter().enumerate() {
            out.write_str(if idx == 0 { " " } else { ", " })?;
            write_operand(out, program, operand)?;
        }
        out.write_char('\n')?;
    }
    for output in program.outputs() {
        write!(out, "  output ")?;
        write_operand(out, program, output.term)?;
        writeln!(out, " as \"{}\"", escape(&output.name))?;
    }
    writeln!(out, "}}")
}

fn is_inline_raw(program: &Program, term: TermId) -> bool {
    let data = program.term(term);
    data.is_leaf() && data.kind() == TermKind::RawData
}

fn write_operand(out: &mut impl Write, program: &Program, term: TermId) -> fmt::Result {
    if is_inline_raw(program, term) {
        out.write_str(program.label(term))
    } else {
        write!(out, "%{}", program.label(term))
    }
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}
