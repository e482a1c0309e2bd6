//! Diagnostic rendering for the cipherloom CLI.

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use loom_ir::ParseError;

/// Clamp an offset into `source` and widen it to a non-empty span
/// (required by ariadne).
pub fn error_span(offset: usize, source: &str) -> (usize, usize) {
    let start = offset.min(source.len().saturating_sub(1));
    (start, start + 1)
}

fn parse_report<'a>(
    err: &'a ParseError,
    source: &str,
    file_path: &'a str,
    color: bool,
) -> Report<'a, (&'a str, std::ops::Range<usize>)> {
    let (start, end) = error_span(err.offset, source);
    Report::build(ReportKind::Error, (file_path, start..end))
        .with_config(
            Config::default()
                .with_index_type(IndexType::Byte)
                .with_color(color),
        )
        .with_message("invalid circuit")
        .with_label(
            Label::new((file_path, start..end))
                .with_message(&err.message)
                .with_color(Color::Red),
        )
        .finish()
}

/// Print a parse error against its source text on stderr.
pub fn print_parse_error(err: &ParseError, source: &str, file_path: &str) {
    parse_report(err, source, file_path, true)
        .eprint((file_path, Source::from(source)))
        .ok();
}

/// Render a parse error without colors.
pub fn render_parse_error(err: &ParseError, source: &str, file_path: &str) -> String {
    let mut out = Vec::new();
    parse_report(err, source, file_path, false)
        .write((file_path, Source::from(source)), &mut out)
        .ok();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_ir::parse_circuit;

    #[test]
    fn span_is_clamped_into_source() {
        assert_eq!(error_span(3, "abcdef"), (3, 4));
        assert_eq!(error_span(10, "abc"), (2, 3));
        assert_eq!(error_span(0, ""), (0, 1));
    }

    #[test]
    fn rendered_error_names_file_and_message() {
        let source = "circuit @bad {\n  %x = input cipher\n  %y = frobnicate %x\n}\n";
        let err = parse_circuit(source).unwrap_err();
        let rendered = render_parse_error(&err, source, "bad.loom");
        assert!(rendered.contains("bad.loom"), "{rendered}");
        assert!(rendered.contains("unknown operation `frobnicate`"), "{rendered}");
    }
}
