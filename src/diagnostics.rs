//! Diagnostics: conversion of front-end errors and warnings for the editor,
//! plus terminal rendering for the `check` command.

use ariadne::{Color, Label, Report, ReportKind, Source};
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use ropey::Rope;
use vyper_front::{CompileError, Span};

pub const SOURCE: &str = "vyper-lsp";

/// Convert a 1-based front-end span into a 0-based editor range.
pub fn range_from_span(span: Span) -> Range {
    Range {
        start: Position {
            line: span.lineno.saturating_sub(1),
            character: span.col_offset,
        },
        end: Position {
            line: span.end_lineno.saturating_sub(1),
            character: span.end_col_offset,
        },
    }
}

/// One diagnostic for the error's own position and one per annotation.
///
/// An error that carries no position at all is reported at the top of the
/// document so it is never silently dropped.
pub fn from_compile_error(error: &CompileError) -> Vec<Diagnostic> {
    let message = error.to_string();
    let mut spans: Vec<Span> = error.span.into_iter().collect();
    spans.extend(error.annotations.iter().copied());
    if spans.is_empty() {
        spans.push(Span::default());
    }
    spans
        .into_iter()
        .map(|span| Diagnostic {
            range: range_from_span(span),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some(SOURCE.to_string()),
            message: message.clone(),
            ..Default::default()
        })
        .collect()
}

/// Parse `X will be deprecated in a future release, use Y instead.`
fn parse_deprecation(warning: &str) -> Option<(&str, &str)> {
    let body = warning.strip_suffix(" instead.")?;
    let (deprecated, replacement) =
        body.split_once(" will be deprecated in a future release, use ")?;
    if deprecated.is_empty() || replacement.is_empty() {
        return None;
    }
    Some((deprecated, replacement))
}

/// A warning at every textual occurrence of a deprecated name.
///
/// Occurrences inside comments and string literals are reported too.
pub fn deprecation_warnings(warnings: &[String], lines: &[String]) -> Vec<Diagnostic> {
    let replacements: Vec<(&str, &str)> = warnings
        .iter()
        .filter_map(|warning| parse_deprecation(warning))
        .collect();
    if replacements.is_empty() {
        return Vec::new();
    }

    let mut diagnostics = Vec::new();
    for (line_number, line) in lines.iter().enumerate() {
        for (deprecated, replacement) in &replacements {
            for (byte, _) in line.match_indices(deprecated) {
                let start = line[..byte].chars().count() as u32;
                let end = start + deprecated.chars().count() as u32;
                diagnostics.push(Diagnostic {
                    range: Range {
                        start: Position {
                            line: line_number as u32,
                            character: start,
                        },
                        end: Position {
                            line: line_number as u32,
                            character: end,
                        },
                    },
                    severity: Some(DiagnosticSeverity::WARNING),
                    source: Some(SOURCE.to_string()),
                    message: format!(
                        "{deprecated} is deprecated. Please use {replacement} instead."
                    ),
                    ..Default::default()
                });
            }
        }
    }
    diagnostics
}

/// Get the display color for a diagnostic severity.
pub fn severity_color(severity: Option<DiagnosticSeverity>) -> Color {
    match severity {
        Some(DiagnosticSeverity::WARNING) => Color::Yellow,
        Some(DiagnosticSeverity::INFORMATION) | Some(DiagnosticSeverity::HINT) => Color::Cyan,
        _ => Color::Red,
    }
}

/// Normalize a span to ensure end > start (required by ariadne).
pub fn normalize_span(start: usize, end: usize) -> (usize, usize) {
    (start, end.max(start + 1))
}

/// Character offset of an editor position, whose column counts UTF-16 units.
fn char_offset(source: &Rope, position: Position) -> usize {
    let line = (position.line as usize).min(source.len_lines().saturating_sub(1));
    let slice = source.line(line);
    let utf16 = (position.character as usize).min(slice.len_utf16_cu());
    source.line_to_char(line) + slice.utf16_cu_to_char(utf16)
}

/// Print a diagnostic using ariadne for pretty output.
pub fn print_diagnostic(diag: &Diagnostic, source: &Rope, file_path: &str) {
    let start = char_offset(source, diag.range.start);
    let end = char_offset(source, diag.range.end);
    let (start, end) = normalize_span(start, end);
    let kind = match diag.severity {
        Some(DiagnosticSeverity::WARNING) => ReportKind::Warning,
        _ => ReportKind::Error,
    };
    let (code, message) = match diag.message.split_once(": ") {
        Some((code, message)) if !code.contains(' ') => (code, message),
        _ => ("", diag.message.as_str()),
    };
    let source_text: String = source.to_string();

    let mut report = Report::build(kind, (file_path, start..end)).with_message(message);
    if !code.is_empty() {
        report = report.with_code(code);
    }
    report
        .with_label(
            Label::new((file_path, start..end))
                .with_message(message)
                .with_color(severity_color(diag.severity)),
        )
        .finish()
        .eprint((file_path, Source::from(source_text)))
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use vyper_front::CompileErrorKind;

    fn lines(source: &str) -> Vec<String> {
        source.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_range_from_span_is_zero_based() {
        let range = range_from_span(Span::new(3, 4, 5, 9));
        assert_eq!(range.start, Position { line: 2, character: 4 });
        assert_eq!(range.end, Position { line: 4, character: 9 });
    }

    #[test]
    fn test_error_with_annotations() {
        let error = CompileError::at(
            CompileErrorKind::NamespaceCollision,
            "'x' has already been declared",
            Span::new(2, 0, 2, 10),
        )
        .with_annotation(Span::new(1, 0, 1, 10));

        let diagnostics = from_compile_error(&error);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].range.start.line, 1);
        assert_eq!(diagnostics[1].range.start.line, 0);
        assert!(diagnostics.iter().all(|d| d.severity == Some(DiagnosticSeverity::ERROR)));
        insta::assert_snapshot!(
            diagnostics[1].message,
            @"NamespaceCollision: 'x' has already been declared"
        );
    }

    #[test]
    fn test_error_without_position() {
        let error = CompileError::new(CompileErrorKind::ModuleNotFound, "lib");
        let diagnostics = from_compile_error(&error);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, Range::default());
    }

    #[test]
    fn test_parse_deprecation() {
        assert_eq!(
            parse_deprecation("enum will be deprecated in a future release, use flag instead."),
            Some(("enum", "flag"))
        );
        assert_eq!(parse_deprecation("something else entirely"), None);
    }

    #[test]
    fn test_deprecation_warnings_mark_every_occurrence() {
        let warnings = vec![
            "_abi_encode will be deprecated in a future release, use abi_encode instead.".to_string(),
            "unrelated warning".to_string(),
        ];
        let source = "@external\ndef foo() -> Bytes[64]:\n    return _abi_encode(_abi_encode(1))\n";

        let diagnostics = deprecation_warnings(&warnings, &lines(source));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].range.start, Position { line: 2, character: 11 });
        assert_eq!(diagnostics[0].range.end, Position { line: 2, character: 22 });
        assert_eq!(diagnostics[1].range.start.character, 23);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        insta::assert_snapshot!(
            diagnostics[0].message,
            @"_abi_encode is deprecated. Please use abi_encode instead."
        );
    }

    #[test]
    fn test_deprecation_columns_count_characters() {
        let warnings =
            vec!["enum will be deprecated in a future release, use flag instead.".to_string()];
        let diagnostics = deprecation_warnings(&warnings, &lines("# é enum\n"));
        assert_eq!(diagnostics[0].range.start.character, 4);
    }

    #[test]
    fn test_severity_color() {
        assert_eq!(severity_color(Some(DiagnosticSeverity::ERROR)), Color::Red);
        assert_eq!(severity_color(Some(DiagnosticSeverity::WARNING)), Color::Yellow);
        assert_eq!(severity_color(None), Color::Red);
    }

    #[test]
    fn test_normalize_span_valid() {
        assert_eq!(normalize_span(0, 10), (0, 10));
        assert_eq!(normalize_span(5, 15), (5, 15));
    }

    #[test]
    fn test_normalize_span_zero_length() {
        // Zero-length span should become length 1
        assert_eq!(normalize_span(5, 5), (5, 6));
    }

    #[test]
    fn test_char_offset_clamps() {
        let source = Rope::from_str("ab\ncd\n");
        assert_eq!(char_offset(&source, Position { line: 1, character: 1 }), 4);
        assert_eq!(char_offset(&source, Position { line: 9, character: 0 }), 6);

        let source = Rope::from_str("# 😀 enum\n");
        assert_eq!(char_offset(&source, Position { line: 0, character: 5 }), 4);
    }
}
