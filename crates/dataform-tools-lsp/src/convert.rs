//! Conversions between workspace types and LSP protocol types

use dataform_tools_core::{Diagnostic as ToolDiagnostic, Severity};
use dataform_tools_sqlx::{Position as SqlxPosition, Span};
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range,
};

/// Source name attached to published diagnostics
pub const DIAGNOSTIC_SOURCE: &str = "dataform-tools";

/// Width used for diagnostics that carry a line but no columns
const WHOLE_LINE: u32 = 1000;

pub fn to_lsp_position(position: SqlxPosition) -> Position {
    Position::new(position.line, position.character)
}

pub fn from_lsp_position(position: Position) -> SqlxPosition {
    SqlxPosition::new(position.line, position.character)
}

pub fn to_lsp_range(span: Span) -> Range {
    Range::new(to_lsp_position(span.start), to_lsp_position(span.end))
}

pub fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warn => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    }
}

/// Convert a tool diagnostic (1-based location) into an LSP diagnostic
/// (0-based range). Missing columns cover the whole line; a missing
/// location maps to the first line.
pub fn to_lsp_diagnostic(diag: &ToolDiagnostic) -> Diagnostic {
    let range = match &diag.location {
        Some(location) => {
            let line = location.line.unwrap_or(1).saturating_sub(1) as u32;
            let end_line = location
                .end_line
                .map(|l| l.saturating_sub(1) as u32)
                .unwrap_or(line);
            match (location.column, location.end_column) {
                (Some(start), Some(end)) => Range::new(
                    Position::new(line, start.saturating_sub(1) as u32),
                    Position::new(end_line, end.saturating_sub(1) as u32),
                ),
                (Some(start), None) => Range::new(
                    Position::new(line, start.saturating_sub(1) as u32),
                    Position::new(end_line, WHOLE_LINE),
                ),
                _ => Range::new(Position::new(line, 0), Position::new(line, WHOLE_LINE)),
            }
        }
        None => Range::new(Position::new(0, 0), Position::new(0, WHOLE_LINE)),
    };

    Diagnostic {
        range,
        severity: Some(to_lsp_severity(diag.severity)),
        code: Some(NumberOrString::String(diag.code.as_str().to_string())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataform_tools_core::{DiagnosticCode, Location};
    use pretty_assertions::assert_eq;

    #[test]
    fn span_location_becomes_zero_based_range() {
        let diag = ToolDiagnostic::new(DiagnosticCode::ConfigInvalidValue, Severity::Warn, "bad")
            .with_location(Location::with_span("definitions/a.sqlx", 2, 3, 7));

        let lsp = to_lsp_diagnostic(&diag);

        assert_eq!(lsp.range, Range::new(Position::new(1, 2), Position::new(1, 6)));
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(lsp.code, Some(NumberOrString::String("CONFIG_INVALID_VALUE".to_string())));
        assert_eq!(lsp.source.as_deref(), Some(DIAGNOSTIC_SOURCE));
    }

    #[test]
    fn line_only_location_covers_the_line() {
        let diag = ToolDiagnostic::new(DiagnosticCode::CompilationError, Severity::Error, "boom")
            .with_location(Location::with_line("definitions/a.sqlx", 1));

        let lsp = to_lsp_diagnostic(&diag);

        assert_eq!(lsp.range.start, Position::new(0, 0));
        assert_eq!(lsp.range.end.line, 0);
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
    }
}
