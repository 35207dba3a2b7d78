//! Diagnostics for one document
//!
//! Combines the config block lint, unresolved references and compilation
//! errors, then applies the configured severity overrides. Shared by the
//! language server and `dataform-tools lint`.

use crate::compiler::compilation_diagnostics;
use dataform_tools_core::{CompiledGraph, Config, Diagnostic, DiagnosticCode, Location, Severity};
use dataform_tools_sqlx::{ConfigLinter, Reference, ReferenceExtractor};

/// Diagnostics for `file` (relative to the project root) with contents `text`.
/// Reference and compilation checks run only when a compiled graph is given.
pub fn document_diagnostics(
    file: &str,
    text: &str,
    config: &Config,
    graph: Option<&CompiledGraph>,
) -> Vec<Diagnostic> {
    if config.lint.is_file_skipped(file) {
        tracing::debug!(file, "skipping diagnostics for excluded file");
        return Vec::new();
    }

    let mut diagnostics = Vec::new();

    if file.ends_with(".sqlx") {
        diagnostics.extend(ConfigLinter::new(config.lint.max_config_scan_lines).lint(file, text));
    }

    if let Some(graph) = graph {
        diagnostics.extend(
            ReferenceExtractor::extract(text)
                .iter()
                .filter(|r| graph.resolve_reference(&r.args).is_none())
                .map(|r| unresolved_reference(file, r)),
        );
        diagnostics.extend(compilation_diagnostics(graph, file));
    }

    for diagnostic in &mut diagnostics {
        diagnostic.severity = config.severity.get_severity(diagnostic.code, diagnostic.severity);
    }
    diagnostics
}

fn unresolved_reference(file: &str, reference: &Reference) -> Diagnostic {
    let span = reference.span;
    Diagnostic::new(
        DiagnosticCode::RefUnresolved,
        Severity::Warn,
        format!(
            "Reference \"{}\" does not match any action in the compiled project",
            reference.args.join(".")
        ),
    )
    .with_location(Location::with_span(
        file,
        span.start.line as usize + 1,
        span.start.character as usize + 1,
        span.end.character as usize + 1,
    ))
}
