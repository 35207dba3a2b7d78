//! Document symbols: one entry per reference call

use crate::convert::to_lsp_range;
use dataform_tools_sqlx::ReferenceExtractor;
use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

/// Symbols for every `${ref(...)}` outside comments, in document order
pub fn document_symbols(text: &str) -> Vec<DocumentSymbol> {
    ReferenceExtractor::extract(text)
        .into_iter()
        .map(|reference| {
            let range = to_lsp_range(reference.span);
            #[allow(deprecated)]
            DocumentSymbol {
                name: reference.text,
                detail: Some("ref".to_string()),
                kind: SymbolKind::VARIABLE,
                tags: None,
                deprecated: None,
                range,
                selection_range: range,
                children: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tower_lsp::lsp_types::{Position, Range};

    #[test]
    fn one_symbol_per_reference() {
        let text = "config { type: \"view\" }\n\nselect *\nfrom ${ref(\"users\")} u\n-- ${ref(\"old\")}\njoin ${ref(\"app\", \"orders\")} o\n";

        let symbols = document_symbols(text);

        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["${ref(\"users\")}", "${ref(\"app\", \"orders\")}"]);
        assert_eq!(symbols[0].range, Range::new(Position::new(3, 5), Position::new(3, 20)));
        assert_eq!(symbols[0].detail.as_deref(), Some("ref"));
        assert_eq!(symbols[1].kind, SymbolKind::VARIABLE);
    }

    #[test]
    fn no_references_no_symbols() {
        assert!(document_symbols("select 1").is_empty());
    }
}
