//! Completion items for SQLX documents

use crate::convert::from_lsp_position;
use dataform_tools_core::{CompiledGraph, RefStyle};
use dataform_tools_sqlx::{Completion, CompletionEngine, CompletionKind};
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionOptions, InsertTextFormat, Position,
};

/// `$` starts a reference; quotes open tag, dependency and enum values;
/// `:` follows a config property
pub const TRIGGER_CHARACTERS: [&str; 4] = ["$", "\"", "'", ":"];

pub fn completion_options() -> CompletionOptions {
    CompletionOptions {
        trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect()),
        ..Default::default()
    }
}

fn to_item(completion: Completion) -> CompletionItem {
    let kind = match completion.kind {
        CompletionKind::Property => CompletionItemKind::PROPERTY,
        CompletionKind::Value => CompletionItemKind::VALUE,
        CompletionKind::Reference => CompletionItemKind::FIELD,
    };
    let format = if completion.snippet {
        InsertTextFormat::SNIPPET
    } else {
        InsertTextFormat::PLAIN_TEXT
    };

    CompletionItem {
        label: completion.label,
        kind: Some(kind),
        detail: completion.detail,
        insert_text: Some(completion.insert_text),
        insert_text_format: Some(format),
        ..Default::default()
    }
}

pub fn completion_items(
    text: &str,
    position: Position,
    graph: Option<&CompiledGraph>,
    ref_style: RefStyle,
) -> Vec<CompletionItem> {
    CompletionEngine::new(graph, ref_style)
        .complete(text, from_lsp_position(position))
        .into_iter()
        .map(to_item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dollar_is_a_trigger_character() {
        let options = completion_options();
        assert!(options.trigger_characters.unwrap().contains(&"$".to_string()));
    }

    #[test]
    fn references_from_compiled_graph() {
        let graph = CompiledGraph::from_json(
            r#"{"declarations": [{"target": {"database": "raw", "schema": "app", "name": "events"}}]}"#,
        )
        .unwrap();

        let items = completion_items("from $", Position::new(0, 6), Some(&graph), RefStyle::SchemaAndName);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, r#"{ref("app", "events")}"#);
        assert_eq!(items[0].kind, Some(CompletionItemKind::FIELD));
        assert_eq!(items[0].insert_text_format, Some(InsertTextFormat::PLAIN_TEXT));
    }

    #[test]
    fn config_properties_are_snippets() {
        let items = completion_items("config {\n  \n}", Position::new(1, 2), None, RefStyle::Name);

        let protected = items.iter().find(|i| i.label == "protected").unwrap();
        assert_eq!(protected.kind, Some(CompletionItemKind::PROPERTY));
        assert_eq!(protected.insert_text.as_deref(), Some("protected: $1"));
        assert_eq!(protected.insert_text_format, Some(InsertTextFormat::SNIPPET));
    }
}
