//! Completion candidates for SQLX documents
//!
//! The text before the cursor selects the candidates:
//! - a trailing `$`: a `{ref(...)}` call for every table and declaration
//! - a quoted `dependencies` or `tags` value: targets or tags of the project
//! - `type:` or `onSchemaChange:` inside the config block: allowed values
//! - anywhere else inside the config block: properties of the enclosing object

use crate::blocks::SqlxBlocks;
use crate::config_lint::{
    brace_delta, nested_block_regex, Section, ACTION_TYPES, ASSERTION_PROPERTIES,
    BIGQUERY_PROPERTIES, CONFIG_PROPERTIES, ON_SCHEMA_CHANGE,
};
use crate::text::{byte_column, LineIndex, Position};
use dataform_tools_core::{CompiledGraph, RefStyle};
use regex::Regex;
use std::sync::OnceLock;

fn type_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\btype\s*:\s*["']?$"#).expect("type value pattern is valid"))
}

fn on_schema_change_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bonSchemaChange\s*:\s*["']?$"#).expect("onSchemaChange value pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Property,
    Value,
    Reference,
}

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
    pub insert_text: String,
    /// `insert_text` carries a `$1` tab stop
    pub snippet: bool,
}

impl Completion {
    fn plain(label: impl Into<String>, kind: CompletionKind, detail: Option<String>) -> Self {
        let label = label.into();
        Self {
            insert_text: label.clone(),
            label,
            kind,
            detail,
            snippet: false,
        }
    }
}

/// What the cursor is completing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Reference,
    Dependency,
    Tag,
    /// Value of `type` or `onSchemaChange`; `quoted` when the opening quote is typed
    Value {
        values: &'static [(&'static str, &'static str)],
        quoted: bool,
    },
    Property(Section),
}

/// Object of the config block enclosing the end of `lines`
fn section_at<'a>(lines: impl Iterator<Item = &'a str>) -> Section {
    let mut nested: Option<(Section, i64)> = None;

    for line in lines {
        let delta = brace_delta(line);
        nested = match nested {
            None => [Section::BigQuery, Section::Assertions]
                .into_iter()
                .find(|s| {
                    let name = if *s == Section::BigQuery { "bigquery" } else { "assertions" };
                    nested_block_regex(name).is_match(line)
                })
                .filter(|_| delta > 0)
                .map(|s| (s, delta)),
            Some((section, depth)) => Some((section, depth + delta)).filter(|(_, d)| *d > 0),
        };
    }

    nested.map_or(Section::Config, |(section, _)| section)
}

fn trigger(text: &str, position: Position) -> Option<Trigger> {
    let index = LineIndex::new(text);
    let line = index.line_text(position.line as usize)?;
    let prefix = &line[..byte_column(line, position.character)];

    if prefix.ends_with('$') {
        return Some(Trigger::Reference);
    }
    let has_quote = prefix.contains('"') || prefix.contains('\'');
    if has_quote && prefix.contains("dependencies") {
        return Some(Trigger::Dependency);
    }
    if has_quote && prefix.contains("tags") {
        return Some(Trigger::Tag);
    }

    let blocks = SqlxBlocks::scan(text);
    let config = blocks.config?;
    let cursor_line = position.line as usize + 1;
    if !blocks.in_config(cursor_line) {
        return None;
    }

    let quoted = prefix.ends_with('"') || prefix.ends_with('\'');
    if on_schema_change_regex().is_match(prefix) {
        return Some(Trigger::Value {
            values: ON_SCHEMA_CHANGE,
            quoted,
        });
    }
    if type_value_regex().is_match(prefix) {
        return Some(Trigger::Value {
            values: ACTION_TYPES,
            quoted,
        });
    }

    // Lines after `config {` up to the cursor
    let before = index
        .lines()
        .skip(config.start_line)
        .take_while(|(i, _)| *i < position.line as usize)
        .map(|(_, l)| l);
    Some(Trigger::Property(section_at(before.chain(std::iter::once(prefix)))))
}

fn reference_call(target: &str, style: RefStyle) -> String {
    let (schema, name) = target.split_once('.').unwrap_or(("", target));
    match style {
        RefStyle::Name => format!("{{ref(\"{}\")}}", name),
        RefStyle::SchemaAndName => format!("{{ref(\"{}\", \"{}\")}}", schema, name),
        RefStyle::Object => format!("{{ref({{schema: \"{}\", name: \"{}\"}})}}", schema, name),
    }
}

/// Completion for one document against the last compiled project
#[derive(Debug, Clone, Copy)]
pub struct CompletionEngine<'a> {
    graph: Option<&'a CompiledGraph>,
    ref_style: RefStyle,
}

impl<'a> CompletionEngine<'a> {
    pub fn new(graph: Option<&'a CompiledGraph>, ref_style: RefStyle) -> Self {
        Self { graph, ref_style }
    }

    /// Candidates at a 0-based position; empty when nothing applies
    pub fn complete(&self, text: &str, position: Position) -> Vec<Completion> {
        let Some(trigger) = trigger(text, position) else {
            return Vec::new();
        };

        match trigger {
            Trigger::Reference => self
                .targets()
                .into_iter()
                .map(|target| {
                    let call = reference_call(&target, self.ref_style);
                    Completion::plain(call, CompletionKind::Reference, Some(target))
                })
                .collect(),
            Trigger::Dependency => self
                .targets()
                .into_iter()
                .map(|target| Completion::plain(target, CompletionKind::Reference, None))
                .collect(),
            Trigger::Tag => self
                .graph
                .map(CompiledGraph::tags)
                .unwrap_or_default()
                .into_iter()
                .map(|tag| Completion::plain(tag, CompletionKind::Value, None))
                .collect(),
            Trigger::Value { values, quoted } => values
                .iter()
                .map(|(value, detail)| Completion {
                    label: value.to_string(),
                    kind: CompletionKind::Value,
                    detail: Some(detail.to_string()),
                    insert_text: if quoted {
                        value.to_string()
                    } else {
                        format!("\"{}\"", value)
                    },
                    snippet: false,
                })
                .collect(),
            Trigger::Property(section) => {
                let properties = match section {
                    Section::Config => CONFIG_PROPERTIES,
                    Section::BigQuery => BIGQUERY_PROPERTIES,
                    Section::Assertions => ASSERTION_PROPERTIES,
                };
                properties
                    .iter()
                    .map(|(name, detail)| Completion {
                        label: name.to_string(),
                        kind: CompletionKind::Property,
                        detail: Some(detail.to_string()),
                        insert_text: format!("{}: $1", name),
                        snippet: true,
                    })
                    .collect()
            }
        }
    }

    fn targets(&self) -> Vec<String> {
        self.graph.map(CompiledGraph::reference_targets).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMPILED: &str = r#"{
        "tables": [
            {"target": {"database": "p", "schema": "stg", "name": "users"}, "type": "view", "tags": ["daily"]},
            {"target": {"database": "p", "schema": "rpt", "name": "dau"}, "type": "table", "tags": ["kpi", "daily"]}
        ],
        "declarations": [{"target": {"database": "raw", "schema": "app", "name": "events"}}]
    }"#;

    const SQLX: &str = "config {\n  type: \"table\",\n  bigquery: {\n    \n  },\n  \n}\nselect * from \n";

    fn graph() -> CompiledGraph {
        CompiledGraph::from_json(COMPILED).unwrap()
    }

    fn labels(items: &[Completion]) -> Vec<&str> {
        items.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn dollar_offers_reference_calls() {
        let graph = graph();
        let engine = CompletionEngine::new(Some(&graph), RefStyle::Name);
        let text = "select * from $";

        let items = engine.complete(text, Position::new(0, 15));

        assert_eq!(labels(&items), vec![r#"{ref("users")}"#, r#"{ref("dau")}"#, r#"{ref("events")}"#]);
        assert_eq!(items[2].detail.as_deref(), Some("app.events"));
        assert_eq!(items[0].kind, CompletionKind::Reference);
    }

    #[test]
    fn reference_styles() {
        assert_eq!(reference_call("app.events", RefStyle::SchemaAndName), r#"{ref("app", "events")}"#);
        assert_eq!(
            reference_call("app.events", RefStyle::Object),
            r#"{ref({schema: "app", name: "events"})}"#
        );
    }

    #[test]
    fn dependencies_and_tags_values() {
        let graph = graph();
        let engine = CompletionEngine::new(Some(&graph), RefStyle::Name);

        let deps = engine.complete("  dependencies: [\"", Position::new(0, 18));
        assert_eq!(labels(&deps), vec!["stg.users", "rpt.dau", "app.events"]);

        let tags = engine.complete("  tags: ['", Position::new(0, 10));
        assert_eq!(labels(&tags), vec!["daily", "kpi"]);
    }

    #[test]
    fn no_graph_means_no_project_candidates() {
        let engine = CompletionEngine::new(None, RefStyle::Name);
        assert!(engine.complete("from $", Position::new(0, 6)).is_empty());
    }

    #[test]
    fn config_property_names_by_section() {
        let engine = CompletionEngine::new(None, RefStyle::Name);

        let top = engine.complete(SQLX, Position::new(5, 2));
        assert_eq!(top.len(), CONFIG_PROPERTIES.len());
        assert_eq!(top[0].insert_text, "type: $1");
        assert!(top[0].snippet);

        let bigquery = engine.complete(SQLX, Position::new(3, 4));
        assert_eq!(bigquery[0].label, "partitionBy");
        assert_eq!(bigquery.len(), BIGQUERY_PROPERTIES.len());
    }

    #[test]
    fn assertions_section_inside_config() {
        let engine = CompletionEngine::new(None, RefStyle::Name);
        let text = "config {\n  assertions: {\n    \n  }\n}\n";

        let items = engine.complete(text, Position::new(2, 4));

        assert_eq!(labels(&items), vec!["nonNull", "rowConditions", "uniqueKey", "uniqueKeys"]);
    }

    #[test]
    fn enum_values_quote_when_needed() {
        let engine = CompletionEngine::new(None, RefStyle::Name);

        let bare = engine.complete("config {\n  onSchemaChange: \n}", Position::new(1, 18));
        assert_eq!(labels(&bare), vec!["IGNORE", "FAIL", "EXTEND", "SYNCHRONIZE"]);
        assert_eq!(bare[0].insert_text, "\"IGNORE\"");

        let quoted = engine.complete("config {\n  type: \"\n}", Position::new(1, 9));
        assert_eq!(quoted[0].label, "table");
        assert_eq!(quoted[0].insert_text, "table");
    }

    #[test]
    fn nothing_outside_config() {
        let engine = CompletionEngine::new(None, RefStyle::Name);
        assert!(engine.complete(SQLX, Position::new(7, 14)).is_empty());
        assert!(engine.complete("select 1", Position::new(0, 3)).is_empty());
    }
}
