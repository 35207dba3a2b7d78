//! Language features against the fixture project

use dataform_tools_core::{CompiledGraph, Config, DiagnosticCode, RefStyle, Severity};
use dataform_tools_graph::document_diagnostics;
use dataform_tools_lsp::completion::completion_items;
use dataform_tools_lsp::navigation::{find_definition, reference_hover};
use dataform_tools_lsp::requests::{dependency_tree, table_metadata};
use dataform_tools_sqlx::Position;
use pretty_assertions::assert_eq;
use std::path::Path;

const PROJECT: &str = "../../fixtures/mini-dataform-project";

fn load() -> Option<(Config, CompiledGraph, String, String)> {
    let root = Path::new(PROJECT);
    if !root.exists() {
        return None;
    }
    let config = Config::discover(root).unwrap();
    let graph = CompiledGraph::from_file(&config.compiled_json_path().unwrap()).unwrap();
    let broken = std::fs::read_to_string(root.join("definitions/reporting/broken.sqlx")).unwrap();
    let daily = std::fs::read_to_string(root.join("definitions/reporting/daily_users.sqlx")).unwrap();
    Some((config, graph, broken, daily))
}

#[test]
fn broken_file_collects_every_kind_of_diagnostic() {
    let Some((config, graph, broken, _)) = load() else {
        return;
    };

    let diags = document_diagnostics("definitions/reporting/broken.sqlx", &broken, &config, Some(&graph));

    let codes: Vec<DiagnosticCode> = diags.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagnosticCode::ConfigInvalidValue));
    assert!(codes.contains(&DiagnosticCode::ConfigInvalidProperty));
    assert!(codes.contains(&DiagnosticCode::CompilationError));

    // REF_UNRESOLVED is raised to error by the project config
    let unresolved: Vec<_> = diags.iter().filter(|d| d.code == DiagnosticCode::RefUnresolved).collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].severity, Severity::Error);
    assert!(unresolved[0].message.contains("missing_table"));
}

#[test]
fn clean_file_has_no_diagnostics() {
    let Some((config, graph, _, daily)) = load() else {
        return;
    };

    let diags = document_diagnostics("definitions/reporting/daily_users.sqlx", &daily, &config, Some(&graph));

    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
}

#[test]
fn hover_and_panels_for_daily_users() {
    let Some((_, graph, _, daily)) = load() else {
        return;
    };

    // line 16: from ${ref("stg_users")} u
    let hover = reference_hover(&daily, Position::new(15, 14), &graph).unwrap();
    assert!(hover.starts_with("[acme-analytics.staging.stg_users]"));
    assert!(hover.contains("**Type:** view"));

    let message = table_metadata(&graph, "definitions/reporting/daily_users.sqlx");
    let names: Vec<&str> = message.table_metadata.tables.iter().map(|t| t.target.name.as_str()).collect();
    assert_eq!(names, vec!["daily_users", "daily_users_assertions_rowConditions"]);

    let tree = dependency_tree(
        &graph,
        Some("definitions/reporting/daily_users.sqlx"),
        None,
        Default::default(),
    )
    .unwrap();
    assert_eq!(tree.tree_root.as_deref(), Some("acme-analytics.reporting.daily_users"));
}

#[test]
fn definition_of_declared_source() {
    let root = Path::new(PROJECT);
    if !root.exists() {
        return;
    }
    let text = "join ${ref(\"acme-raw\", \"app\", \"events\")} e";
    let col = text.find("events").unwrap() as u32 + 2;

    let found = find_definition(root, text, Position::new(0, col)).unwrap();

    assert!(found.path.ends_with("definitions/sources/sources.js"));
    assert_eq!(found.position, Position::new(3, 9));
}

#[test]
fn completion_against_compiled_project() {
    let Some((_, graph, _, daily)) = load() else {
        return;
    };
    let at = |line, character| tower_lsp::lsp_types::Position::new(line, character);

    // line 7: partitionBy inside the bigquery block
    let bigquery = completion_items(&daily, at(6, 4), Some(&graph), RefStyle::Name);
    assert_eq!(bigquery[0].label, "partitionBy");

    let refs = completion_items("from $", at(0, 6), Some(&graph), RefStyle::Name);
    let labels: Vec<&str> = refs.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![r#"{ref("stg_users")}"#, r#"{ref("daily_users")}"#, r#"{ref("events")}"#]
    );

    let tags = completion_items("  tags: [\"daily\", \"", at(0, 19), Some(&graph), RefStyle::Name);
    let labels: Vec<&str> = tags.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["daily", "kpi"]);
}
