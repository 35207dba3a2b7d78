//! Integration tests against the fixture project's compiled graph

use dataform_tools_core::{CompiledGraph, Direction, TableMetadataMessage};
use dataform_tools_graph::{compilation_diagnostics, DependencyGraph};
use std::path::Path;

const COMPILED: &str = "../../fixtures/mini-dataform-project/compiled.json";

#[test]
fn fixture_dependency_tree() {
    let path = Path::new(COMPILED);

    if path.exists() {
        let compiled = CompiledGraph::from_file(path).unwrap();
        let dag = DependencyGraph::from_compiled(&compiled);

        // Declared in sources.js but not compiled into the fixture
        let missing: Vec<&str> = dag.missing_nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(missing, vec!["acme-raw.app.users"]);

        let downstream = dag.downstream("acme-analytics.staging.stg_users");
        assert!(downstream.contains(&"acme-analytics.reporting.daily_users".to_string()));

        let tree = dag.metadata(Direction::Upstream);
        let json = serde_json::to_value(&tree).unwrap();
        let first = &json["dataformTreeMetadata"][0];
        assert_eq!(first["_name"], "acme-analytics.staging.stg_users");
        assert_eq!(first["_schema_idx"], 2);
        assert_eq!(first["_deps"][0], "acme-raw.app.users");
        assert_eq!(json["declarationsLegendMetadata"][4]["_schema"], "Incremental");
    }
}

#[test]
fn fixture_table_metadata_and_errors() {
    let path = Path::new(COMPILED);

    if path.exists() {
        let compiled = CompiledGraph::from_file(path).unwrap();

        let message = TableMetadataMessage::from_actions(
            compiled.actions_for_file("definitions/reporting/daily_users.sqlx"),
        );
        let kinds: Vec<&str> = message.table_metadata.tables.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["incremental", "assertion"]);
        assert_eq!(message.table_metadata.unique_tags(), vec!["daily", "kpi"]);

        let diags = compilation_diagnostics(&compiled, "definitions/reporting/broken.sqlx");
        assert_eq!(diags.len(), 1);
        assert!(compilation_diagnostics(&compiled, "definitions/staging/stg_users.sqlx").is_empty());
    }
}
