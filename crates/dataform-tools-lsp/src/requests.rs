//! Custom requests serving the editor panels
//!
//! - `dataform/tableMetadata`: tables compiled from a file
//! - `dataform/dependencyTree`: dependency tree metadata with its legend

use dataform_tools_core::{CompiledGraph, Direction, TableMetadataMessage, TreeData};
use dataform_tools_graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::Url;

pub const TABLE_METADATA_METHOD: &str = "dataform/tableMetadata";
pub const DEPENDENCY_TREE_METHOD: &str = "dataform/dependencyTree";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadataParams {
    pub uri: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTreeParams {
    /// Document whose first action becomes the root when `root` is absent
    #[serde(default)]
    pub uri: Option<Url>,

    /// `database.schema.name` of the root node
    #[serde(default)]
    pub root: Option<String>,

    #[serde(default)]
    pub direction: Direction,
}

/// Tables compiled from `file`
pub fn table_metadata(graph: &CompiledGraph, file: &str) -> TableMetadataMessage {
    TableMetadataMessage::from_actions(graph.actions_for_file(file))
}

/// Tree rooted at `root`, or at the first action compiled from `file`.
/// Without either, the whole graph. A root that is not a node is an
/// invalid-params error.
pub fn dependency_tree(
    graph: &CompiledGraph,
    file: Option<&str>,
    root: Option<&str>,
    direction: Direction,
) -> Result<TreeData> {
    let dag = DependencyGraph::from_compiled(graph);

    let root = match root {
        Some(root) => Some(root.to_string()),
        None => file.and_then(|f| graph.actions_for_file(f).next().map(|a| a.target.fqn())),
    };

    match root {
        Some(root) => dag
            .subtree(&root, direction)
            .ok_or_else(|| Error::invalid_params(format!("Unknown dependency tree root: {}", root))),
        None => Ok(dag.metadata(direction)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tower_lsp::jsonrpc::ErrorCode;

    const COMPILED: &str = r#"{
        "tables": [
            {"target": {"database": "p", "schema": "s", "name": "a"}, "fileName": "definitions/a.sqlx", "type": "table", "tags": ["daily"]},
            {"target": {"database": "p", "schema": "s", "name": "b"}, "fileName": "definitions/b.sqlx", "type": "view",
             "dependencyTargets": [{"database": "p", "schema": "s", "name": "a"}]}
        ]
    }"#;

    #[test]
    fn table_metadata_for_file() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();

        let message = table_metadata(&graph, "definitions/b.sqlx");

        assert_eq!(message.table_metadata.tables.len(), 1);
        assert_eq!(message.table_metadata.tables[0].target.name, "b");
        assert!(table_metadata(&graph, "definitions/none.sqlx").table_metadata.tables.is_empty());
    }

    #[test]
    fn tree_root_defaults_to_file_action() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();

        let tree = dependency_tree(&graph, Some("definitions/a.sqlx"), None, Direction::Downstream).unwrap();

        assert_eq!(tree.tree_root.as_deref(), Some("p.s.a"));
        let names: Vec<&str> = tree.dataform_tree_metadata.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["p.s.a", "p.s.b"]);
    }

    #[test]
    fn unknown_root_and_whole_graph() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();

        let err = dependency_tree(&graph, None, Some("p.s.zzz"), Direction::Upstream).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(err.message, "Unknown dependency tree root: p.s.zzz");

        let all = dependency_tree(&graph, None, None, Direction::Upstream).unwrap();
        assert_eq!(all.tree_root, None);
        assert_eq!(all.dataform_tree_metadata.len(), 2);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: DependencyTreeParams = serde_json::from_str(r#"{"root": "p.s.a"}"#).unwrap();
        assert_eq!(params.direction, Direction::Upstream);
        assert_eq!(params.uri, None);
    }
}
