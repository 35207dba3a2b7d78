//! Compiled project graph (`dataform compile --json`)
//!
//! Only the subset of fields used by the tooling is modelled; unknown fields
//! are ignored.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fully qualified BigQuery relation written by an action
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    pub name: String,
}

impl Target {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// `database.schema.name`, skipping absent parts
    pub fn fqn(&self) -> String {
        [self.database.as_deref(), self.schema.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Link to the table in the BigQuery console, when database and schema are known
    pub fn console_url(&self) -> Option<String> {
        let database = self.database.as_deref()?;
        let schema = self.schema.as_deref()?;
        Some(format!(
            "https://console.cloud.google.com/bigquery?project={db}&ws=!1m5!1m4!4m3!1s{db}!2s{schema}!3s{name}",
            db = database,
            schema = schema,
            name = self.name
        ))
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Kind of compiled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Table,
    View,
    Incremental,
    Test,
    Assertion,
    Operations,
    Declaration,
    #[default]
    Other,
}

impl ActionKind {
    fn from_table_type(table_type: Option<&str>) -> Self {
        match table_type {
            Some("table") | None => Self::Table,
            Some("view") => Self::View,
            Some("incremental") => Self::Incremental,
            Some("test") => Self::Test,
            Some(_) => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Incremental => "incremental",
            Self::Test => "test",
            Self::Assertion => "assertion",
            Self::Operations => "operations",
            Self::Declaration => "declaration",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled action (table, view, assertion, operation or declaration)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub target: Target,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_target: Option<Target>,

    /// Source file relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub dependency_targets: Vec<Target>,

    /// Raw `type` field (tables only)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_query: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_ops: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_ops: Vec<String>,

    /// Operation statements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<String>,

    #[serde(default)]
    pub disabled: bool,

    /// Set after parsing from the section the action came from
    #[serde(skip)]
    pub kind: ActionKind,
}

/// Compilation error reported by `dataform compile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationError {
    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphErrors {
    #[serde(default)]
    pub compilation_errors: Vec<CompilationError>,
}

/// Project-level settings echoed by the compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub warehouse: Option<String>,

    #[serde(default)]
    pub default_database: Option<String>,

    #[serde(default)]
    pub default_schema: Option<String>,

    #[serde(default)]
    pub default_location: Option<String>,

    #[serde(default)]
    pub assertion_schema: Option<String>,
}

/// `dataform compile --json` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGraph {
    #[serde(default)]
    pub tables: Vec<Action>,

    #[serde(default)]
    pub assertions: Vec<Action>,

    #[serde(default)]
    pub operations: Vec<Action>,

    #[serde(default)]
    pub declarations: Vec<Action>,

    #[serde(default)]
    pub project_config: ProjectConfig,

    #[serde(default)]
    pub graph_errors: GraphErrors,

    #[serde(default)]
    pub dataform_core_version: Option<String>,
}

impl CompiledGraph {
    /// Load compiled graph from file
    pub fn from_file(path: &Path) -> Result<Self, CompiledError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CompiledError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Parse compiled graph from JSON, tagging every action with its kind
    pub fn from_json(json: &str) -> Result<Self, CompiledError> {
        let mut graph: Self = serde_json::from_str(json)
            .map_err(|e| CompiledError::ParseError(e.to_string()))?;

        for table in &mut graph.tables {
            table.kind = ActionKind::from_table_type(table.table_type.as_deref());
        }
        for assertion in &mut graph.assertions {
            assertion.kind = ActionKind::Assertion;
        }
        for operation in &mut graph.operations {
            operation.kind = ActionKind::Operations;
        }
        for declaration in &mut graph.declarations {
            declaration.kind = ActionKind::Declaration;
        }

        Ok(graph)
    }

    /// All actions in section order: tables, operations, assertions, declarations
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.tables
            .iter()
            .chain(self.operations.iter())
            .chain(self.assertions.iter())
            .chain(self.declarations.iter())
    }

    /// Actions compiled from a given source file
    pub fn actions_for_file<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = &'a Action> + 'a {
        let wanted = normalize_path(file_name);
        self.actions()
            .filter(move |a| a.file_name.as_deref().map(normalize_path) == Some(wanted.clone()))
    }

    /// Resolve a reference by its arguments: `name`, `schema, name` or
    /// `database, schema, name`. Returns the first action whose target matches.
    pub fn resolve_reference(&self, args: &[String]) -> Option<&Action> {
        let (database, schema, name) = match args {
            [name] => (None, None, name),
            [schema, name] => (None, Some(schema), name),
            [database, schema, name] => (Some(database), Some(schema), name),
            _ => return None,
        };

        self.actions().find(|a| {
            a.target.name == *name
                && schema.map_or(true, |s| a.target.schema.as_deref() == Some(s.as_str()))
                && database.map_or(true, |d| a.target.database.as_deref() == Some(d.as_str()))
        })
    }

    /// `schema.name` of every table, operation and declaration, in section
    /// order without duplicates. Targets without a schema are skipped.
    pub fn reference_targets(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.actions()
            .filter(|a| a.kind != ActionKind::Assertion)
            .filter_map(|a| Some(format!("{}.{}", a.target.schema.as_deref()?, a.target.name)))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Every tag used in the project, sorted
    pub fn tags(&self) -> Vec<String> {
        let tags: std::collections::BTreeSet<&str> = self
            .actions()
            .flat_map(|a| a.tags.iter().map(String::as_str))
            .collect();
        tags.into_iter().map(str::to_string).collect()
    }

    /// Compilation errors reported for one file
    pub fn errors_for_file<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = &'a CompilationError> + 'a {
        let wanted = normalize_path(file_name);
        self.graph_errors
            .compilation_errors
            .iter()
            .filter(move |e| e.file_name.as_deref().map(normalize_path) == Some(wanted.clone()))
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

/// Compiled graph loading errors
#[derive(Debug, thiserror::Error)]
pub enum CompiledError {
    #[error("Failed to read {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse compiled graph: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMPILED: &str = r#"{
        "tables": [
            {
                "type": "table",
                "target": {"database": "proj", "schema": "analytics", "name": "users"},
                "fileName": "definitions/users.sqlx",
                "tags": ["daily"],
                "dependencyTargets": [{"database": "proj", "schema": "raw", "name": "events"}],
                "query": "select 1"
            },
            {
                "type": "view",
                "target": {"database": "proj", "schema": "analytics", "name": "active_users"},
                "fileName": "definitions/active_users.sqlx",
                "dependencyTargets": [{"database": "proj", "schema": "analytics", "name": "users"}]
            }
        ],
        "assertions": [
            {
                "target": {"database": "proj", "schema": "assertions", "name": "users_not_null"},
                "fileName": "definitions/users.sqlx",
                "dependencyTargets": [{"database": "proj", "schema": "analytics", "name": "users"}]
            }
        ],
        "declarations": [
            {"target": {"database": "proj", "schema": "raw", "name": "events"}, "fileName": "definitions/sources.js"}
        ],
        "projectConfig": {"warehouse": "bigquery", "defaultDatabase": "proj", "defaultLocation": "EU"},
        "graphErrors": {"compilationErrors": [{"fileName": "definitions/broken.sqlx", "message": "Unexpected token"}]}
    }"#;

    #[test]
    fn parse_compiled_graph() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();

        assert_eq!(graph.tables.len(), 2);
        assert_eq!(graph.tables[0].kind, ActionKind::Table);
        assert_eq!(graph.tables[1].kind, ActionKind::View);
        assert_eq!(graph.assertions[0].kind, ActionKind::Assertion);
        assert_eq!(graph.declarations[0].kind, ActionKind::Declaration);
        assert_eq!(graph.project_config.default_location.as_deref(), Some("EU"));
        assert_eq!(graph.actions().count(), 4);
    }

    #[test]
    fn actions_for_file_includes_assertions() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();
        let names: Vec<_> = graph
            .actions_for_file("./definitions/users.sqlx")
            .map(|a| a.target.name.as_str())
            .collect();

        assert_eq!(names, vec!["users", "users_not_null"]);
    }

    #[test]
    fn resolve_reference_by_arity() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();

        let one = graph.resolve_reference(&["users".to_string()]).unwrap();
        assert_eq!(one.target.fqn(), "proj.analytics.users");

        let two = graph.resolve_reference(&["raw".to_string(), "events".to_string()]).unwrap();
        assert_eq!(two.kind, ActionKind::Declaration);

        assert!(graph.resolve_reference(&["other".to_string(), "users".to_string()]).is_none());
        assert!(graph.resolve_reference(&[]).is_none());
    }

    #[test]
    fn errors_for_file() {
        let graph = CompiledGraph::from_json(COMPILED).unwrap();
        assert_eq!(graph.errors_for_file("definitions/broken.sqlx").count(), 1);
        assert_eq!(graph.errors_for_file("definitions/users.sqlx").count(), 0);
    }

    #[test]
    fn completion_sources() {
        let mut graph = CompiledGraph::from_json(COMPILED).unwrap();
        graph.tables[1].tags = vec!["hourly".to_string(), "daily".to_string()];

        assert_eq!(
            graph.reference_targets(),
            vec!["analytics.users", "analytics.active_users", "raw.events"]
        );
        assert_eq!(graph.tags(), vec!["daily", "hourly"]);
    }

    #[test]
    fn target_formatting() {
        let target = Target::new("proj", "analytics", "users");
        assert_eq!(target.to_string(), "proj.analytics.users");
        assert!(target.console_url().unwrap().contains("!1sproj!2sanalytics!3susers"));

        let partial = Target { database: None, schema: Some("raw".into()), name: "events".into() };
        assert_eq!(partial.fqn(), "raw.events");
        assert!(partial.console_url().is_none());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            CompiledGraph::from_json("not json"),
            Err(CompiledError::ParseError(_))
        ));
    }
}
