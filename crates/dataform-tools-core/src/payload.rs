//! Panel payloads
//!
//! Messages the editor host forwards to its panels. Field names follow the
//! panel protocol (`tableMetadata`, `dataformTreeMetadata`, `errorMessage`,
//! ...). Absent data is omitted rather than sent as null.

use serde::{Deserialize, Serialize};
use crate::compiled::{Action, Target};

/// One table shown in the table-metadata panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    pub target: Target,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl From<&Action> for TableEntry {
    fn from(action: &Action) -> Self {
        Self {
            target: action.target.clone(),
            kind: action.kind.to_string(),
            tags: action.tags.clone(),
            dependency_targets: action.dependency_targets.clone(),
            file_name: action.file_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub tables: Vec<TableEntry>,
}

impl TableMetadata {
    /// Tags across all tables, first occurrence order, without duplicates
    pub fn unique_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for tag in self.tables.iter().flat_map(|t| t.tags.iter()) {
            if !tags.contains(&tag.as_str()) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// `{ "tableMetadata": { "tables": [...] } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadataMessage {
    pub table_metadata: TableMetadata,
}

impl TableMetadataMessage {
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a Action>) -> Self {
        Self {
            table_metadata: TableMetadata {
                tables: actions.into_iter().map(TableEntry::from).collect(),
            },
        }
    }
}

/// Status of a remote workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,

    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Dependency tree direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Upstream,
    Downstream,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upstream" => Ok(Self::Upstream),
            "downstream" => Ok(Self::Downstream),
            other => Err(format!("unknown direction '{}', expected upstream or downstream", other)),
        }
    }
}

/// Node of the dependency tree panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "_name")]
    pub name: String,

    #[serde(rename = "_fileName")]
    pub file_name: String,

    #[serde(rename = "_schema")]
    pub schema: String,

    #[serde(rename = "_schema_idx")]
    pub schema_idx: u8,

    #[serde(rename = "_tags", default)]
    pub tags: Vec<String>,

    #[serde(rename = "_deps", default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<String>>,
}

/// Legend entry mapping a type index to its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    #[serde(rename = "_schema")]
    pub schema: String,

    #[serde(rename = "_schema_idx")]
    pub schema_idx: u8,
}

/// Payload of the dependency tree panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeData {
    pub dataform_tree_metadata: Vec<TreeNode>,

    pub declarations_legend_metadata: Vec<LegendEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_root: Option<String>,

    #[serde(default)]
    pub direction: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::ActionKind;
    use pretty_assertions::assert_eq;

    fn action(name: &str, tags: &[&str]) -> Action {
        Action {
            target: Target::new("proj", "analytics", name),
            canonical_target: None,
            file_name: Some(format!("definitions/{}.sqlx", name)),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            dependency_targets: vec![Target::new("proj", "raw", "events")],
            table_type: Some("table".to_string()),
            query: None,
            incremental_query: None,
            pre_ops: Vec::new(),
            post_ops: Vec::new(),
            queries: Vec::new(),
            disabled: false,
            kind: ActionKind::Table,
        }
    }

    #[test]
    fn table_metadata_wire_format() {
        let users = action("users", &["daily"]);
        let message = TableMetadataMessage::from_actions([&users]);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["tableMetadata"]["tables"][0]["target"]["name"], "users");
        assert_eq!(json["tableMetadata"]["tables"][0]["type"], "table");
        assert_eq!(json["tableMetadata"]["tables"][0]["dependencyTargets"][0]["schema"], "raw");
    }

    #[test]
    fn unique_tags_keep_first_occurrence_order() {
        let a = action("a", &["daily", "core"]);
        let b = action("b", &["core", "hourly"]);
        let message = TableMetadataMessage::from_actions([&a, &b]);

        assert_eq!(message.table_metadata.unique_tags(), vec!["daily", "core", "hourly"]);
    }

    #[test]
    fn job_status_omits_missing_fields() {
        let status = JobStatus {
            job_id: "1234".to_string(),
            state: "RUNNING".to_string(),
            error_message: None,
            elapsed_seconds: None,
            url: None,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"jobId":"1234","state":"RUNNING"}"#);
    }

    #[test]
    fn tree_node_field_names() {
        let node = TreeNode {
            name: "proj.analytics.users".to_string(),
            file_name: "definitions/users.sqlx".to_string(),
            schema: "analytics".to_string(),
            schema_idx: 1,
            tags: vec![],
            deps: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["_name"], "proj.analytics.users");
        assert_eq!(json["_schema_idx"], 1);
        assert!(json.get("_deps").is_none());
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("Downstream".parse::<Direction>().unwrap(), Direction::Downstream);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
