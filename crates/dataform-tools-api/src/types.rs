//! Dataform API resources
//!
//! Field names follow the REST representation (camelCase). Only fields the
//! tooling reads are modelled; everything is optional or defaulted so partial
//! responses still decode.

use chrono::{DateTime, Utc};
use dataform_tools_core::{JobStatus, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Last segment of a resource name
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote_settings: Option<GitRemoteSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRemoteSettings {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

impl Workspace {
    pub fn id(&self) -> &str {
        resource_id(&self.name)
    }
}

/// Compilation overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCompilationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_schema: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_assertion_name_prefix: Option<String>,
}

/// What a workflow invocation runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_tags: Vec<String>,

    #[serde(default)]
    pub transitive_dependencies_included: bool,

    #[serde(default)]
    pub transitive_dependents_included: bool,

    #[serde(default)]
    pub fully_refresh_incremental_tables_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResultError {
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_target: Option<Target>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commitish: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_compilation_config: Option<CodeCompilationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_git_commit_sha: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataform_core_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compilation_errors: Vec<CompilationResultError>,
}

/// One action of a compilation result. The action body (`relation`,
/// `operations`, `assertion`, `declaration`, ...) is kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResultAction {
    pub target: Target,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_target: Option<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Value>,
}

impl CompilationResultAction {
    /// `table`, `view`, `incremental`, `operations`, `assertion`,
    /// `declaration` or `unknown`
    pub fn kind(&self) -> &str {
        if let Some(relation) = &self.relation {
            return match relation.get("relationType").and_then(Value::as_str) {
                Some("VIEW") => "view",
                Some("INCREMENTAL_TABLE") => "incremental",
                Some("MATERIALIZED_VIEW") => "materialized view",
                _ => "table",
            };
        }
        if self.operations.is_some() {
            "operations"
        } else if self.assertion.is_some() {
            "assertion"
        } else if self.declaration.is_some() {
            "declaration"
        } else {
            "unknown"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl Interval {
    /// Seconds between start and end, when both parse as RFC 3339
    pub fn elapsed_seconds(&self) -> Option<f64> {
        let parse = |s: &Option<String>| {
            s.as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc))
        };
        let start = parse(&self.start_time)?;
        let end = parse(&self.end_time)?;
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInvocation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_config: Option<InvocationConfig>,

    /// `RUNNING`, `SUCCEEDED`, `CANCELLED`, `FAILED`, `CANCELING`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_timing: Option<Interval>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_compilation_result: Option<String>,
}

impl WorkflowInvocation {
    /// Invocation id (last segment of the name)
    pub fn id(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(resource_id(&self.name))
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state.as_deref(), Some("SUCCEEDED" | "FAILED" | "CANCELLED"))
    }

    /// Status payload for the job panel
    pub fn job_status(&self, url: Option<String>) -> JobStatus {
        let state = self.state.clone().unwrap_or_else(|| "STATE_UNSPECIFIED".to_string());
        let error_message = match state.as_str() {
            "FAILED" => Some("Workflow invocation failed".to_string()),
            "CANCELLED" => Some("Workflow invocation was cancelled".to_string()),
            _ => None,
        };

        JobStatus {
            job_id: self.id().unwrap_or_default().to_string(),
            state,
            error_message,
            elapsed_seconds: self.invocation_timing.as_ref().and_then(Interval::elapsed_seconds),
            url,
        }
    }
}

/// Result of [`DataformTools::run_remotely`](crate::DataformTools::run_remotely)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRun {
    pub workflow_invocation: WorkflowInvocation,
    pub workflow_invocation_id: String,
    pub workflow_invocation_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGitStatus {
    pub path: String,

    /// `ADDED`, `DELETED`, `MODIFIED`, `HAS_CONFLICTS`
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileGitStatuses {
    #[serde(default)]
    pub uncommitted_file_changes: Vec<FileGitStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAheadBehind {
    #[serde(default)]
    pub commits_ahead: i64,

    #[serde(default)]
    pub commits_behind: i64,
}

/// Author of commits pulled into a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAuthor {
    pub name: String,
    pub email_address: String,
}

/// Options for [`DataformTools::pull_git_commits`](crate::DataformTools::pull_git_commits)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Defaults to the workspace name
    pub remote_branch: Option<String>,
    pub author: CommitAuthor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invocation_job_status() {
        let invocation: WorkflowInvocation = serde_json::from_value(serde_json::json!({
            "name": "projects/p/locations/l/repositories/r/workflowInvocations/1700000000-abc",
            "state": "FAILED",
            "invocationTiming": {
                "startTime": "2024-05-01T10:00:00Z",
                "endTime": "2024-05-01T10:01:30.500Z"
            }
        }))
        .unwrap();

        let status = invocation.job_status(Some("https://example.test".to_string()));

        assert_eq!(status.job_id, "1700000000-abc");
        assert_eq!(status.state, "FAILED");
        assert_eq!(status.error_message.as_deref(), Some("Workflow invocation failed"));
        assert_eq!(status.elapsed_seconds, Some(90.5));
        assert!(invocation.is_finished());
    }

    #[test]
    fn running_invocation_has_no_elapsed_time() {
        let invocation = WorkflowInvocation {
            name: "a/b/workflowInvocations/42".to_string(),
            state: Some("RUNNING".to_string()),
            invocation_timing: Some(Interval {
                start_time: Some("2024-05-01T10:00:00Z".to_string()),
                end_time: None,
            }),
            ..Default::default()
        };

        let status = invocation.job_status(None);
        assert_eq!(status.elapsed_seconds, None);
        assert_eq!(status.error_message, None);
        assert!(!invocation.is_finished());
    }

    #[test]
    fn action_kinds() {
        let view: CompilationResultAction = serde_json::from_value(serde_json::json!({
            "target": {"database": "p", "schema": "s", "name": "v"},
            "relation": {"relationType": "VIEW"}
        }))
        .unwrap();
        let assertion: CompilationResultAction = serde_json::from_value(serde_json::json!({
            "target": {"name": "a"},
            "assertion": {}
        }))
        .unwrap();

        assert_eq!(view.kind(), "view");
        assert_eq!(assertion.kind(), "assertion");
    }

    #[test]
    fn invocation_config_wire_format() {
        let config = InvocationConfig {
            included_tags: vec!["daily".to_string()],
            transitive_dependencies_included: true,
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({
                "includedTags": ["daily"],
                "transitiveDependenciesIncluded": true,
                "transitiveDependentsIncluded": false,
                "fullyRefreshIncrementalTablesEnabled": false
            })
        );
    }
}
