//! Dataform API client
//!
//! One method per Dataform RPC. Each method validates its required
//! arguments, builds the resource path
//! (`projects/{project}/locations/{location}/repositories/{repository}/...`)
//! and sends a single request through the configured [`Transport`]. There is
//! no retry, timeout or caching layer.

use crate::auth::default_token_source;
use crate::error::ApiError;
use crate::transport::{ApiRequest, HttpTransport, Transport, DEFAULT_ENDPOINT};
use crate::types::{
    resource_id, CodeCompilationConfig, CompilationResult, CompilationResultAction, FileGitStatuses,
    GitAheadBehind, InvocationConfig, PullOptions, RemoteRun, Repository, Workspace,
    WorkflowInvocation,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

fn require(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::missing(message))
    } else {
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value)?)
}

/// Client for the Dataform API of one GCP project and location
#[derive(Clone)]
pub struct DataformTools {
    project_id: String,
    location: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for DataformTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataformTools")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl DataformTools {
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ApiError> {
        let project_id = project_id.into();
        let location = location.into();
        if project_id.trim().is_empty() || location.trim().is_empty() {
            return Err(ApiError::missing("GCP project id and location must be provided."));
        }

        Ok(Self {
            project_id,
            location,
            transport,
        })
    }

    /// Client over HTTPS with the default token source (environment token
    /// or `gcloud auth print-access-token`)
    pub fn connect(
        project_id: impl Into<String>,
        location: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::with_endpoint(endpoint.unwrap_or(DEFAULT_ENDPOINT), default_token_source());
        Self::new(project_id, location, Arc::new(transport))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }

    /// `projects/{project}/locations/{location}/repositories/{repository}`
    pub fn repository_path(&self, repository: &str) -> String {
        format!("{}/repositories/{}", self.location_path(), repository)
    }

    /// `.../repositories/{repository}/workspaces/{workspace}`
    pub fn workspace_path(&self, repository: &str, workspace: &str) -> String {
        format!("{}/workspaces/{}", self.repository_path(repository), workspace)
    }

    fn require_workspace(repository: &str, workspace: &str) -> Result<(), ApiError> {
        require(repository, "Dataform repository name must be provided.")?;
        require(workspace, "Dataform workspace name must be provided.")
    }

    /// Follow `nextPageToken` until every item of `field` is collected
    async fn list_all<T: DeserializeOwned>(&self, path: String, field: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = ApiRequest::get(path.clone());
            if let Some(token) = page_token.take() {
                request = request.with_query("pageToken", token);
            }

            let mut page = self.transport.send(request).await?;
            if let Some(list) = page.get_mut(field).map(Value::take) {
                items.extend(decode::<Vec<T>>(list)?);
            }

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Lists all repositories in the project and location
    pub async fn list_repositories(&self) -> Result<Vec<Repository>, ApiError> {
        self.list_all(format!("{}/repositories", self.location_path()), "repositories")
            .await
    }

    pub async fn get_repository(&self, repository: &str) -> Result<Repository, ApiError> {
        require(repository, "Dataform repository name must be provided.")?;
        let value = self.transport.send(ApiRequest::get(self.repository_path(repository))).await?;
        decode(value)
    }

    /// Lists all workspaces of a repository
    pub async fn list_workspaces(&self, repository: &str) -> Result<Vec<Workspace>, ApiError> {
        require(repository, "Dataform repository name must be provided.")?;
        self.list_all(format!("{}/workspaces", self.repository_path(repository)), "workspaces")
            .await
    }

    pub async fn get_workspace(&self, repository: &str, workspace: &str) -> Result<Workspace, ApiError> {
        Self::require_workspace(repository, workspace)?;
        let value = self
            .transport
            .send(ApiRequest::get(self.workspace_path(repository, workspace)))
            .await?;
        decode(value)
    }

    /// Creates a workspace. When it already exists the existing workspace
    /// is returned instead; any other failure is returned as is.
    pub async fn create_workspace(&self, repository: &str, workspace: &str) -> Result<Workspace, ApiError> {
        Self::require_workspace(repository, workspace)?;

        let request = ApiRequest::post(format!("{}/workspaces", self.repository_path(repository)), json!({}))
            .with_query("workspaceId", workspace);

        match self.transport.send(request).await {
            Ok(value) => decode(value),
            Err(e) if e.is_already_exists() => {
                tracing::warn!(repository, workspace, error = %e, "workspace already exists, fetching it");
                self.get_workspace(repository, workspace).await
            }
            Err(e) => Err(e),
        }
    }

    /// Compiles either a workspace or a git commitish (branch, tag or sha);
    /// exactly one of the two must be given
    pub async fn create_compilation_result(
        &self,
        repository: &str,
        config: &CodeCompilationConfig,
        workspace: Option<&str>,
        git_commitish: Option<&str>,
    ) -> Result<CompilationResult, ApiError> {
        require(repository, "Dataform repository name must be provided.")?;

        let workspace = workspace.filter(|w| !w.trim().is_empty());
        let git_commitish = git_commitish.filter(|g| !g.trim().is_empty());
        let body = match (workspace, git_commitish) {
            (Some(_), Some(_)) => {
                return Err(ApiError::InvalidArgument(
                    "compile either a git commitish (e.g. a branch name) or a workspace, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(ApiError::missing(
                    "A git commitish (e.g. a branch name) or a workspace name must be provided for compilation.",
                ))
            }
            (Some(workspace), None) => CompilationResult {
                workspace: Some(self.workspace_path(repository, workspace)),
                code_compilation_config: Some(config.clone()),
                ..Default::default()
            },
            (None, Some(commitish)) => CompilationResult {
                git_commitish: Some(commitish.to_string()),
                code_compilation_config: Some(config.clone()),
                ..Default::default()
            },
        };

        let request = ApiRequest::post(
            format!("{}/compilationResults", self.repository_path(repository)),
            serde_json::to_value(&body)?,
        );
        let result: CompilationResult = decode(self.transport.send(request).await?)?;

        if !result.compilation_errors.is_empty() {
            tracing::warn!(
                name = %result.name,
                errors = result.compilation_errors.len(),
                "compilation result has errors"
            );
        }
        Ok(result)
    }

    /// Actions of a compilation result, by its full resource name
    pub async fn query_compilation_result_actions(
        &self,
        compilation_result: &str,
    ) -> Result<Vec<CompilationResultAction>, ApiError> {
        require(
            compilation_result,
            "The compilation result name must be provided; create one with create_compilation_result.",
        )?;
        self.list_all(format!("{}:query", compilation_result), "compilationResultActions")
            .await
    }

    pub async fn create_workflow_invocation(
        &self,
        repository: &str,
        compilation_result: &str,
        config: &InvocationConfig,
    ) -> Result<WorkflowInvocation, ApiError> {
        require(repository, "Dataform repository name must be provided.")?;
        require(compilation_result, "The compilation result name must be provided.")?;

        let body = WorkflowInvocation {
            compilation_result: Some(compilation_result.to_string()),
            invocation_config: Some(config.clone()),
            ..Default::default()
        };
        let request = ApiRequest::post(
            format!("{}/workflowInvocations", self.repository_path(repository)),
            serde_json::to_value(&body)?,
        );
        decode(self.transport.send(request).await?)
    }

    pub async fn get_workflow_invocation(
        &self,
        repository: &str,
        invocation_id: &str,
    ) -> Result<WorkflowInvocation, ApiError> {
        require(repository, "Dataform repository name must be provided.")?;
        require(invocation_id, "The workflow invocation id must be provided.")?;

        let path = format!("{}/workflowInvocations/{}", self.repository_path(repository), invocation_id);
        decode(self.transport.send(ApiRequest::get(path)).await?)
    }

    /// Writes a file into a workspace (contents are sent base64 encoded)
    pub async fn write_file(
        &self,
        repository: &str,
        workspace: &str,
        path: &str,
        contents: impl AsRef<[u8]>,
    ) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;
        require(path, "The file path must be provided.")?;

        let body = json!({ "path": path, "contents": BASE64.encode(contents.as_ref()) });
        self.workspace_call(repository, workspace, "writeFile", body).await
    }

    pub async fn remove_file(&self, repository: &str, workspace: &str, path: &str) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;
        require(path, "The file path must be provided.")?;

        self.workspace_call(repository, workspace, "removeFile", json!({ "path": path }))
            .await
    }

    pub async fn install_npm_packages(&self, repository: &str, workspace: &str) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;
        self.workspace_call(repository, workspace, "installNpmPackages", json!({}))
            .await
    }

    /// Pulls commits from the remote branch, which defaults to the
    /// workspace name
    pub async fn pull_git_commits(
        &self,
        repository: &str,
        workspace: &str,
        options: &PullOptions,
    ) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;

        let remote_branch = options
            .remote_branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(workspace);
        let body = json!({
            "remoteBranch": remote_branch,
            "author": serde_json::to_value(&options.author)?,
        });
        self.workspace_call(repository, workspace, "pull", body).await
    }

    pub async fn fetch_file_git_statuses(
        &self,
        repository: &str,
        workspace: &str,
    ) -> Result<FileGitStatuses, ApiError> {
        Self::require_workspace(repository, workspace)?;
        let path = format!("{}:fetchFileGitStatuses", self.workspace_path(repository, workspace));
        decode(self.transport.send(ApiRequest::get(path)).await?)
    }

    /// Discards uncommitted changes to `paths` (all files when empty);
    /// `clean` also removes untracked files
    pub async fn reset_workspace_changes(
        &self,
        repository: &str,
        workspace: &str,
        paths: &[String],
        clean: bool,
    ) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;
        self.workspace_call(repository, workspace, "reset", json!({ "paths": paths, "clean": clean }))
            .await
    }

    /// Commits ahead/behind the remote branch, or the workspace's default
    /// remote branch when none is given
    pub async fn fetch_git_ahead_behind(
        &self,
        repository: &str,
        workspace: &str,
        remote_branch: Option<&str>,
    ) -> Result<GitAheadBehind, ApiError> {
        Self::require_workspace(repository, workspace)?;

        let mut request = ApiRequest::get(format!(
            "{}:fetchGitAheadBehind",
            self.workspace_path(repository, workspace)
        ));
        if let Some(branch) = remote_branch.filter(|b| !b.is_empty()) {
            request = request.with_query("remoteBranch", branch);
        }
        decode(self.transport.send(request).await?)
    }

    pub async fn push_workspace_commits(
        &self,
        repository: &str,
        workspace: &str,
        git_branch: &str,
    ) -> Result<(), ApiError> {
        Self::require_workspace(repository, workspace)?;
        require(git_branch, "The remote git branch must be provided.")?;

        self.workspace_call(repository, workspace, "push", json!({ "remoteBranch": git_branch }))
            .await
    }

    async fn workspace_call(&self, repository: &str, workspace: &str, verb: &str, body: Value) -> Result<(), ApiError> {
        let path = format!("{}:{}", self.workspace_path(repository, workspace), verb);
        self.transport.send(ApiRequest::post(path, body)).await?;
        Ok(())
    }

    /// Cloud console page of a workflow invocation
    pub fn workflow_invocation_url(&self, repository: &str, invocation_id: &str) -> String {
        format!(
            "https://console.cloud.google.com/bigquery/dataform/locations/{}/repositories/{}/workflows/{}?project={}",
            self.location, repository, invocation_id, self.project_id
        )
    }

    /// Compiles (workspace or git commitish) and starts a workflow invocation
    pub async fn run_remotely(
        &self,
        repository: &str,
        compilation: &CodeCompilationConfig,
        invocation: &InvocationConfig,
        workspace: Option<&str>,
        git_commitish: Option<&str>,
    ) -> Result<RemoteRun, ApiError> {
        let result = self
            .create_compilation_result(repository, compilation, workspace, git_commitish)
            .await?;
        if result.name.is_empty() {
            return Err(ApiError::InvalidResponse("compilation result has no name".to_string()));
        }

        let workflow_invocation = self
            .create_workflow_invocation(repository, &result.name, invocation)
            .await?;
        let workflow_invocation_id = workflow_invocation
            .id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidResponse("workflow invocation has no name".to_string()))?;
        let workflow_invocation_url = self.workflow_invocation_url(repository, &workflow_invocation_id);

        tracing::info!(
            compilation_result = resource_id(&result.name),
            invocation = %workflow_invocation_id,
            "started workflow invocation"
        );

        Ok(RemoteRun {
            workflow_invocation,
            workflow_invocation_id,
            workflow_invocation_url,
        })
    }
}
