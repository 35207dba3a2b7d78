//! Client for the managed Dataform API (Google Cloud)
//!
//! ## Example
//!
//! ```rust,ignore
//! use dataform_tools_api::DataformTools;
//!
//! let tools = DataformTools::connect("my-project", "europe-west2", None)?;
//! let workspace = tools.create_workspace("analytics", "feature-x").await?;
//! let run = tools
//!     .run_remotely("analytics", &Default::default(), &Default::default(), Some(workspace.id()), None)
//!     .await?;
//! println!("{}", run.workflow_invocation_url);
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod mock;
pub mod transport;
pub mod types;

pub use auth::{default_token_source, GcloudToken, StaticToken, TokenSource};
pub use client::DataformTools;
pub use error::{ApiError, RpcCode};
pub use mock::MockTransport;
pub use transport::{ApiRequest, HttpTransport, Method, Transport, DEFAULT_ENDPOINT};
pub use types::{
    CodeCompilationConfig, CommitAuthor, CompilationResult, CompilationResultAction, FileGitStatus,
    FileGitStatuses, GitAheadBehind, InvocationConfig, PullOptions, RemoteRun, Repository, Workspace,
    WorkflowInvocation,
};
