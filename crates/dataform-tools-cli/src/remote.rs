//! `dataform-tools remote ...`: managed Dataform API commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use dataform_tools_api::{CodeCompilationConfig, DataformTools, InvocationConfig};
use dataform_tools_core::{Config, Target};

/// Project, location and repository, defaulting to the `[gcp]` config section
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteTarget {
    /// GCP project id
    #[arg(long)]
    pub project_id: Option<String>,

    /// Dataform location, e.g. europe-west2
    #[arg(long)]
    pub location: Option<String>,

    /// Dataform repository name
    #[arg(long)]
    pub repository: Option<String>,
}

/// Compile from exactly one of a workspace or a git commitish
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct CompileSource {
    /// Workspace to compile
    #[arg(long)]
    pub workspace: Option<String>,

    /// Branch, tag or commit to compile
    #[arg(long)]
    pub git_commitish: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RemoteCommand {
    /// List repositories
    Repos {
        #[command(flatten)]
        target: RemoteTarget,
    },

    /// List workspaces of a repository
    Workspaces {
        #[command(flatten)]
        target: RemoteTarget,
    },

    /// Create a workspace, or return it if it already exists
    CreateWorkspace {
        name: String,

        #[command(flatten)]
        target: RemoteTarget,
    },

    /// Create a compilation result
    Compile {
        #[command(flatten)]
        source: CompileSource,

        #[command(flatten)]
        target: RemoteTarget,
    },

    /// List the actions of a compilation result
    Actions {
        /// Full compilation result name
        compilation_result: String,

        #[command(flatten)]
        target: RemoteTarget,
    },

    /// Compile and start a workflow invocation
    Run {
        #[command(flatten)]
        source: CompileSource,

        /// Only run actions with these tags
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only run these actions (database.schema.name, schema.name or name)
        #[arg(long = "action")]
        actions: Vec<String>,

        /// Also run dependencies of the selected actions
        #[arg(long)]
        include_dependencies: bool,

        /// Also run dependents of the selected actions
        #[arg(long)]
        include_dependents: bool,

        /// Rebuild incremental tables from scratch
        #[arg(long)]
        full_refresh: bool,

        #[command(flatten)]
        target: RemoteTarget,
    },

    /// Show the status of a workflow invocation
    Invocation {
        /// Invocation id
        id: String,

        #[command(flatten)]
        target: RemoteTarget,
    },
}

struct Resolved {
    tools: DataformTools,
    repository: Option<String>,
}

impl Resolved {
    fn repository(&self) -> Result<&str> {
        self.repository
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Dataform repository name must be provided (--repository or [gcp] repository)."))
    }
}

fn resolve(config: &Config, target: RemoteTarget) -> Result<Resolved> {
    let project_id = target.project_id.or_else(|| config.gcp.project_id.clone()).unwrap_or_default();
    let location = target.location.or_else(|| config.gcp.location.clone()).unwrap_or_default();

    let tools = DataformTools::connect(project_id, location, config.gcp.api_endpoint.as_deref())?;
    Ok(Resolved {
        tools,
        repository: target.repository.or_else(|| config.gcp.repository.clone()),
    })
}

/// Parse `database.schema.name`, `schema.name` or `name`
pub fn parse_target(s: &str) -> Result<Target> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("Invalid action target '{}'", s);
    }

    let target = match parts.as_slice() {
        [name] => Target {
            database: None,
            schema: None,
            name: name.to_string(),
        },
        [schema, name] => Target {
            database: None,
            schema: Some(schema.to_string()),
            name: name.to_string(),
        },
        [database, schema, name] => Target::new(*database, *schema, *name),
        _ => anyhow::bail!("Invalid action target '{}'", s),
    };
    Ok(target)
}

pub async fn run(config: &Config, command: RemoteCommand, verbose: bool) -> Result<()> {
    match command {
        RemoteCommand::Repos { target } => {
            let resolved = resolve(config, target)?;
            let repos = resolved.tools.list_repositories().await?;

            println!("{}", "Repositories".bold());
            for repo in &repos {
                let id = repo.name.rsplit('/').next().unwrap_or(&repo.name);
                match repo.git_remote_settings.as_ref() {
                    Some(git) => println!("  {} {}", id.green(), git.url.dimmed()),
                    None => println!("  {}", id.green()),
                }
            }
            println!("{} repositories", repos.len());
        }

        RemoteCommand::Workspaces { target } => {
            let resolved = resolve(config, target)?;
            let workspaces = resolved.tools.list_workspaces(resolved.repository()?).await?;

            println!("{}", "Workspaces".bold());
            for workspace in &workspaces {
                println!("  {}", workspace.id().green());
            }
            println!("{} workspaces", workspaces.len());
        }

        RemoteCommand::CreateWorkspace { name, target } => {
            let resolved = resolve(config, target)?;
            let workspace = resolved
                .tools
                .create_workspace(resolved.repository()?, &name)
                .await?;
            println!("{} {}", "Workspace:".bold(), workspace.name.green());
        }

        RemoteCommand::Compile { source, target } => {
            let resolved = resolve(config, target)?;
            let result = resolved
                .tools
                .create_compilation_result(
                    resolved.repository()?,
                    &CodeCompilationConfig::default(),
                    source.workspace.as_deref(),
                    source.git_commitish.as_deref(),
                )
                .await?;

            println!("{} {}", "Compilation result:".bold(), result.name.green());
            if let Some(sha) = &result.resolved_git_commit_sha {
                println!("  Commit: {}", sha);
            }
            if result.compilation_errors.is_empty() {
                println!("{}", "✓ No compilation errors".green());
            } else {
                for error in &result.compilation_errors {
                    println!(
                        "  [{}] {}: {}",
                        "ERROR".red().bold(),
                        error.path.as_deref().unwrap_or("<unknown>"),
                        error.message
                    );
                }
                std::process::exit(1);
            }
        }

        RemoteCommand::Actions {
            compilation_result,
            target,
        } => {
            let resolved = resolve(config, target)?;
            let actions = resolved
                .tools
                .query_compilation_result_actions(&compilation_result)
                .await?;

            for action in &actions {
                println!(
                    "  {:<12} {} {}",
                    action.kind().cyan(),
                    action.target,
                    action.file_path.as_deref().unwrap_or_default().dimmed()
                );
            }
            println!("{} actions", actions.len());
        }

        RemoteCommand::Run {
            source,
            tags,
            actions,
            include_dependencies,
            include_dependents,
            full_refresh,
            target,
        } => {
            let resolved = resolve(config, target)?;
            let included_targets = actions
                .iter()
                .map(|a| parse_target(a))
                .collect::<Result<Vec<_>>>()?;
            let invocation = InvocationConfig {
                included_targets,
                included_tags: tags,
                transitive_dependencies_included: include_dependencies,
                transitive_dependents_included: include_dependents,
                fully_refresh_incremental_tables_enabled: full_refresh,
                service_account: config.gcp.service_account.clone(),
            };

            if verbose {
                eprintln!("{}", "Compiling and starting workflow invocation...".cyan());
            }
            let run = resolved
                .tools
                .run_remotely(
                    resolved.repository()?,
                    &CodeCompilationConfig::default(),
                    &invocation,
                    source.workspace.as_deref(),
                    source.git_commitish.as_deref(),
                )
                .await
                .context("Remote run failed")?;

            println!("{} {}", "Invocation:".bold(), run.workflow_invocation_id.green());
            println!("  {}", run.workflow_invocation_url);
        }

        RemoteCommand::Invocation { id, target } => {
            let resolved = resolve(config, target)?;
            let repository = resolved.repository()?;
            let invocation = resolved.tools.get_workflow_invocation(repository, &id).await?;
            let status = invocation.job_status(Some(resolved.tools.workflow_invocation_url(repository, &id)));

            let state = match status.state.as_str() {
                "SUCCEEDED" => status.state.green().bold(),
                "FAILED" | "CANCELLED" => status.state.red().bold(),
                _ => status.state.yellow(),
            };
            println!("{} {}", "Invocation:".bold(), status.job_id);
            println!("  State:   {}", state);
            if let Some(elapsed) = status.elapsed_seconds {
                println!("  Elapsed: {:.1}s", elapsed);
            }
            if let Some(error) = &status.error_message {
                println!("  Error:   {}", error.red());
            }
            if let Some(url) = &status.url {
                println!("  {}", url);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_targets() {
        assert_eq!(parse_target("p.s.t").unwrap(), Target::new("p", "s", "t"));
        assert_eq!(parse_target("s.t").unwrap().schema.as_deref(), Some("s"));
        assert_eq!(parse_target("t").unwrap().database, None);
        assert!(parse_target("a..b").is_err());
        assert!(parse_target("a.b.c.d").is_err());
    }

    #[test]
    fn missing_repository_is_reported() {
        let mut config = Config::default();
        config.gcp.project_id = Some("acme".to_string());
        config.gcp.location = Some("europe-west2".to_string());

        let resolved = resolve(&config, RemoteTarget::default()).unwrap();

        assert!(resolved.repository().is_err());
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.gcp.project_id = Some("acme".to_string());
        config.gcp.location = Some("europe-west2".to_string());
        config.gcp.repository = Some("analytics".to_string());

        let resolved = resolve(
            &config,
            RemoteTarget {
                repository: Some("other".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(resolved.repository().unwrap(), "other");
        assert_eq!(resolved.tools.project_id(), "acme");
    }
}
