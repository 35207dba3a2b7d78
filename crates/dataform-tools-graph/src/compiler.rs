//! `dataform compile` runner

use dataform_tools_core::{
    CompiledError, CompiledGraph, Diagnostic, DiagnosticCode, Location, Severity,
};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Compilation runner errors
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to run {cli}: {source}")]
    Spawn {
        cli: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{cli} compile exited with {status}: {stderr}")]
    Failed {
        cli: String,
        status: String,
        stderr: String,
    },

    #[error("Compiler output is not a compiled graph: {0}")]
    InvalidOutput(#[from] CompiledError),
}

/// Runs the Dataform CLI against a project root
#[derive(Debug, Clone)]
pub struct DataformCompiler {
    cli: String,
}

impl Default for DataformCompiler {
    fn default() -> Self {
        Self::new("dataform")
    }
}

impl DataformCompiler {
    /// Runner invoking `cli` (a program name on PATH or a path)
    pub fn new(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    /// Command line used for a project root
    pub fn args(root: &Path) -> Vec<String> {
        vec![
            "compile".to_string(),
            root.display().to_string(),
            "--json".to_string(),
        ]
    }

    /// Compile the project at `root`
    ///
    /// The CLI exits non-zero when the project has compilation errors but
    /// still prints the graph, so stdout is parsed whenever it holds JSON.
    pub async fn compile(&self, root: &Path) -> Result<CompiledGraph, CompileError> {
        tracing::info!(cli = %self.cli, root = %root.display(), "compiling project");

        let output = Command::new(&self.cli)
            .args(Self::args(root))
            .current_dir(root)
            .output()
            .await
            .map_err(|source| CompileError::Spawn {
                cli: self.cli.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json = stdout.trim();

        if !json.starts_with('{') {
            return Err(CompileError::Failed {
                cli: self.cli.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let graph = CompiledGraph::from_json(json)?;
        tracing::debug!(
            actions = graph.actions().count(),
            errors = graph.graph_errors.compilation_errors.len(),
            "compiled project"
        );
        Ok(graph)
    }

    /// Load a compiled graph from a precomputed file, or compile `root`
    pub async fn load_or_compile(
        &self,
        root: &Path,
        compiled_json: Option<PathBuf>,
    ) -> Result<CompiledGraph, CompileError> {
        match compiled_json {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading compiled graph from file");
                Ok(CompiledGraph::from_file(&path)?)
            }
            None => self.compile(root).await,
        }
    }
}

/// Diagnostics for the compilation errors reported against `file_name`
pub fn compilation_diagnostics(graph: &CompiledGraph, file_name: &str) -> Vec<Diagnostic> {
    graph
        .errors_for_file(file_name)
        .map(|error| {
            Diagnostic::new(DiagnosticCode::CompilationError, Severity::Error, error.message.clone())
                .with_location(Location::with_line(file_name, 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compile_command_line() {
        assert_eq!(
            DataformCompiler::args(Path::new("/work/project")),
            vec!["compile", "/work/project", "--json"]
        );
    }

    #[test]
    fn errors_become_diagnostics_for_their_file() {
        let graph = CompiledGraph::from_json(
            r#"{"graphErrors": {"compilationErrors": [
                {"fileName": "definitions/a.sqlx", "message": "Unexpected token"},
                {"fileName": "definitions/b.sqlx", "message": "Other file"}
            ]}}"#,
        )
        .unwrap();

        let diags = compilation_diagnostics(&graph, "definitions/a.sqlx");

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::CompilationError);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].message, "Unexpected token");
        assert_eq!(diags[0].location.as_ref().unwrap().line, Some(1));
    }

    #[tokio::test]
    async fn missing_cli_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = DataformCompiler::new("dataform-cli-that-does-not-exist");

        let err = compiler.compile(dir.path()).await.unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[tokio::test]
    async fn precomputed_graph_skips_the_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compiled.json");
        std::fs::write(&path, r#"{"tables": [{"target": {"schema": "s", "name": "t"}}]}"#).unwrap();

        let compiler = DataformCompiler::new("dataform-cli-that-does-not-exist");
        let graph = compiler.load_or_compile(dir.path(), Some(path)).await.unwrap();

        assert_eq!(graph.tables.len(), 1);
    }
}
