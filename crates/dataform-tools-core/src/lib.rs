//! Dataform Tools Core
//!
//! Shared domain model for the Dataform tooling crates: diagnostics,
//! project configuration, the compiled graph produced by
//! `dataform compile --json`, and the payloads sent to editor panels.
//! Diagnostic codes are part of the public API and are never renamed.

pub mod diagnostic;
pub mod config;
pub mod compiled;
pub mod payload;
pub mod report;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use config::{Config, ConfigError, GcpConfig, RenameConfig, CompletionConfig, RefStyle, LintConfig, CompileConfig, SeverityThreshold};
pub use compiled::{CompiledGraph, CompiledError, Action, ActionKind, Target, CompilationError, ProjectConfig};
pub use payload::{TableEntry, TableMetadata, TableMetadataMessage, JobStatus, TreeNode, LegendEntry, TreeData, Direction};
pub use report::{Report, ReportSummary, ReportVersion};
