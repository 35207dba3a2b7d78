//! Compiled project graph
//!
//! - [`dag`]: dependency graph over compiled actions, tree payloads for the
//!   dependency panel, transitive upstream/downstream queries, run order
//! - [`compiler`]: runs `dataform compile --json` and maps compilation errors
//!   to diagnostics
//! - [`checks`]: per-document diagnostics (config lint, unresolved
//!   references, compilation errors)

pub mod dag;
pub mod compiler;
pub mod checks;

pub use dag::{DependencyGraph, GraphNode, NodeId};
pub use compiler::{compilation_diagnostics, CompileError, DataformCompiler};
pub use checks::document_diagnostics;
