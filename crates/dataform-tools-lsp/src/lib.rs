//! Dataform tools Language Server Protocol implementation
//!
//! Provides editor integration for SQLX projects:
//! - Document symbols for `${ref(...)}` calls
//! - Rename of the word under the cursor across the document
//! - Completion of config properties and values, `${ref(...)}` targets,
//!   dependencies and tags
//! - Go-to-definition and hover for references
//! - Config block lint, unresolved references and compilation errors as
//!   diagnostics
//! - Custom `dataform/tableMetadata` and `dataform/dependencyTree` requests
//!   for the editor panels

pub mod backend;
pub mod completion;
pub mod convert;
pub mod navigation;
pub mod requests;
pub mod symbols;

pub use backend::Backend;
pub use requests::{DEPENDENCY_TREE_METHOD, TABLE_METADATA_METHOD};
