//! SQLX text scanning
//!
//! This crate handles:
//! - Mapping byte offsets to editor positions (UTF-16 columns)
//! - Finding comments so references inside them can be ignored
//! - Extracting `${ref(...)}` references
//! - Document-wide rename of the word under the cursor
//! - Locating config / js / pre_operations / post_operations / SQL blocks
//! - Linting the `config { ... }` block
//! - Completion candidates for config properties, enum values, references
//!   and tags
//!
//! Everything here works on a document snapshot; nothing touches the
//! filesystem.

pub mod text;
pub mod comments;
pub mod references;
pub mod rename;
pub mod blocks;
pub mod config_lint;
pub mod completion;

pub use text::{LineIndex, Position, Span};
pub use comments::CommentMap;
pub use references::{Reference, ReferenceExtractor};
pub use rename::{apply_edits, MatchMode, RenameEngine, TextEdit, Word};
pub use blocks::{BlockRange, SqlxBlocks};
pub use config_lint::ConfigLinter;
pub use completion::{Completion, CompletionEngine, CompletionKind};
