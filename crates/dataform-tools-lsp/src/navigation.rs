//! Go-to-definition and hover for reference calls

use dataform_tools_core::{Action, CompiledGraph};
use dataform_tools_sqlx::text::utf16_len;
use dataform_tools_sqlx::{LineIndex, MatchMode, Position, ReferenceExtractor, RenameEngine};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFINITIONS_DIR: &str = "definitions";
const SOURCES_FILE: &str = "sources.js";

/// Where a definition lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionTarget {
    pub path: PathBuf,
    pub position: Position,
}

/// Definition of the word at `position`, only on lines holding a reference
/// call. A file under `definitions/` whose stem equals the word wins;
/// otherwise the last line of a `sources.js` mentioning the word.
pub fn find_definition(root: &Path, text: &str, position: Position) -> Option<DefinitionTarget> {
    let index = LineIndex::new(text);
    let line = index.line_text(position.line as usize)?;
    if !line.contains("${ref(") {
        return None;
    }

    let word = RenameEngine::new(MatchMode::Substring).word_at(text, position)?;
    let files = definition_files(&root.join(DEFINITIONS_DIR));

    if let Some(path) = files.iter().find(|p| file_stem(p) == Some(word.text.as_str())) {
        return Some(DefinitionTarget {
            path: path.clone(),
            position: Position::new(0, 0),
        });
    }

    files
        .iter()
        .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(SOURCES_FILE))
        .find_map(|path| {
            let contents = std::fs::read_to_string(path).ok()?;
            let position = last_occurrence(&contents, &word.text)?;
            Some(DefinitionTarget {
                path: path.clone(),
                position,
            })
        })
}

fn definition_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// File name up to its first dot
fn file_stem(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.split('.').next()
}

fn last_occurrence(contents: &str, word: &str) -> Option<Position> {
    let index = LineIndex::new(contents);
    index
        .lines()
        .filter_map(|(line_no, line)| {
            let byte = line.find(word)?;
            Some(Position::new(line_no as u32, utf16_len(&line[..byte]) as u32))
        })
        .last()
}

/// Markdown hover for the reference call under `position`, resolved against
/// the compiled graph
pub fn reference_hover(text: &str, position: Position, graph: &CompiledGraph) -> Option<String> {
    let offset = LineIndex::new(text).offset(position)?;
    let reference = ReferenceExtractor::reference_at(text, offset)?;
    let action = graph.resolve_reference(&reference.args)?;
    Some(action_markdown(action))
}

fn action_markdown(action: &Action) -> String {
    let fqn = action.target.fqn();
    let mut out = match action.target.console_url() {
        Some(url) => format!("[{}]({})", fqn, url),
        None => format!("`{}`", fqn),
    };

    out.push_str(&format!("\n\n**Type:** {}", action.kind.as_str()));
    if !action.tags.is_empty() {
        out.push_str(&format!("\n\n**Tags:** {}", action.tags.join(", ")));
    }
    if !action.dependency_targets.is_empty() {
        out.push_str("\n\n**Dependencies:**");
        for dep in &action.dependency_targets {
            out.push_str(&format!("\n- `{}`", dep.fqn()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let defs = dir.path().join("definitions");
        fs::create_dir_all(defs.join("staging")).unwrap();
        fs::create_dir_all(defs.join("sources")).unwrap();
        fs::write(defs.join("staging/stg_users.sqlx"), "select 1").unwrap();
        fs::write(
            defs.join("sources/sources.js"),
            "declare({ schema: \"app\", name: \"events\" });\n// events is raw\nconst x = 1;\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn definition_prefers_file_stem() {
        let dir = project();
        let text = "select * from ${ref(\"stg_users\")}";

        let found = find_definition(dir.path(), text, Position::new(0, 24)).unwrap();

        assert!(found.path.ends_with("definitions/staging/stg_users.sqlx"));
        assert_eq!(found.position, Position::new(0, 0));
    }

    #[test]
    fn definition_falls_back_to_last_sources_line() {
        let dir = project();
        let text = "select * from ${ref(\"events\")}";

        let found = find_definition(dir.path(), text, Position::new(0, 23)).unwrap();

        assert!(found.path.ends_with("sources.js"));
        assert_eq!(found.position, Position::new(1, 3));
    }

    #[test]
    fn definition_needs_reference_line() {
        let dir = project();
        assert_eq!(find_definition(dir.path(), "select stg_users", Position::new(0, 9)), None);
    }

    #[test]
    fn hover_shows_resolved_target() {
        let graph = CompiledGraph::from_json(
            r#"{"tables": [{
                "target": {"database": "p", "schema": "s", "name": "users"},
                "fileName": "definitions/users.sqlx",
                "type": "view",
                "tags": ["daily"],
                "dependencyTargets": [{"database": "p", "schema": "raw", "name": "events"}]
            }]}"#,
        )
        .unwrap();
        let text = "from ${ref(\"users\")}";

        let hover = reference_hover(text, Position::new(0, 13), &graph).unwrap();

        assert!(hover.starts_with("[p.s.users](https://console.cloud.google.com/bigquery?project=p"));
        assert!(hover.contains("**Type:** view"));
        assert!(hover.contains("**Tags:** daily"));
        assert!(hover.contains("- `p.raw.events`"));
        assert_eq!(reference_hover(text, Position::new(0, 1), &graph), None);
    }
}
