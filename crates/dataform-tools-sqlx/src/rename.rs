//! Document-wide rename
//!
//! Resolves the word under the cursor and replaces every occurrence of it,
//! line by line. In the default [`MatchMode::Substring`] mode every literal
//! match is replaced, including matches inside longer identifiers
//! (`foo` in `foo_bar`). [`MatchMode::WholeWord`] only replaces matches
//! delimited by non-word characters.

use crate::text::{byte_column, is_word_char, utf16_len, word_range, LineIndex, Position, Span};

/// How occurrences of the old name are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Substring,
    WholeWord,
}

impl MatchMode {
    pub fn from_whole_word(whole_word: bool) -> Self {
        if whole_word {
            Self::WholeWord
        } else {
            Self::Substring
        }
    }
}

/// Word resolved at the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub span: Span,
}

/// Replacement of one range of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
}

/// Rename over a single document snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameEngine {
    mode: MatchMode,
}

impl RenameEngine {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Word at the cursor, or `None` when the cursor is not on a word
    pub fn word_at(&self, text: &str, position: Position) -> Option<Word> {
        let index = LineIndex::new(text);
        let line = index.line_text(position.line as usize)?;
        let range = word_range(line, byte_column(line, position.character))?;

        let start = utf16_len(&line[..range.start]) as u32;
        let end = start + utf16_len(&line[range.clone()]) as u32;

        Some(Word {
            text: line[range].to_string(),
            span: Span::on_line(position.line, start, end),
        })
    }

    /// Edits replacing every occurrence of the word at the cursor with
    /// `new_name`. Returns `None` when there is no word at the cursor.
    pub fn rename(&self, text: &str, position: Position, new_name: &str) -> Option<Vec<TextEdit>> {
        let word = self.word_at(text, position)?;
        let index = LineIndex::new(text);

        let mut edits = Vec::new();
        for (line_no, line) in index.lines() {
            for (start, matched) in line.match_indices(word.text.as_str()) {
                let end = start + matched.len();
                if self.mode == MatchMode::WholeWord && !is_delimited(line, start, end) {
                    continue;
                }

                let start_col = utf16_len(&line[..start]) as u32;
                let end_col = start_col + utf16_len(matched) as u32;
                edits.push(TextEdit {
                    span: Span::on_line(line_no as u32, start_col, end_col),
                    new_text: new_name.to_string(),
                });
            }
        }

        tracing::debug!(word = %word.text, edits = edits.len(), "computed rename edits");
        Some(edits)
    }
}

fn is_delimited(line: &str, start: usize, end: usize) -> bool {
    let before = line[..start].chars().next_back();
    let after = line[end..].chars().next();
    !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
}

/// Apply edits to a document. Edits must not overlap.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
    let index = LineIndex::new(text);
    let mut resolved: Vec<(usize, usize, &str)> = edits
        .iter()
        .filter_map(|e| {
            let start = index.offset(e.span.start)?;
            let end = index.offset(e.span.end)?;
            Some((start, end, e.new_text.as_str()))
        })
        .collect();
    resolved.sort_by_key(|(start, _, _)| *start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end, new_text) in resolved {
        out.push_str(&text[cursor..start]);
        out.push_str(new_text);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn word_at_cursor() {
        let engine = RenameEngine::default();
        let word = engine.word_at("select foo from bar", Position::new(0, 8)).unwrap();

        assert_eq!(word.text, "foo");
        assert_eq!(word.span, Span::on_line(0, 7, 10));
    }

    #[test]
    fn no_word_at_cursor() {
        let engine = RenameEngine::default();
        assert!(engine.word_at("a  b", Position::new(0, 2)).is_none());
        assert!(engine.word_at("abc", Position::new(3, 0)).is_none());
        assert!(engine.rename("a  b", Position::new(0, 2), "x").is_none());
    }

    #[test]
    fn substring_mode_replaces_inside_identifiers() {
        let text = "select foo,\n  foo_id\nfrom foo";
        let engine = RenameEngine::new(MatchMode::Substring);
        let edits = engine.rename(text, Position::new(0, 7), "bar").unwrap();

        assert_eq!(edits.len(), 3);
        assert_eq!(edits[1].span, Span::on_line(1, 2, 5));
        assert_eq!(apply_edits(text, &edits), "select bar,\n  bar_id\nfrom bar");
    }

    #[test]
    fn whole_word_mode_skips_longer_identifiers() {
        let text = "select foo,\n  foo_id\nfrom foo";
        let engine = RenameEngine::new(MatchMode::WholeWord);
        let edits = engine.rename(text, Position::new(2, 6), "bar").unwrap();

        assert_eq!(edits.len(), 2);
        assert_eq!(apply_edits(text, &edits), "select bar,\n  foo_id\nfrom bar");
    }

    #[test]
    fn columns_are_utf16() {
        let text = "-- ñandú\nselect ñandú";
        let engine = RenameEngine::default();
        let edits = engine.rename(text, Position::new(1, 8), "emu").unwrap();

        assert_eq!(edits[0].span, Span::on_line(0, 3, 8));
        assert_eq!(apply_edits(text, &edits), "-- emu\nselect emu");
    }
}
