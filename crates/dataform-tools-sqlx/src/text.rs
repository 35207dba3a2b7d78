//! Line/column bookkeeping
//!
//! Positions are 0-based lines and UTF-16 columns, the unit editors speak.

use serde::{Deserialize, Serialize};

/// 0-based line and UTF-16 column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open range between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span on a single line
    pub fn on_line(line: u32, start: u32, end: u32) -> Self {
        Self::new(Position::new(line, start), Position::new(line, end))
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Index of line start offsets for a document
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset where a line starts
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Text of a line without its terminator (`\n` or `\r\n`)
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let raw = &self.text[start..end];
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }

    /// Iterate `(line number, line text)`
    pub fn lines(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        (0..self.line_count()).filter_map(move |i| self.line_text(i).map(|t| (i, t)))
    }

    /// Position of a byte offset (clamped to the document end)
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        Position::new(line as u32, utf16_len(&self.text[start..offset]) as u32)
    }

    /// Span of a byte range
    pub fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.position(start), self.position(end))
    }

    /// Byte offset of a position. Columns past the end of the line clamp to
    /// the line end; lines past the end of the document return `None`.
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = self.line_start(line)?;
        let text = self.line_text(line)?;
        Some(start + byte_column(text, position.character))
    }
}

/// Number of UTF-16 code units in `s`
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Byte offset within `line` of a UTF-16 column, clamped to the line length
pub fn byte_column(line: &str, character: u32) -> usize {
    let mut units = 0usize;
    for (i, c) in line.char_indices() {
        if units >= character as usize {
            return i;
        }
        units += c.len_utf16();
    }
    line.len()
}

/// Characters that make up a word: Unicode alphanumerics and `_`
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte range of the word touching `byte_col` in `line`: the word containing
/// the column, or the word ending right before it.
pub fn word_range(line: &str, byte_col: usize) -> Option<std::ops::Range<usize>> {
    let byte_col = byte_col.min(line.len());

    let after = line[byte_col..].chars().next().filter(|c| is_word_char(*c));
    let before = line[..byte_col].chars().next_back().filter(|c| is_word_char(*c));
    if after.is_none() && before.is_none() {
        return None;
    }

    let start = line[..byte_col]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(byte_col);
    let end = line[byte_col..]
        .char_indices()
        .find(|(_, c)| !is_word_char(*c))
        .map(|(i, _)| byte_col + i)
        .unwrap_or(line.len());

    Some(start..end)
}
