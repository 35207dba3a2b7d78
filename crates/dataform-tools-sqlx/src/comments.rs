//! Comment regions in SQLX text
//!
//! SQLX mixes SQL (`--`, `/* */`) and JavaScript (`//`, `/* */`) comments.
//! Quoted strings (`'`, `"`, and backtick templates) are skipped so that a
//! marker inside a literal such as `'--'` does not open a comment. Single
//! and double quoted strings end at the line break; backtick templates may
//! span lines.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Quoted(u8),
    LineComment(usize),
    BlockComment(usize),
}

/// Byte ranges of every comment in a document, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentMap {
    ranges: Vec<Range<usize>>,
}

impl CommentMap {
    /// Scan a document for comments. An unterminated block comment runs to
    /// the end of the text.
    pub fn scan(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut ranges = Vec::new();
        let mut state = State::Code;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();

            match state {
                State::Code => match (b, next) {
                    (b'/', Some(b'*')) => {
                        state = State::BlockComment(i);
                        i += 2;
                        continue;
                    }
                    (b'-', Some(b'-')) | (b'/', Some(b'/')) => {
                        state = State::LineComment(i);
                        i += 2;
                        continue;
                    }
                    (b'\'' | b'"' | b'`', _) => state = State::Quoted(b),
                    _ => {}
                },
                State::Quoted(quote) => {
                    if b == b'\\' {
                        i += 2;
                        continue;
                    }
                    if b == quote || (b == b'\n' && quote != b'`') {
                        state = State::Code;
                    }
                }
                State::LineComment(start) => {
                    if b == b'\n' {
                        ranges.push(start..i);
                        state = State::Code;
                    }
                }
                State::BlockComment(start) => {
                    if b == b'*' && next == Some(b'/') {
                        ranges.push(start..i + 2);
                        state = State::Code;
                        i += 2;
                        continue;
                    }
                }
            }

            i += 1;
        }

        match state {
            State::LineComment(start) | State::BlockComment(start) => ranges.push(start..bytes.len()),
            State::Code | State::Quoted(_) => {}
        }

        Self { ranges }
    }

    /// Comment byte ranges
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Whether the byte at `offset` lies inside a comment
    pub fn is_commented(&self, offset: usize) -> bool {
        let idx = self.ranges.partition_point(|r| r.end <= offset);
        self.ranges
            .get(idx)
            .map_or(false, |r| r.start <= offset && offset < r.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_line_and_block_comments() {
        let text = "select 1 -- trailing\n/* block\nspans */ select 2 // js\n";
        let map = CommentMap::scan(text);

        let found: Vec<&str> = map.ranges().iter().map(|r| &text[r.clone()]).collect();
        assert_eq!(found, vec!["-- trailing", "/* block\nspans */", "// js"]);
    }

    #[test]
    fn markers_inside_strings_are_not_comments() {
        let text = "select '--not', \"/*nope*/\", `a // b` -- yes";
        let map = CommentMap::scan(text);

        assert_eq!(map.ranges().len(), 1);
        assert_eq!(&text[map.ranges()[0].clone()], "-- yes");
    }

    #[test]
    fn unterminated_block_runs_to_end() {
        let text = "select 1 /* open\nstill open";
        let map = CommentMap::scan(text);
        assert_eq!(map.ranges(), &[9..text.len()]);
        assert!(map.is_commented(text.len() - 1));
    }

    #[test]
    fn single_quote_string_ends_at_newline() {
        let text = "-- it's fine\nselect 'unterminated\n-- comment";
        let map = CommentMap::scan(text);
        assert_eq!(map.ranges().len(), 2);
    }

    #[test]
    fn is_commented_boundaries() {
        let text = "a /* b */ c";
        let map = CommentMap::scan(text);
        assert!(!map.is_commented(0));
        assert!(map.is_commented(2));
        assert!(map.is_commented(8));
        assert!(!map.is_commented(9));
        assert!(!map.is_commented(10));
    }
}
