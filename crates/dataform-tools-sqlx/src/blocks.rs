//! SQLX block layout
//!
//! Locates the `config`, `js`, `pre_operations` and `post_operations` blocks
//! by brace depth; every other non-empty line outside those blocks belongs to
//! the SQL body. A block left open runs to the last non-empty line. Line
//! numbers are 1-based.

use serde::Serialize;

/// Inclusive 1-based line range of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRange {
    pub start_line: usize,
    pub end_line: usize,
}

impl BlockRange {
    fn new(start_line: usize, end_line: usize) -> Self {
        Self { start_line, end_line }
    }
}

/// Block layout of one SQLX file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlxBlocks {
    pub config: Option<BlockRange>,
    pub js: Option<BlockRange>,
    pub pre_operations: Vec<BlockRange>,
    pub post_operations: Vec<BlockRange>,
    pub sql: Option<BlockRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Config,
    Js,
    PreOperations,
    PostOperations,
}

impl Kind {
    fn from_line(trimmed: &str) -> Option<Self> {
        if trimmed.starts_with("config {") {
            Some(Self::Config)
        } else if trimmed.starts_with("js {") {
            Some(Self::Js)
        } else if trimmed.starts_with("post_operations {") {
            Some(Self::PostOperations)
        } else if trimmed.starts_with("pre_operations {") {
            Some(Self::PreOperations)
        } else {
            None
        }
    }
}

impl SqlxBlocks {
    pub fn scan(text: &str) -> Self {
        let mut blocks = Self::default();
        let mut depth: i64 = 0;
        let mut open: Option<(Kind, usize)> = None;
        let mut last_line = 0;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            last_line = line_no;

            let opened = line.matches('{').count() as i64;
            let closed = line.matches('}').count() as i64;
            depth += opened - closed;

            match open {
                None => match Kind::from_line(trimmed) {
                    Some(kind) => {
                        if kind == Kind::Config {
                            // Anything before the config block is a leading comment
                            blocks.sql = None;
                        }
                        if depth == 0 {
                            blocks.close(kind, line_no, line_no);
                        } else {
                            open = Some((kind, line_no));
                        }
                    }
                    None => {
                        let start = blocks.sql.map_or(line_no, |sql| sql.start_line);
                        blocks.sql = Some(BlockRange::new(start, line_no));
                    }
                },
                Some((kind, start)) if depth == 0 => {
                    blocks.close(kind, start, line_no);
                    open = None;
                }
                Some(_) => {}
            }
        }

        if let Some((kind, start)) = open {
            blocks.close(kind, start, last_line);
        }
        blocks
    }

    fn close(&mut self, kind: Kind, start: usize, end: usize) {
        let range = BlockRange::new(start, end);
        match kind {
            Kind::Config => self.config = Some(range),
            Kind::Js => self.js = Some(range),
            Kind::PreOperations => self.pre_operations.push(range),
            Kind::PostOperations => self.post_operations.push(range),
        }
    }

    /// Whether a 1-based line falls inside the config block
    pub fn in_config(&self, line: usize) -> bool {
        self.config
            .map_or(false, |c| c.start_line <= line && line <= c.end_line)
    }
}
