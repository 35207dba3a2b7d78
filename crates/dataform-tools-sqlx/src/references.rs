//! `${ref(...)}` extraction
//!
//! Dataform references take one to three quoted string arguments:
//! - `${ref("users")}`
//! - `${ref("analytics", "users")}`
//! - `${ref('project', 'analytics', 'users')}`
//!
//! All arguments of one call use the same quote style.

use crate::comments::CommentMap;
use crate::text::{LineIndex, Span};
use regex::Regex;
use std::sync::OnceLock;

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r#"\$\{ref\(\s*(?:"#,
            r#"'([^'"]+)'\s*(?:,\s*'([^'"]+)'\s*)?(?:,\s*'([^'"]+)'\s*)?"#,
            r#"|"([^'"]+)"\s*(?:,\s*"([^'"]+)"\s*)?(?:,\s*"([^'"]+)"\s*)?"#,
            r#")\)\}"#,
        ))
        .expect("reference pattern is valid")
    })
}

/// A reference call found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Literal matched text, e.g. `${ref("users")}`
    pub text: String,

    /// Unquoted arguments in call order
    pub args: Vec<String>,

    /// Byte range of the match
    pub start: usize,
    pub end: usize,

    /// Editor range of the match
    pub span: Span,
}

impl Reference {
    /// 0-based line of the call
    pub fn line(&self) -> u32 {
        self.span.start.line
    }

    /// Referenced action name (last argument)
    pub fn name(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }

    /// Schema argument, for two and three argument calls
    pub fn schema(&self) -> Option<&str> {
        match self.args.len() {
            2 => Some(self.args[0].as_str()),
            3 => Some(self.args[1].as_str()),
            _ => None,
        }
    }

    /// Database argument, for three argument calls
    pub fn database(&self) -> Option<&str> {
        if self.args.len() == 3 {
            Some(self.args[0].as_str())
        } else {
            None
        }
    }
}

/// Extracts reference calls from SQLX text
pub struct ReferenceExtractor;

impl ReferenceExtractor {
    /// Extract all references outside comments, in document order
    pub fn extract(text: &str) -> Vec<Reference> {
        let comments = CommentMap::scan(text);
        let index = LineIndex::new(text);

        reference_regex()
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if comments.is_commented(whole.start()) {
                    return None;
                }

                let args = (1..=6)
                    .filter_map(|i| caps.get(i))
                    .map(|m| m.as_str().to_string())
                    .collect();

                Some(Reference {
                    text: whole.as_str().to_string(),
                    args,
                    start: whole.start(),
                    end: whole.end(),
                    span: index.span(whole.start(), whole.end()),
                })
            })
            .collect()
    }

    /// Reference whose match covers a byte offset
    pub fn reference_at(text: &str, offset: usize) -> Option<Reference> {
        Self::extract(text)
            .into_iter()
            .find(|r| r.start <= offset && offset <= r.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extract_single_argument() {
        let refs = ReferenceExtractor::extract(r#"select * from ${ref("users")}"#);

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].text, r#"${ref("users")}"#);
        assert_eq!(refs[0].args, vec!["users"]);
        assert_eq!(refs[0].name(), "users");
        assert_eq!(refs[0].schema(), None);
        assert_eq!(refs[0].line(), 0);
    }

    #[test]
    fn extract_two_and_three_arguments() {
        let text = "select *\nfrom ${ref('analytics', 'users')}\njoin ${ref( \"proj\" , \"raw\", \"events\" )}";
        let refs = ReferenceExtractor::extract(text);

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].args, vec!["analytics", "users"]);
        assert_eq!(refs[0].schema(), Some("analytics"));
        assert_eq!(refs[0].line(), 1);
        assert_eq!(refs[1].args, vec!["proj", "raw", "events"]);
        assert_eq!(refs[1].database(), Some("proj"));
        assert_eq!(refs[1].schema(), Some("raw"));
        assert_eq!(refs[1].line(), 2);
    }

    #[test]
    fn mixed_quotes_do_not_match() {
        assert!(ReferenceExtractor::extract(r#"${ref("users')}"#).is_empty());
        assert!(ReferenceExtractor::extract(r#"${ref('a', "b")}"#).is_empty());
    }

    #[test]
    fn more_than_three_arguments_do_not_match() {
        assert!(ReferenceExtractor::extract(r#"${ref("a", "b", "c", "d")}"#).is_empty());
    }

    #[test]
    fn reference_at_offset() {
        let text = r#"select * from ${ref("users")} u"#;
        let inside = text.find("users").unwrap();

        assert_eq!(ReferenceExtractor::reference_at(text, inside).unwrap().name(), "users");
        assert!(ReferenceExtractor::reference_at(text, 0).is_none());
    }
}
