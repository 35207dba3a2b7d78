//! `config { ... }` block lint
//!
//! Line-based checks of property names and value shapes in the config
//! block and its nested `bigquery` and `assertions` objects. Values that are
//! JavaScript expressions (backtick templates, identifiers such as
//! `constants.NAME`) are accepted wherever a string is expected.

use crate::text::utf16_len;
use dataform_tools_core::{Diagnostic, DiagnosticCode, Location, Severity};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// Properties of the `config` object with their descriptions
pub(crate) const CONFIG_PROPERTIES: &[(&str, &str)] = &[
    ("type", "The type of the dataset: table, view, incremental, inline, declaration or operations."),
    ("database", "The database (Google Cloud project ID) to output the dataset to."),
    ("schema", "The schema (BigQuery dataset) to output the dataset to."),
    ("name", "The name of the dataset."),
    ("description", "The description of the dataset."),
    ("columns", "A map of column names to descriptions or configurations."),
    ("tags", "A list of tags for the dataset."),
    ("dependencies", "A list of dependencies for the dataset."),
    ("hasOutput", "Whether an operations dataset generates an output."),
    ("assertions", "Assertions to run after this dataset is created."),
    ("bigquery", "BigQuery-specific configurations."),
    ("materialized", "Whether a view is materialized."),
    ("onSchemaChange", "Action to take when the schema of an incremental table changes."),
    ("protected", "Prevents the table from being rebuilt from scratch."),
    ("dependOnDependencyAssertions", "Also depend on the assertions of every dependency."),
];

pub(crate) const BIGQUERY_PROPERTIES: &[(&str, &str)] = &[
    ("partitionBy", "Expression for partitioning the table, e.g. DATE(timestamp)."),
    ("clusterBy", "A list of columns by which to cluster the table."),
    ("requirePartitionFilter", "Whether queries must include a partition filter."),
    ("partitionExpirationDays", "Number of days to retain partitions."),
    ("labels", "A map of BigQuery labels to apply to the table."),
    ("updatePartitionFilter", "Limits the partitions scanned in the target table during a MERGE."),
    ("iceberg", "Iceberg table configuration."),
];

pub(crate) const ASSERTION_PROPERTIES: &[(&str, &str)] = &[
    ("nonNull", "The specified columns are not null across all table rows."),
    ("rowConditions", "All table rows follow the custom logic you define."),
    ("uniqueKey", "In a specified column, no table rows have the same value."),
    ("uniqueKeys", "In the specified columns, no table rows have the same value."),
];

pub(crate) const ACTION_TYPES: &[(&str, &str)] = &[
    ("table", "A standard table."),
    ("view", "A standard view."),
    ("incremental", "An incremental table."),
    ("inline", "A query inlined into the actions that reference it."),
    ("declaration", "A data source not managed by Dataform."),
    ("operations", "A custom SQL operation."),
    ("assertion", "A query returning rows that violate a condition."),
];

pub(crate) const ON_SCHEMA_CHANGE: &[(&str, &str)] = &[
    ("IGNORE", "Ignores added columns and shows an error for missing columns. Default."),
    ("FAIL", "Stops the action if any schema change is detected."),
    ("EXTEND", "Adds new columns, adds NULL for previous records. Fails if columns are missing."),
    ("SYNCHRONIZE", "Adds new columns and removes missing ones. Cannot be undone."),
];

fn names<'a>(table: &[(&'a str, &str)]) -> Vec<&'a str> {
    table.iter().map(|(name, _)| *name).collect()
}

const MAX_TABLE_NAME_LEN: usize = 1024;

fn property_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z0-9_]+)\s*:\s*").expect("property pattern is valid"))
}

fn leading_property_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z0-9_]+)\s*:").expect("leading property pattern is valid"))
}

pub(crate) fn nested_block_regex(name: &str) -> &'static Regex {
    static BIGQUERY: OnceLock<Regex> = OnceLock::new();
    static ASSERTIONS: OnceLock<Regex> = OnceLock::new();
    match name {
        "bigquery" => BIGQUERY.get_or_init(|| Regex::new(r"bigquery\s*:\s*\{").expect("bigquery pattern is valid")),
        _ => ASSERTIONS.get_or_init(|| Regex::new(r"assertions\s*:\s*\{").expect("assertions pattern is valid")),
    }
}

fn table_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{M}\p{N}\p{Pc}\p{Pd}\p{Zs}]+$").expect("table name pattern is valid")
    })
}

/// Shape of a property value as written on the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value<'a> {
    /// `"..."` or `'...'`; `raw` includes the quotes
    Quoted { raw: &'a str, inner: &'a str },
    Template,
    Array,
    Object,
    /// Unquoted token: identifier, number, boolean
    Bare(&'a str),
}

/// A `name: value` pair found on a line; offsets are bytes into the line
#[derive(Debug, Clone, Copy)]
struct Property<'a> {
    name: &'a str,
    value_start: usize,
    value: Value<'a>,
}

fn parse_value(rest: &str) -> Option<Value<'_>> {
    let first = rest.chars().next()?;
    match first {
        '\'' | '"' => match rest[1..].find(['\'', '"']) {
            Some(close) => Some(Value::Quoted {
                raw: &rest[..close + 2],
                inner: &rest[1..close + 1],
            }),
            None => Some(Value::Bare(rest.trim_end())),
        },
        '`' => Some(Value::Template),
        '[' => Some(Value::Array),
        '{' => Some(Value::Object),
        _ => {
            let end = rest
                .find(|c: char| c.is_whitespace() || ",{}[]\"'".contains(c))
                .unwrap_or(rest.len());
            if end == 0 {
                None
            } else {
                Some(Value::Bare(&rest[..end]))
            }
        }
    }
}

/// Byte ranges of quoted strings on a single line
fn quoted_regions(line: &str) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let mut open: Option<(char, usize)> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match open {
            Some(_) if c == '\\' => escaped = true,
            Some((quote, start)) if c == quote => {
                regions.push(start..i + 1);
                open = None;
            }
            Some(_) => {}
            None if c == '\'' || c == '"' || c == '`' => open = Some((c, i)),
            None => {}
        }
    }
    if let Some((_, start)) = open {
        regions.push(start..line.len());
    }
    regions
}

fn properties(line: &str) -> Vec<Property<'_>> {
    let quoted = quoted_regions(line);
    property_regex()
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            if quoted.iter().any(|r| r.contains(&name.start())) {
                return None;
            }
            let value = parse_value(&line[whole.end()..])?;
            Some(Property {
                name: name.as_str(),
                value_start: whole.end(),
                value,
            })
        })
        .collect()
}

fn is_js_number(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).is_ok();
    }
    matches!(value, "Infinity" | "-Infinity" | "+Infinity")
        || value.parse::<f64>().map_or(false, f64::is_finite)
}

fn is_boolean(value: &str) -> bool {
    value == "true" || value == "false"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Config,
    BigQuery,
    Assertions,
}

/// Collects diagnostics for one line
struct LineLint<'a, 'd> {
    file: &'a str,
    line_no: usize,
    line: &'a str,
    diagnostics: &'d mut Vec<Diagnostic>,
}

impl<'a, 'd> LineLint<'a, 'd> {
    fn report(&mut self, code: DiagnosticCode, start: usize, text: &str, message: String) {
        let start_col = utf16_len(&self.line[..start]);
        let end_col = start_col + utf16_len(text);
        self.diagnostics.push(
            Diagnostic::new(code, Severity::Warn, message)
                .with_location(Location::with_span(self.file, self.line_no + 1, start_col + 1, end_col + 1)),
        );
    }

    fn invalid_value(&mut self, property: &Property<'_>, offset: usize, text: &str, message: String) {
        self.report(DiagnosticCode::ConfigInvalidValue, property.value_start + offset, text, message);
    }

    fn check_allowed(&mut self, allowed: &[(&str, &str)], block: &str) {
        let allowed = names(allowed);
        let Some(caps) = leading_property_regex().captures(self.line) else {
            return;
        };
        let Some(name) = caps.get(1) else {
            return;
        };
        if !allowed.contains(&name.as_str()) {
            self.report(
                DiagnosticCode::ConfigInvalidProperty,
                name.start(),
                name.as_str(),
                format!(
                    "Invalid property \"{}\" for {} block. Allowed properties: {}.",
                    name.as_str(),
                    block,
                    allowed.join(", ")
                ),
            );
        }
    }

    fn check_boolean(&mut self, p: &Property<'_>) {
        match p.value {
            Value::Quoted { raw, .. } => self.invalid_value(
                p,
                0,
                raw,
                format!("Invalid {} value: {}. Must be a boolean (true or false) without quotes.", p.name, raw),
            ),
            Value::Bare(v) if !is_boolean(v) => self.invalid_value(
                p,
                0,
                v,
                format!("Invalid {} value: {}. Must be a boolean (true or false).", p.name, v),
            ),
            _ => {}
        }
    }

    fn check_number(&mut self, p: &Property<'_>) {
        match p.value {
            Value::Quoted { raw, .. } => self.invalid_value(
                p,
                0,
                raw,
                format!("Invalid {} value: {}. Must be a number without quotes.", p.name, raw),
            ),
            Value::Bare(v) if !is_js_number(v) => self.invalid_value(
                p,
                0,
                v,
                format!("Invalid {} value: {}. Must be a number.", p.name, v),
            ),
            _ => {}
        }
    }

    fn check_array(&mut self, p: &Property<'_>) {
        let text = match p.value {
            Value::Array => return,
            Value::Quoted { raw, .. } => raw,
            Value::Bare(v) => v,
            Value::Template => "`",
            Value::Object => "{",
        };
        self.invalid_value(
            p,
            0,
            text,
            format!("Invalid {} value. Must be an array, e.g. [\"example\"].", p.name),
        );
    }

    fn check_primitive_not_allowed(&mut self, p: &Property<'_>) {
        if let Value::Bare(v) = p.value {
            if is_js_number(v) {
                self.invalid_value(p, 0, v, format!("Invalid {} value: {}. Cannot be a number.", p.name, v));
            } else if is_boolean(v) {
                self.invalid_value(p, 0, v, format!("Invalid {} value: {}. Cannot be a boolean.", p.name, v));
            }
        }
    }

    fn check_object(&mut self, p: &Property<'_>) {
        match p.value {
            Value::Quoted { raw, .. } => {
                self.invalid_value(p, 0, raw, format!("Invalid {} value. Cannot be a string.", p.name))
            }
            Value::Array => self.invalid_value(p, 0, "[", format!("Invalid {} value. Cannot be an array.", p.name)),
            _ => self.check_primitive_not_allowed(p),
        }
    }

    fn check_one_of(&mut self, p: &Property<'_>, valid: &[(&str, &str)]) {
        let valid = names(valid);
        if let Value::Quoted { inner, .. } = p.value {
            if !inner.is_empty() && !valid.contains(&inner) {
                self.invalid_value(
                    p,
                    1,
                    inner,
                    format!("Invalid {} value: \"{}\". Must be one of: {}.", p.name, inner, valid.join(", ")),
                );
            }
        }
    }

    fn check_table_name(&mut self, p: &Property<'_>) {
        let Value::Quoted { inner, .. } = p.value else {
            return;
        };
        if inner.is_empty() {
            return;
        }
        if !table_name_regex().is_match(inner) {
            self.invalid_value(
                p,
                1,
                inner,
                format!(
                    "Invalid {} value: \"{}\". BigQuery table names can only contain letters, numbers, underscores, dashes, and spaces.",
                    p.name, inner
                ),
            );
        }
        if inner.chars().count() > MAX_TABLE_NAME_LEN {
            self.invalid_value(
                p,
                1,
                inner,
                format!("Invalid {} value. Maximum length is {} characters.", p.name, MAX_TABLE_NAME_LEN),
            );
        }
    }

    fn check_section(&mut self, section: Section, depth: i64) {
        match section {
            Section::BigQuery if depth == 1 => self.check_allowed(BIGQUERY_PROPERTIES, "bigquery"),
            Section::Assertions if depth == 1 => self.check_allowed(ASSERTION_PROPERTIES, "assertions"),
            Section::Config if depth == 1 => self.check_allowed(CONFIG_PROPERTIES, "config"),
            _ => {}
        }

        for p in properties(self.line) {
            match (section, p.name) {
                (Section::BigQuery, "requirePartitionFilter") => self.check_boolean(&p),
                (Section::BigQuery, "partitionExpirationDays") => self.check_number(&p),
                (Section::BigQuery, "clusterBy") => self.check_array(&p),
                (Section::BigQuery, "partitionBy") => self.check_primitive_not_allowed(&p),
                (Section::BigQuery, "labels") => self.check_object(&p),

                (Section::Assertions, "nonNull" | "rowConditions" | "uniqueKey" | "uniqueKeys") => {
                    self.check_array(&p)
                }

                (Section::Config, "hasOutput" | "materialized" | "protected") => self.check_boolean(&p),
                (Section::Config, "tags" | "dependencies") => self.check_array(&p),
                (Section::Config, "description" | "database" | "schema") => self.check_primitive_not_allowed(&p),
                (Section::Config, "name") => {
                    self.check_primitive_not_allowed(&p);
                    self.check_table_name(&p);
                }
                (Section::Config, "columns" | "assertions") => self.check_object(&p),
                (Section::Config, "type") => self.check_one_of(&p, ACTION_TYPES),
                (Section::Config, "onSchemaChange") => self.check_one_of(&p, ON_SCHEMA_CHANGE),
                _ => {}
            }
        }
    }
}

pub(crate) fn brace_delta(line: &str) -> i64 {
    line.matches('{').count() as i64 - line.matches('}').count() as i64
}

/// Lints the config block at the top of a SQLX file
#[derive(Debug, Clone, Copy)]
pub struct ConfigLinter {
    max_lines: usize,
}

impl Default for ConfigLinter {
    fn default() -> Self {
        Self { max_lines: 50 }
    }
}

impl ConfigLinter {
    /// Linter scanning at most `max_lines` lines for the config block
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    /// Lint one document. `file` is used for diagnostic locations.
    pub fn lint(&self, file: &str, text: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut in_config = false;
        let mut config_depth: i64 = 0;
        let mut nested: Option<(Section, i64)> = None;

        for (line_no, line) in text.lines().take(self.max_lines).enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if !in_config {
                if trimmed.starts_with("config {") && !trimmed.ends_with('}') {
                    in_config = true;
                    config_depth = 1;
                }
                continue;
            }

            if nested.is_none() {
                let opened = [Section::BigQuery, Section::Assertions].into_iter().find(|s| {
                    let name = if *s == Section::BigQuery { "bigquery" } else { "assertions" };
                    nested_block_regex(name).is_match(trimmed)
                });
                if let Some(section) = opened {
                    if !trimmed.ends_with('}') {
                        nested = Some((section, 1));
                    }
                    continue;
                }
            }

            let (section, depth) = nested.unwrap_or((Section::Config, config_depth));
            LineLint {
                file,
                line_no,
                line,
                diagnostics: &mut diagnostics,
            }
            .check_section(section, depth);

            let delta = brace_delta(line);
            match nested {
                Some((section, depth)) => {
                    let depth = depth + delta;
                    nested = if depth <= 0 { None } else { Some((section, depth)) };
                }
                None => {
                    config_depth += delta;
                    if config_depth <= 0 {
                        break;
                    }
                }
            }
        }

        tracing::debug!(file, diagnostics = diagnostics.len(), "linted config block");
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lint(text: &str) -> Vec<Diagnostic> {
        ConfigLinter::default().lint("definitions/t.sqlx", text)
    }

    fn messages(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.message.as_str()).collect()
    }

    #[test]
    fn valid_config_has_no_diagnostics() {
        let text = r#"config {
  type: "incremental",
  schema: "analytics",
  name: "daily users",
  description: `Users ${constants.SUFFIX}`,
  tags: ["daily", "core"],
  hasOutput: true,
  onSchemaChange: "EXTEND",
  bigquery: {
    partitionBy: "DATE(ts)",
    clusterBy: ["user_id"],
    requirePartitionFilter: false,
    partitionExpirationDays: 30,
    labels: { team: "data" }
  },
  assertions: {
    nonNull: ["user_id"]
  }
}
select 1"#;
        assert_eq!(lint(text), vec![]);
    }

    #[test]
    fn unknown_property_is_reported_with_range() {
        let diags = lint("config {\n  typo: \"table\"\n}");

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::ConfigInvalidProperty);
        assert_eq!(diags[0].severity, Severity::Warn);
        assert_eq!(diags[0].location, Some(Location::with_span("definitions/t.sqlx", 2, 3, 7)));
    }

    #[test]
    fn quoted_boolean_and_bad_type() {
        let diags = lint("config {\n  hasOutput: \"true\",\n  type: \"tabel\"\n}");

        assert_eq!(
            messages(&diags),
            vec![
                "Invalid hasOutput value: \"true\". Must be a boolean (true or false) without quotes.",
                "Invalid type value: \"tabel\". Must be one of: table, view, incremental, inline, declaration, operations, assertion.",
            ]
        );
        assert_eq!(diags[1].location.as_ref().unwrap().column, Some(10));
    }

    #[test]
    fn tags_must_be_array() {
        let diags = lint("config {\n  tags: \"daily\"\n}");
        assert_eq!(messages(&diags), vec!["Invalid tags value. Must be an array, e.g. [\"example\"]."]);
    }

    #[test]
    fn bigquery_block_checks() {
        let text = "config {\n  bigquery: {\n    partitionExpirationDays: \"30\",\n    clusterBy: user_id,\n    partitionKey: x\n  }\n}";
        let diags = lint(text);

        assert_eq!(
            messages(&diags),
            vec![
                "Invalid partitionExpirationDays value: \"30\". Must be a number without quotes.",
                "Invalid clusterBy value. Must be an array, e.g. [\"example\"].",
                "Invalid property \"partitionKey\" for bigquery block. Allowed properties: partitionBy, clusterBy, requirePartitionFilter, partitionExpirationDays, labels, updatePartitionFilter, iceberg.",
            ]
        );
    }

    #[test]
    fn string_properties_reject_numbers_and_booleans() {
        let diags = lint("config {\n  schema: 42,\n  description: true,\n  database: constants.DB\n}");
        assert_eq!(
            messages(&diags),
            vec![
                "Invalid schema value: 42. Cannot be a number.",
                "Invalid description value: true. Cannot be a boolean.",
            ]
        );
    }

    #[test]
    fn columns_cannot_be_string_or_array() {
        let diags = lint("config {\n  columns: \"id\",\n  assertions: [\"x\"]\n}");
        assert_eq!(
            messages(&diags),
            vec![
                "Invalid columns value. Cannot be a string.",
                "Invalid assertions value. Cannot be an array.",
            ]
        );
    }

    #[test]
    fn table_name_characters() {
        let diags = lint("config {\n  name: \"users.v2\"\n}");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("BigQuery table names can only contain"));
    }

    #[test]
    fn nothing_after_config_block_is_checked() {
        let text = "config {\n  type: \"view\"\n}\nselect 'type: \"bogus\"' as x";
        assert_eq!(lint(text), vec![]);
    }

    #[test]
    fn config_beyond_scan_window_is_ignored() {
        let mut text = "\n".repeat(60);
        text.push_str("config {\n  typo: 1\n}");
        assert_eq!(lint(&text), vec![]);
    }

    #[test]
    fn js_numbers() {
        assert!(is_js_number("30"));
        assert!(is_js_number("1.5e3"));
        assert!(is_js_number("0x1F"));
        assert!(!is_js_number("NaN"));
        assert!(!is_js_number("thirty"));
    }
}
