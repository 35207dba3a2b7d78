//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Config block lint (1xxx)
    /// Property is not allowed in the enclosing config block
    ConfigInvalidProperty,

    /// Property value has the wrong shape (string vs boolean, array, ...)
    ConfigInvalidValue,

    // References (2xxx)
    /// `${ref(...)}` names an action that is not in the compiled graph
    RefUnresolved,

    // Compilation (3xxx)
    /// `dataform compile` reported an error for this file
    CompilationError,

    /// `dataform compile` could not be run or its output could not be read
    CompilationFailed,

    // General warnings (9xxx)
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigInvalidProperty => "CONFIG_INVALID_PROPERTY",
            Self::ConfigInvalidValue => "CONFIG_INVALID_VALUE",
            Self::RefUnresolved => "REF_UNRESOLVED",
            Self::CompilationError => "COMPILATION_ERROR",
            Self::CompilationFailed => "COMPILATION_FAILED",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
///
/// Lines and columns are 1-indexed. Columns count UTF-16 code units so they
/// convert directly to editor positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to project root
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,

    /// Optional end line (for ranges)
    pub end_line: Option<usize>,

    /// Optional end column (for ranges, exclusive)
    pub end_column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            line: Some(line),
            ..Self::new(file)
        }
    }

    /// Create a location spanning `start_column..end_column` on one line
    pub fn with_span(file: impl Into<String>, line: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(start_column),
            end_line: Some(line),
            end_column: Some(end_column),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Replace the severity (used when applying config overrides)
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::ConfigInvalidProperty.as_str(), "CONFIG_INVALID_PROPERTY");
        assert_eq!(DiagnosticCode::RefUnresolved.as_str(), "REF_UNRESOLVED");
        assert_eq!(DiagnosticCode::CompilationError.to_string(), "COMPILATION_ERROR");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::ConfigInvalidValue,
            Severity::Warn,
            "Invalid hasOutput value: \"yes\"",
        )
        .with_location(Location::with_span("definitions/users.sqlx", 3, 16, 21));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("CONFIG_INVALID_VALUE"));
        assert!(json.contains("\"warn\""));
        assert!(json.contains("\"end_column\":21"));
    }
}
