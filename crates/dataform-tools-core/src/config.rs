//! Configuration schema (dataform-tools.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::diagnostic::{DiagnosticCode, Severity};

/// Default config file name, looked up at the project root
pub const CONFIG_FILE_NAME: &str = "dataform-tools.toml";

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Google Cloud settings used by the Dataform API client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcpConfig {
    /// GCP project hosting the Dataform repository
    #[serde(default)]
    pub project_id: Option<String>,

    /// Dataform location, e.g. "europe-west2"
    #[serde(default)]
    pub location: Option<String>,

    /// Default Dataform repository name
    #[serde(default)]
    pub repository: Option<String>,

    /// Override for the API root (defaults to https://dataform.googleapis.com)
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Service account used for workflow invocations
    #[serde(default)]
    pub service_account: Option<String>,
}

/// Rename behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameConfig {
    /// Only replace occurrences delimited by non-word characters.
    /// Off by default: every literal substring match is replaced.
    #[serde(default)]
    pub whole_word: bool,
}

/// How `$` completion writes a reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefStyle {
    /// `${ref("name")}`
    #[default]
    Name,
    /// `${ref("schema", "name")}`
    SchemaAndName,
    /// `${ref({schema: "schema", name: "name"})}`
    Object,
}

/// Completion behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub ref_style: RefStyle,
}

/// Config-block lint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintConfig {
    /// Skip lint for files matching these patterns (simple `*` globs)
    #[serde(default)]
    pub skip_files: Vec<String>,

    /// How many lines from the top of a file are scanned for the config block
    #[serde(default = "default_max_config_scan_lines")]
    pub max_config_scan_lines: usize,
}

fn default_max_config_scan_lines() -> usize {
    50
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            skip_files: Vec::new(),
            max_config_scan_lines: default_max_config_scan_lines(),
        }
    }
}

impl LintConfig {
    /// Check if a file should be skipped
    pub fn is_file_skipped(&self, file: &str) -> bool {
        self.skip_files.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, file)
            } else {
                pattern == file
            }
        })
    }
}

/// `dataform compile` settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Dataform CLI executable
    #[serde(default = "default_dataform_cli")]
    pub dataform_cli: String,

    /// Precomputed `dataform compile --json` output, relative to the project root.
    /// When set, the CLI is not invoked.
    #[serde(default)]
    pub compiled_json: Option<PathBuf>,
}

fn default_dataform_cli() -> String {
    "dataform".to_string()
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            dataform_cli: default_dataform_cli(),
            compiled_json: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gcp: GcpConfig,

    #[serde(default)]
    pub rename: RenameConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub lint: LintConfig,

    #[serde(default)]
    pub compile: CompileConfig,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gcp: GcpConfig::default(),
            rename: RenameConfig::default(),
            completion: CompletionConfig::default(),
            lint: LintConfig::default(),
            compile: CompileConfig::default(),
            severity: SeverityThreshold::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load `dataform-tools.toml` from a project root, falling back to defaults
    /// when the file does not exist.
    pub fn discover(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self {
                project_root: project_root.to_path_buf(),
                ..Self::default()
            })
        }
    }

    /// Absolute path of the precomputed compiled graph, if configured
    pub fn compiled_json_path(&self) -> Option<PathBuf> {
        self.compile
            .compiled_json
            .as_ref()
            .map(|p| if p.is_absolute() { p.clone() } else { self.project_root.join(p) })
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Simple glob matching (supports a single `*` wildcard)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = pattern[star_pos + 1..].trim_start_matches('*');

        text.starts_with(prefix) && text.ends_with(suffix) && text.len() >= prefix.len() + suffix.len()
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
