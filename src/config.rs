//! Configuration for the clause auditor, read from `.clause-audit/audit.toml`.
//!
//! Settings are layered: file → environment → CLI flags. Every field has a
//! default, so a missing file or an empty section is valid.
//!
//! # Configuration File Format
//!
//! ```toml
//! [audit]
//! max_attempts = 3
//! default_context = "Standard UAE Contract Law principles apply."
//! concurrency = 1
//! clause_timeout_secs = 600
//!
//! [reasoning]
//! backend = "claude-cli"      # or "chat-api"
//! command = "claude"
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//! temperature = 0.0
//! timeout_secs = 120
//! skip_permissions = false    # claude-cli only
//!
//! [index]
//! enabled = true
//! similarity_threshold = 0.85
//! top_k = 1
//! query_timeout_secs = 30
//! query_retries = 2
//!
//! [report]
//! redline = false
//! summary = true
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the config file and run logs, relative to the project.
pub const CONFIG_DIR: &str = ".clause-audit";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "audit.toml";

/// Default retry budget per clause.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default minimum similarity for a quote to count as present in the document.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Legal context handed to the critic when no retrieval step supplies one.
pub const DEFAULT_CONTEXT: &str = "Standard UAE Contract Law principles apply.";

/// Loop and batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Maximum critic evaluations per clause (>= 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Background legal context passed to every critic call.
    #[serde(default = "default_context")]
    pub default_context: String,
    /// Clauses audited concurrently (1 = strictly sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock budget for one clause; exceeded runs end as CANCELLED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause_timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

fn default_concurrency() -> usize {
    1
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_context: default_context(),
            concurrency: default_concurrency(),
            clause_timeout_secs: None,
        }
    }
}

impl AuditSettings {
    pub fn clause_timeout(&self) -> Option<Duration> {
        self.clause_timeout_secs.map(Duration::from_secs)
    }
}

/// Which reasoning service implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Spawn the Claude CLI in print mode.
    #[default]
    ClaudeCli,
    /// OpenAI-compatible chat completions endpoint.
    ChatApi,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ClaudeCli => write!(f, "claude-cli"),
            BackendKind::ChatApi => write!(f, "chat-api"),
        }
    }
}

/// Reasoning service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// CLI command for the `claude-cli` backend.
    #[serde(default = "default_command")]
    pub command: String,
    /// Chat completions URL for the `chat-api` backend.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Decoding temperature for critic calls; keep at or near zero.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_reasoning_timeout_secs")]
    pub timeout_secs: u64,
    /// Pass `--dangerously-skip-permissions` to the CLI. Prompts carry
    /// untrusted contract text, so leave this off unless the CLI is sandboxed.
    #[serde(default)]
    pub skip_permissions: bool,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_reasoning_timeout_secs() -> u64 {
    120
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            command: default_command(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_reasoning_timeout_secs(),
            skip_permissions: false,
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Semantic index and verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// When false the reflector runs in disabled mode for the whole run.
    #[serde(default = "default_index_enabled")]
    pub enabled: bool,
    /// Inclusive lower bound on the best match score.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Extra attempts for a query that fails transiently.
    #[serde(default = "default_query_retries")]
    pub query_retries: u32,
}

fn default_index_enabled() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_top_k() -> usize {
    1
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_query_retries() -> u32 {
    2
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: default_index_enabled(),
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            query_timeout_secs: default_query_timeout_secs(),
            query_retries: default_query_retries(),
        }
    }
}

impl IndexConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Report stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Request a compliant rewrite for every violation.
    #[serde(default)]
    pub redline: bool,
    /// Add English and Arabic narrative summaries.
    #[serde(default = "default_summary")]
    pub summary: bool,
}

fn default_summary() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            redline: false,
            summary: default_summary(),
        }
    }
}

/// The complete audit.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditToml {
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl AuditToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Load `<project_dir>/.clause-audit/audit.toml`, or defaults if absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = default_config_path(project_dir);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `CLAUSE_AUDIT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using a custom lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CLAUSE_AUDIT_MAX_ATTEMPTS") {
            self.audit.max_attempts = value.trim().parse().map_err(|_| {
                ConfigError::invalid("CLAUSE_AUDIT_MAX_ATTEMPTS", format!("'{}' is not an integer", value))
            })?;
        }
        if let Some(value) = lookup("CLAUSE_AUDIT_THRESHOLD") {
            self.index.similarity_threshold = value.trim().parse().map_err(|_| {
                ConfigError::invalid("CLAUSE_AUDIT_THRESHOLD", format!("'{}' is not a number", value))
            })?;
        }
        if let Some(value) = lookup("CLAUSE_AUDIT_CMD") {
            self.reasoning.command = value;
        }
        Ok(())
    }

    /// Reject settings the audit loop cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.max_attempts == 0 {
            return Err(ConfigError::invalid("audit.max_attempts", "must be at least 1"));
        }
        if self.audit.concurrency == 0 {
            return Err(ConfigError::invalid("audit.concurrency", "must be at least 1"));
        }
        if self.audit.clause_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("audit.clause_timeout_secs", "must be positive"));
        }
        let threshold = self.index.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "index.similarity_threshold",
                format!("{} is outside 0.0..=1.0", threshold),
            ));
        }
        if self.index.top_k == 0 {
            return Err(ConfigError::invalid("index.top_k", "must be at least 1"));
        }
        if self.reasoning.timeout_secs == 0 {
            return Err(ConfigError::invalid("reasoning.timeout_secs", "must be positive"));
        }
        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            return Err(ConfigError::invalid(
                "reasoning.temperature",
                format!("{} is outside 0.0..=2.0", self.reasoning.temperature),
            ));
        }
        Ok(())
    }

    /// Serialize back to TOML, as shown by `clause-audit config show`.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Path of the config file for a project directory.
pub fn default_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Directory that receives per-run audit logs.
pub fn runs_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join("runs")
}
