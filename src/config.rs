//! Configuration for walkspec.
//!
//! Settings are read from `.walkspec/walkspec.toml`, then overridden by
//! environment variables, then by CLI flags. Every field has a default, so
//! a missing or partial file is fine.
//!
//! # Configuration File Format
//!
//! ```toml
//! [artifacts]
//! dir = "artifacts"
//! layout = "split"          # or "unified"
//! backup_retention = 10
//!
//! [router]
//! max_input_chars = 1500
//! history_turns = 10
//!
//! [conversation]
//! history_capacity = 40
//! confirm_overwrite = true
//!
//! [llm]
//! provider = "claude-cli"   # or "chat-completions"
//! claude_cmd = "claude"
//! base_url = "https://api.groq.com/openai/v1"
//! api_key_env = "GROQ_API_KEY"
//! timeout_secs = 45
//!
//! [llm.retry]
//! max_attempts = 3
//! initial_backoff_ms = 500
//! max_backoff_ms = 8000
//!
//! [clipboard]
//! command = "pbcopy"
//! ```
//!
//! # Environment Overrides
//!
//! - `WALKSPEC_CLAUDE_CMD` → `llm.claude_cmd`
//! - `WALKSPEC_LLM_PROVIDER` → `llm.provider`
//! - `WALKSPEC_BASE_URL` → `llm.base_url`
//! - `WALKSPEC_ARTIFACTS_DIR` → `artifacts.dir`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::artifact::Layout;
use crate::artifact::store::DEFAULT_BACKUP_RETENTION;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::init::WALKSPEC_DIR;
use crate::router::{DEFAULT_HISTORY_TURNS, DEFAULT_MAX_INPUT_CHARS};

pub const CONFIG_FILE: &str = "walkspec.toml";

const DEFAULT_GROQ_MODEL: &str = "moonshotai/kimi-k2-instruct-0905";
const DEFAULT_GROQ_SEARCH_MODEL: &str = "groq/compound-mini";
const DEFAULT_GROQ_DEEP_SEARCH_MODEL: &str = "groq/compound";

/// Which completion service backs the collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// The `claude` CLI in `--print` mode
    #[default]
    ClaudeCli,
    /// Any OpenAI-compatible `/chat/completions` endpoint
    ChatCompletions,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::ClaudeCli => write!(f, "claude-cli"),
            Provider::ChatCompletions => write!(f, "chat-completions"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude-cli" | "claude" => Ok(Provider::ClaudeCli),
            "chat-completions" | "openai" | "groq" => Ok(Provider::ChatCompletions),
            _ => anyhow::bail!(
                "Invalid provider '{}'. Valid values: claude-cli, chat-completions",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding the documents, relative to the project root
    #[serde(default = "default_artifacts_dir")]
    pub dir: String,
    #[serde(default)]
    pub layout: Layout,
    /// Backups kept per document
    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

fn default_backup_retention() -> usize {
    DEFAULT_BACKUP_RETENTION
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            layout: Layout::default(),
            backup_retention: default_backup_retention(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// History messages shown to the classifier
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_history_turns() -> usize {
    DEFAULT_HISTORY_TURNS
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            history_turns: default_history_turns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Ask before a write replaces an existing document
    #[serde(default = "default_confirm_overwrite")]
    pub confirm_overwrite: bool,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_confirm_overwrite() -> bool {
    true
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            confirm_overwrite: default_confirm_overwrite(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_claude_cmd")]
    pub claude_cmd: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key for `chat-completions`
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_search_model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_claude_cmd() -> String {
    "claude".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    45
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            claude_cmd: default_claude_cmd(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            router_model: None,
            content_model: None,
            search_model: None,
            deep_search_model: None,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Configured model, or the provider's default. The Claude CLI picks
    /// its own model when none is configured.
    fn model_or_default(&self, configured: &Option<String>, groq_default: &str) -> Option<String> {
        configured.clone().or_else(|| match self.provider {
            Provider::ClaudeCli => None,
            Provider::ChatCompletions => Some(groq_default.to_string()),
        })
    }

    pub fn router_model(&self) -> Option<String> {
        self.model_or_default(&self.router_model, DEFAULT_GROQ_MODEL)
    }

    pub fn content_model(&self) -> Option<String> {
        self.model_or_default(&self.content_model, DEFAULT_GROQ_MODEL)
    }

    pub fn search_model(&self) -> Option<String> {
        self.model_or_default(&self.search_model, DEFAULT_GROQ_SEARCH_MODEL)
    }

    pub fn deep_search_model(&self) -> Option<String> {
        self.model_or_default(&self.deep_search_model, DEFAULT_GROQ_DEEP_SEARCH_MODEL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardConfig {
    /// Command that reads text on stdin, e.g. `pbcopy` or `wl-copy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Contents of `walkspec.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkspecToml {
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub clipboard: ClipboardConfig,
}

impl WalkspecToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse walkspec.toml")
    }

    /// Load `<walkspec_dir>/walkspec.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(walkspec_dir: &Path) -> Result<Self> {
        let config_path = walkspec_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize walkspec.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cmd) = lookup("WALKSPEC_CLAUDE_CMD") {
            self.llm.claude_cmd = cmd;
        }
        if let Some(provider) = lookup("WALKSPEC_LLM_PROVIDER") {
            self.llm.provider = provider
                .parse()
                .context("Invalid WALKSPEC_LLM_PROVIDER")?;
        }
        if let Some(url) = lookup("WALKSPEC_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(dir) = lookup("WALKSPEC_ARTIFACTS_DIR") {
            self.artifacts.dir = dir;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.artifacts.dir.trim().is_empty() {
            warnings.push("artifacts.dir is empty; documents would land in the project root".into());
        }
        if self.artifacts.backup_retention == 0 {
            warnings.push("artifacts.backup_retention is 0; at least one backup is always kept".into());
        }
        if self.router.max_input_chars < 20 {
            warnings.push(format!(
                "router.max_input_chars = {} will truncate almost every utterance",
                self.router.max_input_chars
            ));
        }
        if self.conversation.history_capacity < self.router.history_turns {
            warnings.push(format!(
                "conversation.history_capacity ({}) is smaller than router.history_turns ({})",
                self.conversation.history_capacity, self.router.history_turns
            ));
        }
        if self.llm.timeout_secs == 0 {
            warnings.push("llm.timeout_secs is 0; every collaborator call will time out".into());
        }
        if self.llm.retry.max_attempts == 0 {
            warnings.push("llm.retry.max_attempts is 0; treated as 1".into());
        }
        if self.llm.retry.initial_backoff_ms > self.llm.retry.max_backoff_ms {
            warnings.push(format!(
                "llm.retry.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.llm.retry.initial_backoff_ms, self.llm.retry.max_backoff_ms
            ));
        }
        if self.llm.provider == Provider::ChatCompletions
            && !self.llm.base_url.starts_with("http://")
            && !self.llm.base_url.starts_with("https://")
        {
            warnings.push(format!(
                "llm.base_url '{}' is not an http(s) URL",
                self.llm.base_url
            ));
        }
        if let Some(command) = &self.clipboard.command
            && command.trim().is_empty()
        {
            warnings.push("clipboard.command is empty; copy actions will be unavailable".into());
        }

        warnings
    }
}

/// Resolved configuration: file, environment and CLI layered together.
#[derive(Debug, Clone)]
pub struct WalkspecConfig {
    pub project_dir: PathBuf,
    pub walkspec_dir: PathBuf,
    pub toml: WalkspecToml,
    pub verbose: bool,
}

impl WalkspecConfig {
    /// Load configuration for a project directory, applying environment overrides.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let walkspec_dir = project_dir.join(WALKSPEC_DIR);
        let mut toml = WalkspecToml::load_or_default(&walkspec_dir)?;
        toml.apply_env(|key| std::env::var(key).ok())?;

        Ok(Self {
            project_dir,
            walkspec_dir,
            toml,
            verbose: false,
        })
    }

    /// Create WalkspecConfig with CLI overrides.
    pub fn with_cli_args(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        Ok(config)
    }

    /// Directory holding the documents.
    pub fn artifacts_dir(&self) -> PathBuf {
        let dir = Path::new(&self.toml.artifacts.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.project_dir.join(dir)
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.walkspec_dir.join(CONFIG_FILE)
    }

    pub fn journal_file(&self) -> PathBuf {
        self.walkspec_dir.join("journal")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.walkspec_dir.join("logs")
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = WalkspecToml::default();
        assert_eq!(config.artifacts.dir, "artifacts");
        assert_eq!(config.artifacts.layout, Layout::Split);
        assert_eq!(config.artifacts.backup_retention, 10);
        assert_eq!(config.router.max_input_chars, 1500);
        assert_eq!(config.conversation.history_capacity, 40);
        assert!(config.conversation.confirm_overwrite);
        assert_eq!(config.llm.provider, Provider::ClaudeCli);
        assert_eq!(config.llm.timeout_secs, 45);
        assert_eq!(config.llm.retry.max_attempts, 3);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = WalkspecToml::parse(
            r#"
[artifacts]
layout = "unified"

[llm]
provider = "chat-completions"
content_model = "llama-3.3-70b-versatile"

[llm.retry]
max_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.artifacts.layout, Layout::Unified);
        assert_eq!(config.artifacts.dir, "artifacts");
        assert_eq!(config.llm.provider, Provider::ChatCompletions);
        assert_eq!(config.llm.retry.max_attempts, 5);
        assert_eq!(config.llm.retry.initial_backoff_ms, 500);
        assert_eq!(
            config.llm.content_model().as_deref(),
            Some("llama-3.3-70b-versatile")
        );
        assert_eq!(config.llm.router_model().as_deref(), Some(DEFAULT_GROQ_MODEL));
    }

    #[test]
    fn test_claude_cli_has_no_default_models() {
        let config = LlmConfig::default();
        assert_eq!(config.router_model(), None);
        assert_eq!(config.search_model(), None);
    }

    #[test]
    fn test_parse_rejects_unknown_layout() {
        assert!(WalkspecToml::parse("[artifacts]\nlayout = \"sideways\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WALKSPEC_CLAUDE_CMD", "/opt/claude"),
            ("WALKSPEC_LLM_PROVIDER", "chat-completions"),
            ("WALKSPEC_BASE_URL", "http://localhost:8080/v1"),
            ("WALKSPEC_ARTIFACTS_DIR", "docs"),
        ]
        .into_iter()
        .collect();

        let mut config = WalkspecToml::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.claude_cmd, "/opt/claude");
        assert_eq!(config.llm.provider, Provider::ChatCompletions);
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
        assert_eq!(config.artifacts.dir, "docs");
    }

    #[test]
    fn test_env_override_rejects_bad_provider() {
        let mut config = WalkspecToml::default();
        assert!(config
            .apply_env(|key| (key == "WALKSPEC_LLM_PROVIDER").then(|| "carrier-pigeon".to_string()))
            .is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = WalkspecToml::default();
        config.artifacts.backup_retention = 0;
        config.conversation.history_capacity = 4;
        config.llm.retry.initial_backoff_ms = 10_000;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("backup_retention")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = WalkspecToml::default();
        config.clipboard.command = Some("wl-copy".to_string());
        config.save(&path).unwrap();

        let loaded = WalkspecToml::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            WalkspecToml::load_or_default(dir.path()).unwrap(),
            WalkspecToml::default()
        );
    }

    #[test]
    fn test_artifacts_dir_resolution() {
        let dir = tempdir().unwrap();
        let mut config = WalkspecConfig {
            project_dir: dir.path().to_path_buf(),
            walkspec_dir: dir.path().join(WALKSPEC_DIR),
            toml: WalkspecToml::default(),
            verbose: false,
        };
        assert_eq!(config.artifacts_dir(), dir.path().join("artifacts"));

        config.toml.artifacts.dir = "/tmp/elsewhere".to_string();
        assert_eq!(config.artifacts_dir(), PathBuf::from("/tmp/elsewhere"));
    }
}
