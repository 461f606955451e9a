//! Job configuration
//!
//! [`JobConfig`] carries every knob of a code-agent run. Defaults match the
//! hosted setup; `CODEAGENT_*` environment variables override them.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a code-agent job
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Base URL of the model server (Ollama-compatible `/api/chat`)
    pub model_base_url: String,
    /// Model driving the coding agent
    pub coding_model: String,
    /// Model used by the title and response generators
    pub generator_model: String,
    /// Maximum router iterations before the network gives up
    pub max_iterations: usize,
    /// Maximum model calls within a single agent turn
    pub max_tool_rounds: usize,
    /// Number of prior messages replayed into the conversation
    pub history_limit: usize,
    /// Sandbox template to provision
    pub sandbox_template: String,
    /// Lifetime of a sandbox from acquisition
    pub sandbox_timeout: Duration,
    /// Timeout for a single terminal command
    pub command_timeout: Duration,
    /// Port the preview server listens on inside the sandbox
    pub preview_port: u16,
    /// Directory holding sandbox roots and templates
    pub sandbox_dir: PathBuf,
    /// Directory holding step journals, one file per run
    pub journal_dir: PathBuf,
    /// Directory holding project message files
    pub store_dir: PathBuf,
    /// Custom system prompt for the coding agent (uses default if None)
    pub system_prompt: Option<String>,
    /// OTLP collector endpoint; tracing export is disabled when None
    pub otlp_endpoint: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        let base = data_dir();
        Self {
            model_base_url: "http://localhost:11434".to_string(),
            coding_model: "qwen3".to_string(),
            generator_model: "qwen3".to_string(),
            max_iterations: 5,
            max_tool_rounds: 20,
            history_limit: 5,
            sandbox_template: "nextjs".to_string(),
            sandbox_timeout: Duration::from_secs(30 * 60),
            command_timeout: Duration::from_secs(120),
            preview_port: 3000,
            sandbox_dir: base.join("sandboxes"),
            journal_dir: base.join("journal"),
            store_dir: base.join("store"),
            system_prompt: None,
            otlp_endpoint: None,
        }
    }
}

impl JobConfig {
    /// Defaults with `CODEAGENT_*` environment overrides applied
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CODEAGENT_MODEL_BASE_URL") {
            self.model_base_url = v;
        }
        if let Some(v) = lookup("CODEAGENT_CODING_MODEL") {
            self.coding_model = v;
        }
        if let Some(v) = lookup("CODEAGENT_GENERATOR_MODEL") {
            self.generator_model = v;
        }
        if let Some(v) = parsed(&lookup, "CODEAGENT_MAX_ITERATIONS") {
            self.max_iterations = v;
        }
        if let Some(v) = parsed(&lookup, "CODEAGENT_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = v;
        }
        if let Some(v) = parsed(&lookup, "CODEAGENT_HISTORY_LIMIT") {
            self.history_limit = v;
        }
        if let Some(v) = lookup("CODEAGENT_SANDBOX_TEMPLATE") {
            self.sandbox_template = v;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "CODEAGENT_SANDBOX_TIMEOUT_SECS") {
            self.sandbox_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "CODEAGENT_COMMAND_TIMEOUT_SECS") {
            self.command_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = parsed(&lookup, "CODEAGENT_PREVIEW_PORT") {
            self.preview_port = v;
        }
        if let Some(v) = lookup("CODEAGENT_SANDBOX_DIR") {
            self.sandbox_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CODEAGENT_JOURNAL_DIR") {
            self.journal_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CODEAGENT_STORE_DIR") {
            self.store_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CODEAGENT_SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        if let Some(v) = lookup("CODEAGENT_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(v);
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config override");
            None
        }
    }
}

/// Default data directory (~/.codeagent)
fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".codeagent")
}
