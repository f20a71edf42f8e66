//! Configuration file management for Sable.
//!
//! Supports reading settings from `~/.config/sable/config.toml`. Every
//! field has a default, so a missing file or a partial file both work.

use crate::error::{Result, SableError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// History sizing knobs for the conversation store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryLimits {
    /// Hard ceiling on messages per session.
    #[serde(default = "default_max_history_length")]
    pub max_history_length: usize,
    /// Message count past which compression fires.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Number of most recent messages compression never touches.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
}

fn default_max_history_length() -> usize {
    50
}

fn default_compression_threshold() -> usize {
    20
}

fn default_keep_recent() -> usize {
    5
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_history_length: default_max_history_length(),
            compression_threshold: default_compression_threshold(),
            keep_recent: default_keep_recent(),
        }
    }
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Name or path of the external LLM executable.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Model identifier passed through to the tool, if any.
    #[serde(default)]
    pub model: Option<String>,
    /// Directory holding the tool's credential files. Defaults to
    /// `~/.claude` when unset; used by the direct-credential strategy.
    #[serde(default)]
    pub credential_dir: Option<PathBuf>,
}

fn default_binary() -> String {
    "claude".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            model: None,
            credential_dir: None,
        }
    }
}

/// Subprocess budget settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Per-attempt timeout for one-shot invocations, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Wall-clock timeout for an interactive session, in seconds.
    #[serde(default = "default_interactive_timeout_secs")]
    pub interactive_timeout_secs: u64,
    /// Ceiling on bytes read from a subprocess stdout.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

fn default_attempt_timeout_secs() -> u64 {
    300
}

fn default_interactive_timeout_secs() -> u64 {
    120
}

fn default_max_output_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
            interactive_timeout_secs: default_interactive_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// Root configuration for the Sable workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SableConfig {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub limits: HistoryLimits,
    #[serde(default)]
    pub budget: BudgetConfig,
    /// When true, permission questions from the tool are answered by the
    /// built-in heuristic instead of prompting a human.
    #[serde(default = "default_auto_answer")]
    pub auto_answer: bool,
}

fn default_auto_answer() -> bool {
    true
}

impl Default for SableConfig {
    fn default() -> Self {
        Self {
            tool: ToolConfig::default(),
            limits: HistoryLimits::default(),
            budget: BudgetConfig::default(),
            auto_answer: default_auto_answer(),
        }
    }
}

/// Loads the configuration from `~/.config/sable/config.toml`, falling
/// back to defaults if the file does not exist.
///
/// # Errors
///
/// Returns an error only if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<SableConfig> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(SableConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        SableError::config(format!(
            "Failed to read configuration file at {}: {}",
            config_path.display(),
            e
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        SableError::config(format!(
            "Failed to parse configuration file at {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Returns the path to the configuration file: ~/.config/sable/config.toml
fn get_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SableError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("sable").join("config.toml"))
}
