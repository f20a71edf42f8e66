//! Invocation strategies.
//!
//! Each strategy is one fixed environment/authentication configuration
//! for running the external tool. The chain tries them in declaration
//! order and short-circuits on the first success.

use sable_core::config::ToolConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// Tool-specific variables that must never leak into a child invocation.
/// A present recursion flag makes the tool refuse real work, and a stale
/// session/credential variable shadows the auth path a strategy selects.
pub const STRIPPED_ENV_VARS: &[&str] = &[
    "CLAUDECODE",
    "CLAUDE_CODE_SSE_PORT",
    "CLAUDE_CODE_ENTRYPOINT",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_AUTH_TOKEN",
];

/// One environment/authentication configuration for invoking the tool.
///
/// Strategies only differ in the environment they construct; command
/// construction is shared by the chain.
pub trait InvocationStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The complete child environment for this attempt. The child runs
    /// with exactly these variables and nothing else from the host.
    fn environment(&self, tool: &ToolConfig) -> HashMap<String, String>;
}

/// Minimal environment shared by all strategies: host PATH/HOME/USER,
/// color output disabled, and every known tool session/credential
/// variable stripped.
fn minimal_environment() -> HashMap<String, String> {
    let mut env = HashMap::new();
    for key in ["PATH", "HOME", "USERPROFILE", "USER", "USERNAME"] {
        if let Ok(value) = std::env::var(key) {
            env.insert(key.to_string(), value);
        }
    }
    env.insert("NO_COLOR".to_string(), "1".to_string());
    for key in STRIPPED_ENV_VARS {
        env.remove(*key);
    }
    env
}

/// Strategy 1: clean environment.
///
/// Breaks out of a potentially recursive invocation: with the session
/// variables gone, the tool cannot tell it is being orchestrated by
/// another instance of itself.
pub struct CleanEnvStrategy;

impl InvocationStrategy for CleanEnvStrategy {
    fn name(&self) -> &'static str {
        "clean-env"
    }

    fn environment(&self, _tool: &ToolConfig) -> HashMap<String, String> {
        minimal_environment()
    }
}

/// Strategy 2: long-lived token.
///
/// Relies on whatever persistent token configuration exists on the host.
/// Environment-wise identical to [`CleanEnvStrategy`]; it exists as a
/// separate attempt so a transient failure of the first run gets a
/// second chance before credentials are pointed at explicitly.
pub struct StoredTokenStrategy;

impl InvocationStrategy for StoredTokenStrategy {
    fn name(&self) -> &'static str {
        "stored-token"
    }

    fn environment(&self, _tool: &ToolConfig) -> HashMap<String, String> {
        minimal_environment()
    }
}

/// Strategy 3: direct credential.
///
/// Adds an explicit pointer to the tool's credential-file directory,
/// for hosts where the default lookup path is wrong (sandboxes, altered
/// HOME, system services).
pub struct DirectCredentialStrategy;

impl DirectCredentialStrategy {
    fn credential_dir(tool: &ToolConfig) -> Option<PathBuf> {
        if let Some(dir) = &tool.credential_dir {
            return Some(dir.clone());
        }
        dirs::home_dir().map(|home| home.join(".claude"))
    }
}

impl InvocationStrategy for DirectCredentialStrategy {
    fn name(&self) -> &'static str {
        "direct-credential"
    }

    fn environment(&self, tool: &ToolConfig) -> HashMap<String, String> {
        let mut env = minimal_environment();
        if let Some(dir) = Self::credential_dir(tool) {
            env.insert(
                "CLAUDE_CONFIG_DIR".to_string(),
                dir.to_string_lossy().to_string(),
            );
        }
        env
    }
}

/// The default strategy order: clean environment, then stored token,
/// then direct credential.
pub fn default_strategies() -> Vec<Box<dyn InvocationStrategy>> {
    vec![
        Box::new(CleanEnvStrategy),
        Box::new(StoredTokenStrategy),
        Box::new(DirectCredentialStrategy),
    ]
}
