//! One-shot invocation of the external tool through a chain of fallback
//! strategies.
//!
//! `InvocationChain::invoke` never fails: every environmental problem is
//! absorbed and converted into a usable (if degraded) reply, so callers
//! are never blocked on the tool being unreachable.

pub mod prompt_file;
pub mod strategy;

pub use prompt_file::PromptFile;
pub use strategy::{
    CleanEnvStrategy, DirectCredentialStrategy, InvocationStrategy, STRIPPED_ENV_VARS,
    StoredTokenStrategy, default_strategies,
};

use sable_core::config::{BudgetConfig, ToolConfig};
use sable_core::error::{Result, SableError};
use sable_core::session::estimate_tokens;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Marker the tool prints when it detects it is running inside another
/// orchestrated session and refuses to do real work.
pub const FALLBACK_MODE_MARKER: &str = "FALLBACK MODE";

/// Substrings in stdout that mean the attempt authenticated with a bad
/// credential, regardless of exit status.
pub const INVALID_CREDENTIAL_MARKERS: &[&str] =
    &["invalid api key", "invalid x-api-key", "oauth token has expired"];

/// Canned assistive reply substituted when the tool reports fallback
/// mode. Success from the caller's point of view.
pub const NESTED_SESSION_REPLY: &str = "The assistant is already running inside an \
orchestrated tool session, so a nested model call was skipped. Proceeding with the \
available project context; re-run from a regular shell for a full model response.";

/// Synthesized reply returned when every strategy has been exhausted.
pub const AUTH_FAILURE_APOLOGY: &str = "I could not reach the language model: every \
authentication strategy failed (clean environment, stored token, direct credentials). \
Please verify the external tool is installed, on PATH, and signed in, then try again.";

/// Cap on captured stderr; past this it is discarded.
const STDERR_CAP: usize = 64 * 1024;

/// Uniform result of a one-shot invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// The tool's reply, or a synthesized fallback text.
    pub text: String,
    /// Token estimate of the reply; zero for synthesized fallbacks.
    pub token_estimate: usize,
}

impl InvocationOutcome {
    fn from_text(text: String) -> Self {
        let token_estimate = estimate_tokens(&text);
        Self {
            text,
            token_estimate,
        }
    }

    fn apology() -> Self {
        Self {
            text: AUTH_FAILURE_APOLOGY.to_string(),
            token_estimate: 0,
        }
    }

    /// True if this outcome was synthesized rather than produced by the
    /// tool.
    pub fn is_synthesized(&self) -> bool {
        self.token_estimate == 0
    }
}

/// What a single strategy attempt produced.
enum AttemptResult {
    /// Clean completion with the captured stdout.
    Completed(String),
    /// The tool announced fallback mode; substitute the canned reply.
    FallbackMode,
}

/// Executes the external tool as a one-shot subprocess under a sequence
/// of environment/authentication configurations until one succeeds.
pub struct InvocationChain {
    tool: ToolConfig,
    budget: BudgetConfig,
    strategies: Vec<Box<dyn InvocationStrategy>>,
}

impl InvocationChain {
    /// Creates a chain with the default strategy order.
    pub fn new(tool: ToolConfig, budget: BudgetConfig) -> Self {
        Self {
            tool,
            budget,
            strategies: default_strategies(),
        }
    }

    /// Creates a chain with a custom strategy list (mainly for tests).
    pub fn with_strategies(
        tool: ToolConfig,
        budget: BudgetConfig,
        strategies: Vec<Box<dyn InvocationStrategy>>,
    ) -> Self {
        Self {
            tool,
            budget,
            strategies,
        }
    }

    /// Runs the prompt through the strategy chain.
    ///
    /// Never fails: if every strategy raises, the result is a synthesized
    /// apology with a zero token estimate. The prompt travels through a
    /// uniquely named temp file that is deleted on every exit path.
    pub async fn invoke(&self, prompt: &str, working_dir: &Path) -> InvocationOutcome {
        let invocation_id = uuid::Uuid::new_v4();
        log::info!(
            "Invocation {}: {} chars, cwd {:?}",
            invocation_id,
            prompt.len(),
            working_dir
        );

        let prompt_file = match PromptFile::create(prompt) {
            Ok(file) => file,
            Err(e) => {
                log::error!("Invocation {}: failed to write prompt file: {}", invocation_id, e);
                return InvocationOutcome::apology();
            }
        };

        for strategy in &self.strategies {
            match self
                .attempt(strategy.as_ref(), &prompt_file, working_dir)
                .await
            {
                Ok(AttemptResult::Completed(text)) => {
                    log::info!(
                        "Invocation {}: strategy '{}' succeeded ({} chars)",
                        invocation_id,
                        strategy.name(),
                        text.len()
                    );
                    return InvocationOutcome::from_text(text);
                }
                Ok(AttemptResult::FallbackMode) => {
                    log::warn!(
                        "Invocation {}: tool reported fallback mode under '{}'",
                        invocation_id,
                        strategy.name()
                    );
                    return InvocationOutcome::from_text(NESTED_SESSION_REPLY.to_string());
                }
                Err(e) => {
                    log::warn!(
                        "Invocation {}: strategy '{}' failed: {}",
                        invocation_id,
                        strategy.name(),
                        e
                    );
                }
            }
        }

        log::error!("Invocation {}: all strategies exhausted", invocation_id);
        InvocationOutcome::apology()
    }

    /// Runs one subprocess attempt under a strategy's environment.
    async fn attempt(
        &self,
        strategy: &dyn InvocationStrategy,
        prompt_file: &PromptFile,
        working_dir: &Path,
    ) -> Result<AttemptResult> {
        let stdin = prompt_file.open()?;

        let mut cmd = Command::new(&self.tool.binary);
        if let Some(model) = &self.tool.model {
            cmd.arg("--model").arg(model);
        }
        cmd.current_dir(working_dir)
            .env_clear()
            .envs(strategy.environment(&self.tool))
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SableError::subprocess(format!("failed to spawn '{}': {}", self.tool.binary, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SableError::internal("child stdout not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SableError::internal("child stderr not piped"))?;

        let stdout_cap = self.budget.max_output_bytes as usize;
        let work = async move {
            let (out, err, status) = tokio::join!(
                read_capped(stdout, stdout_cap),
                read_capped(stderr, STDERR_CAP),
                child.wait(),
            );
            (out, err, status)
        };

        let timeout = Duration::from_secs(self.budget.attempt_timeout_secs);
        // On timeout the dropped future takes the child with it and
        // kill_on_drop reaps it.
        let (out, err, status) = tokio::time::timeout(timeout, work).await.map_err(|_| {
            SableError::subprocess(format!("attempt timed out after {}s", timeout.as_secs()))
        })?;

        let (stdout_buf, overflowed) = out?;
        let (stderr_buf, _) = err.unwrap_or_default();
        let status = status?;

        if overflowed {
            return Err(SableError::subprocess(format!(
                "stdout exceeded the {} byte ceiling",
                self.budget.max_output_bytes
            )));
        }

        let text = String::from_utf8_lossy(&stdout_buf).trim().to_string();

        if text.contains(FALLBACK_MODE_MARKER) {
            return Ok(AttemptResult::FallbackMode);
        }
        if !status.success() {
            let stderr_text = String::from_utf8_lossy(&stderr_buf);
            return Err(SableError::subprocess(format!(
                "tool exited with {}: {}",
                status,
                stderr_text.trim()
            )));
        }
        if text.is_empty() {
            return Err(SableError::subprocess("tool produced no output"));
        }
        if is_invalid_credential(&text) {
            return Err(SableError::subprocess(
                "tool reported an invalid credential",
            ));
        }

        Ok(AttemptResult::Completed(text))
    }

    /// Checks whether the configured tool binary resolves on this host.
    ///
    /// Uses `which` on Unix/macOS or `where` on Windows, the same quick
    /// probe the tool wrappers use elsewhere.
    pub async fn is_available(&self) -> bool {
        #[cfg(unix)]
        let check_cmd = "which";
        #[cfg(windows)]
        let check_cmd = "where";

        Command::new(check_cmd)
            .arg(&self.tool.binary)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

/// Checks stdout for the known invalid-credential markers.
fn is_invalid_credential(text: &str) -> bool {
    let lowered = text.to_lowercase();
    INVALID_CREDENTIAL_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Reads a stream to the end, keeping at most `cap` bytes. The remainder
/// is drained and discarded so the child never blocks on a full pipe.
/// Returns the captured bytes and whether the cap was exceeded.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut overflowed = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if overflowed {
            continue;
        }
        if buf.len() + n > cap {
            buf.extend_from_slice(&chunk[..cap - buf.len()]);
            overflowed = true;
        } else {
            buf.extend_from_slice(&chunk[..n]);
        }
    }
    Ok((buf, overflowed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_markers_are_case_insensitive() {
        assert!(is_invalid_credential("Error: Invalid API key provided"));
        assert!(is_invalid_credential("OAuth token has expired, re-login"));
        assert!(!is_invalid_credential("All good"));
    }

    #[test]
    fn test_apology_outcome_is_synthesized() {
        let outcome = InvocationOutcome::apology();
        assert_eq!(outcome.token_estimate, 0);
        assert!(outcome.is_synthesized());
        assert!(!outcome.text.is_empty());
    }

    #[test]
    fn test_outcome_token_estimate() {
        let outcome = InvocationOutcome::from_text("12345678".to_string());
        assert_eq!(outcome.token_estimate, 2);
        assert!(!outcome.is_synthesized());
    }

    #[tokio::test]
    async fn test_read_capped_under_cap() {
        let data: &[u8] = b"hello";
        let (buf, overflowed) = read_capped(data, 100).await.unwrap();
        assert_eq!(buf, b"hello");
        assert!(!overflowed);
    }

    #[tokio::test]
    async fn test_read_capped_over_cap_drains() {
        let data = vec![b'x'; 100];
        let (buf, overflowed) = read_capped(data.as_slice(), 10).await.unwrap();
        assert_eq!(buf.len(), 10);
        assert!(overflowed);
    }
}
