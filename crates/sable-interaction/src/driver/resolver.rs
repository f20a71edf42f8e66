//! Answer resolution for detected permission requests.
//!
//! A detected question is answered either by a deterministic heuristic
//! (command mode, no human in the loop) or by presenting the question to
//! a human and reading one line.

use async_trait::async_trait;
use sable_core::error::{Result, SableError};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Produced by the deterministic heuristic.
    Auto,
    /// Entered by a human.
    Human,
}

/// A resolved permission request, kept for audit logging.
#[derive(Debug, Clone)]
pub struct InteractiveExchange {
    /// The question line detected in the subprocess output.
    pub question: String,
    /// How the answer was produced.
    pub source: ResolutionSource,
    /// The answer written to the subprocess stdin.
    pub answer: String,
    /// When the answer was resolved (ISO 8601 format).
    pub timestamp: String,
}

impl InteractiveExchange {
    fn new(question: &str, source: ResolutionSource, answer: String) -> Self {
        Self {
            question: question.to_string(),
            source,
            answer,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Produces an answer for a permission question.
#[async_trait]
pub trait AnswerResolver: Send + Sync {
    async fn resolve(&self, question: &str) -> Result<InteractiveExchange>;
}

/// Verbs that make a question destructive enough to refuse in command
/// mode.
const DESTRUCTIVE_VERBS: &[&str] = &[
    "delete", "remove", "drop", "erase", "discard", "overwrite", "force push", "reset --hard",
];

/// Verbs the command-mode heuristic waves through.
const PERMISSIVE_VERBS: &[&str] = &[
    "modify", "create", "add", "update", "write", "edit", "proceed", "continue", "install",
];

/// Command-mode resolver: conservative for destructive verbs, permissive
/// for everything that only modifies or creates.
pub struct AutoResolver;

#[async_trait]
impl AnswerResolver for AutoResolver {
    async fn resolve(&self, question: &str) -> Result<InteractiveExchange> {
        let lowered = question.to_lowercase();
        let answer = if DESTRUCTIVE_VERBS.iter().any(|v| lowered.contains(v)) {
            "no"
        } else if PERMISSIVE_VERBS.iter().any(|v| lowered.contains(v)) {
            "yes"
        } else {
            // Unrecognized questions are treated as ordinary
            // continuation prompts.
            "yes"
        };
        Ok(InteractiveExchange::new(
            question,
            ResolutionSource::Auto,
            answer.to_string(),
        ))
    }
}

/// Interactive resolver: prints the question and a small menu of smart
/// defaults, then reads one line from the terminal.
pub struct HumanResolver;

#[async_trait]
impl AnswerResolver for HumanResolver {
    async fn resolve(&self, question: &str) -> Result<InteractiveExchange> {
        println!();
        println!("The tool is asking for permission:");
        println!("  {}", question);
        println!("  [y] yes   [n] no   (or type a full answer, Enter = yes)");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| SableError::interaction(format!("failed to read answer: {}", e)))?;

        let answer = match line.trim() {
            "" | "y" | "Y" => "yes".to_string(),
            "n" | "N" => "no".to_string(),
            other => other.to_string(),
        };

        Ok(InteractiveExchange::new(question, ResolutionSource::Human, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_resolver_refuses_destructive() {
        let exchange = AutoResolver
            .resolve("Do you want me to delete the migrations directory? (y/n)")
            .await
            .unwrap();
        assert_eq!(exchange.answer, "no");
        assert_eq!(exchange.source, ResolutionSource::Auto);
    }

    #[tokio::test]
    async fn test_auto_resolver_allows_modification() {
        let exchange = AutoResolver
            .resolve("Would you like me to modify src/main.rs?")
            .await
            .unwrap();
        assert_eq!(exchange.answer, "yes");
    }

    #[tokio::test]
    async fn test_auto_resolver_defaults_to_yes() {
        let exchange = AutoResolver
            .resolve("Do you want me to proceed? (y/n)")
            .await
            .unwrap();
        assert_eq!(exchange.answer, "yes");
    }

    #[tokio::test]
    async fn test_auto_resolver_destructive_wins_over_permissive() {
        // "update" is permissive but "overwrite" must dominate.
        let exchange = AutoResolver
            .resolve("Proceed to overwrite and update the lockfile?")
            .await
            .unwrap();
        assert_eq!(exchange.answer, "no");
    }
}
