//! The caller-facing facade over the invocation layer.
//!
//! `InteractionManager` is the single entry point task executors and
//! intent classifiers talk to: it owns the strategy chain and the
//! interactive driver, borrows the conversation store, and guarantees
//! the "always get an answer" contract — the only error it ever raises
//! is an unknown session id.

use crate::driver::{AnswerResolver, AutoResolver, HumanResolver, InteractiveSessionDriver};
use crate::invoke::{InvocationChain, InvocationOutcome};
use async_trait::async_trait;
use sable_core::config::SableConfig;
use sable_core::error::{Result, SableError};
use sable_core::session::{ConversationMessage, ConversationStore, MessageRole, Summarizer};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Response returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The assistant's reply text (possibly a synthesized fallback).
    pub response: String,
    /// Token estimate of the reply; zero when synthesized.
    pub tokens_used: usize,
}

/// Reply text for a round trip the caller cancelled mid-flight. Nothing
/// is appended to the session in that case.
pub const REQUEST_CANCELLED_REPLY: &str =
    "The request was cancelled before the tool produced a reply.";

/// Facade composing the store, the strategy chain, and the interactive
/// driver.
pub struct InteractionManager {
    store: Arc<ConversationStore>,
    chain: InvocationChain,
    driver: InteractiveSessionDriver,
}

impl InteractionManager {
    /// Builds the facade from configuration. The resolver for permission
    /// requests follows `config.auto_answer`.
    pub fn new(config: &SableConfig, store: Arc<ConversationStore>) -> Self {
        let resolver: Box<dyn AnswerResolver> = if config.auto_answer {
            Box::new(AutoResolver)
        } else {
            Box::new(HumanResolver)
        };
        Self {
            store,
            chain: InvocationChain::new(config.tool.clone(), config.budget),
            driver: InteractiveSessionDriver::new(config.tool.clone(), config.budget, resolver),
        }
    }

    /// Access to the underlying store, for session lifecycle calls.
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Starts (or reuses) a session for a project path.
    pub async fn start_or_get_session(&self, project_path: impl AsRef<Path>) -> String {
        self.store.start_or_get_session(project_path).await
    }

    /// Sends one user message through a session and returns the reply.
    ///
    /// Flow: compress history if needed, compose the prompt from history
    /// plus optional context, try the interactive driver, fall back to
    /// the one-shot chain, then append the exchange to the session.
    ///
    /// # Errors
    ///
    /// Only `UnknownSession`; every environmental failure is absorbed
    /// into a degraded reply.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        context: Option<&str>,
    ) -> Result<Reply> {
        self.send_message_with_cancel(session_id, text, context, CancellationToken::new())
            .await
    }

    /// [`send_message`](Self::send_message) with an external cancellation
    /// token; cancelling kills any subprocess the call is blocked on.
    pub async fn send_message_with_cancel(
        &self,
        session_id: &str,
        text: &str,
        context: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Reply> {
        // Raises UnknownSession before any subprocess work happens.
        let snapshot = self.store.snapshot(session_id).await?;
        let project_path = snapshot.project_path.clone();

        self.store.maybe_compress(session_id, self).await?;
        let history = self.store.render_history(session_id).await?;

        let prompt = compose_prompt(&history, context, text);

        let outcome = match self.driver.run(&prompt, &project_path, cancel.clone()).await {
            Ok(session) if !session.transcript.trim().is_empty() => InvocationOutcome {
                text: session.transcript.trim().to_string(),
                token_estimate: session.token_estimate,
            },
            Ok(_) => {
                log::warn!("Interactive session returned an empty transcript; using one-shot chain");
                self.chain.invoke(&prompt, &project_path).await
            }
            Err(_) if cancel.is_cancelled() => {
                // A user interrupt ends the round trip; the exchange is
                // not recorded.
                return Ok(Reply {
                    response: REQUEST_CANCELLED_REPLY.to_string(),
                    tokens_used: 0,
                });
            }
            Err(e) => {
                log::warn!("Interactive session failed ({}); using one-shot chain", e);
                self.chain.invoke(&prompt, &project_path).await
            }
        };

        self.store
            .append_exchange(
                session_id,
                ConversationMessage::new(MessageRole::User, text),
                ConversationMessage::new(MessageRole::Assistant, outcome.text.clone()),
            )
            .await?;

        Ok(Reply {
            response: outcome.text,
            tokens_used: outcome.token_estimate,
        })
    }

    /// Session-less one-shot call through the strategy chain. Appends
    /// nothing to any session.
    pub async fn one_shot(&self, prompt: &str, working_dir: &Path) -> InvocationOutcome {
        self.chain.invoke(prompt, working_dir).await
    }

    /// Reports whether the external tool resolves on this host.
    pub async fn tool_available(&self) -> bool {
        self.chain.is_available().await
    }

    /// Drops all session state. Call once at program shutdown.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

#[async_trait]
impl Summarizer for InteractionManager {
    /// Summarizes older history through a one-shot call. A synthesized
    /// fallback reply is reported as failure so the store degrades to
    /// truncation instead of storing an apology as "history".
    async fn summarize(&self, transcript: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following conversation into 2-3 paragraphs. \
             Preserve decisions made, important context, referenced files, \
             and unresolved threads.\n\n{}",
            transcript
        );
        let outcome = self.chain.invoke(&prompt, Path::new(".")).await;
        if outcome.is_synthesized() {
            return Err(SableError::subprocess(
                "summarization fell back to a synthesized reply",
            ));
        }
        Ok(outcome.text)
    }
}

/// Builds the composed prompt: prior history, optional project context,
/// then the new user input.
fn compose_prompt(history: &str, context: Option<&str>, text: &str) -> String {
    let mut prompt = String::new();
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(history);
        prompt.push_str("\n\n");
    }
    if let Some(context) = context {
        prompt.push_str("Project context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("User: ");
    prompt.push_str(text);
    prompt.push_str("\nRespond as the assistant.");
    prompt
}
