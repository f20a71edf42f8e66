//! In-memory conversation store.
//!
//! `ConversationStore` owns every [`Session`] for the process lifetime and
//! serializes history mutation per session id. It is created once at
//! startup and passed by `Arc` to every component; nothing in the
//! workspace keeps ambient global state.

use super::message::ConversationMessage;
use super::model::Session;
use crate::config::HistoryLimits;
use crate::error::{Result, SableError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Tag prepended to the synthetic message that replaces a compressed
/// history prefix.
pub const COMPRESSED_TAG: &str = "[COMPRESSED HISTORY]";

/// Summarizes a rendered conversation transcript into a short digest.
///
/// The store depends on this trait instead of the invocation layer
/// directly, so `sable-core` stays free of subprocess code. The facade in
/// `sable-interaction` implements it with a one-shot call through the
/// strategy chain.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produces a 2-3 paragraph summary of the transcript, preserving
    /// decisions, context, referenced files, and open threads.
    async fn summarize(&self, transcript: &str) -> Result<String>;
}

/// Manages every session's lifecycle and history.
///
/// `ConversationStore` is responsible for:
/// - Creating sessions (fresh id per call, or idempotent per path)
/// - Appending message exchanges in call order
/// - Compressing history before it exceeds the context budget
/// - Evicting idle sessions during housekeeping
pub struct ConversationStore {
    /// Session cache, keyed by session id. Each session sits behind its
    /// own `Mutex` so appends to one session serialize while distinct
    /// sessions proceed concurrently.
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    /// Index from project path to the most recent live session id.
    by_path: RwLock<HashMap<PathBuf, String>>,
    limits: HistoryLimits,
}

impl ConversationStore {
    /// Creates an empty store with the given history limits.
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_path: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Creates a new session for a project path and returns its id.
    ///
    /// The id embeds the creation time, so each call mints a fresh id even
    /// for a path that already has a live session; callers must cache the
    /// id themselves (or use [`start_or_get_session`](Self::start_or_get_session)
    /// for the store-enforced variant).
    pub async fn start_session(&self, project_path: impl AsRef<Path>) -> String {
        let session = Session::new(project_path.as_ref());
        let id = session.id.clone();

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        drop(sessions);

        let mut by_path = self.by_path.write().await;
        by_path.insert(project_path.as_ref().to_path_buf(), id.clone());

        log::debug!("Started session {} for {:?}", id, project_path.as_ref());
        id
    }

    /// Returns the live session id for a project path, creating a session
    /// if none exists.
    pub async fn start_or_get_session(&self, project_path: impl AsRef<Path>) -> String {
        {
            let by_path = self.by_path.read().await;
            if let Some(id) = by_path.get(project_path.as_ref()) {
                let sessions = self.sessions.read().await;
                if sessions.contains_key(id) {
                    return id.clone();
                }
                // Stale index entry: the session was evicted.
            }
        }
        self.start_session(project_path).await
    }

    /// Looks up a session handle by id.
    async fn session(&self, session_id: &str) -> Result<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SableError::unknown_session(session_id))
    }

    /// Appends a single message to a session.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the id was never issued or the session
    /// has been evicted.
    pub async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        session.push(message);
        self.enforce_ceiling(&mut session);
        Ok(())
    }

    /// Appends a user/assistant exchange under one lock, so concurrent
    /// callers cannot interleave between the two halves of a round trip.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user: ConversationMessage,
        assistant: ConversationMessage,
    ) -> Result<()> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        session.push(user);
        session.push(assistant);
        self.enforce_ceiling(&mut session);
        Ok(())
    }

    /// The hard ceiling holds after every append, even when compression
    /// has been degrading to truncation for a while: the oldest messages
    /// are dropped once the count passes `max_history_length`.
    fn enforce_ceiling(&self, session: &mut Session) {
        let max = self.limits.max_history_length;
        if session.messages.len() > max {
            let excess = session.messages.len() - max;
            session.messages.drain(..excess);
        }
    }

    /// Renders a session's history as `Role: content` lines.
    pub async fn render_history(&self, session_id: &str) -> Result<String> {
        let session = self.session(session_id).await?;
        let session = session.lock().await;
        Ok(session.render_history())
    }

    /// Returns a point-in-time copy of a session.
    pub async fn snapshot(&self, session_id: &str) -> Result<Session> {
        let session = self.session(session_id).await?;
        let session = session.lock().await;
        Ok(session.clone())
    }

    /// Compresses a session's history if it has grown past the threshold.
    ///
    /// All messages except the most recent `keep_recent` are rendered as
    /// `Role: content` lines and handed to the summarizer; the prefix is
    /// then replaced by a single synthetic assistant message tagged
    /// `[COMPRESSED HISTORY]`. If summarization fails, the history is
    /// truncated to the most recent `max_history_length` messages instead
    /// and the conversation continues.
    ///
    /// Returns `true` if the history was compressed or truncated.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the id is not live. Summarizer failures
    /// do not surface as errors.
    pub async fn maybe_compress(
        &self,
        session_id: &str,
        summarizer: &dyn Summarizer,
    ) -> Result<bool> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;

        if session.messages.len() <= self.limits.compression_threshold {
            return Ok(false);
        }

        let keep = self.limits.keep_recent;
        let cut = session.messages.len() - keep;
        let transcript = session.messages[..cut]
            .iter()
            .map(|m| m.render())
            .collect::<Vec<_>>()
            .join("\n");

        log::info!(
            "Compressing session {}: {} messages -> summary + {} retained",
            session_id,
            cut,
            keep
        );

        match summarizer.summarize(&transcript).await {
            Ok(summary) => {
                let synthetic = ConversationMessage::new(
                    super::message::MessageRole::Assistant,
                    format!("{} {}", COMPRESSED_TAG, summary),
                );
                let tail: Vec<ConversationMessage> = session.messages.split_off(cut);
                session.messages.clear();
                session.messages.push(synthetic);
                session.messages.extend(tail);
                session.touch();
                Ok(true)
            }
            Err(e) => {
                // Degrade to plain truncation; the conversation must not
                // stall because the summarization call failed.
                log::warn!(
                    "Summarization failed for session {}: {}. Truncating history.",
                    session_id,
                    e
                );
                let max = self.limits.max_history_length;
                if session.messages.len() > max {
                    let excess = session.messages.len() - max;
                    session.messages.drain(..excess);
                }
                session.touch();
                Ok(true)
            }
        }
    }

    /// Removes sessions idle longer than `max_age`. Returns the number of
    /// sessions evicted. Housekeeping only; never called automatically.
    pub async fn evict_older_than(&self, max_age: chrono::Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut evicted = Vec::new();

        let ids: Vec<String> = sessions.keys().cloned().collect();
        for id in ids {
            let idle = {
                let session = sessions[&id].lock().await;
                session.idle_time()
            };
            if idle > max_age {
                sessions.remove(&id);
                evicted.push(id);
            }
        }
        drop(sessions);

        if !evicted.is_empty() {
            let mut by_path = self.by_path.write().await;
            by_path.retain(|_, id| !evicted.contains(id));
            log::info!("Evicted {} idle session(s)", evicted.len());
        }
        evicted.len()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops all sessions. Called once at program shutdown.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        self.by_path.write().await.clear();
        log::debug!("Store shut down, {} session(s) dropped", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::MessageRole;

    struct FixedSummarizer;

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _transcript: &str) -> Result<String> {
            Ok("summary of earlier turns".to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _transcript: &str) -> Result<String> {
            Err(SableError::subprocess("tool unreachable"))
        }
    }

    fn limits() -> HistoryLimits {
        HistoryLimits {
            max_history_length: 50,
            compression_threshold: 20,
            keep_recent: 5,
        }
    }

    async fn fill(store: &ConversationStore, id: &str, n: usize) {
        for i in 0..n {
            store
                .append(id, ConversationMessage::new(MessageRole::User, format!("message {}", i)))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_append_unknown_session_fails() {
        let store = ConversationStore::new(limits());
        let err = store
            .append("nope", ConversationMessage::new(MessageRole::User, "hi"))
            .await
            .unwrap_err();
        assert!(err.is_unknown_session());
    }

    #[tokio::test]
    async fn test_start_session_mints_fresh_ids() {
        let store = ConversationStore::new(limits());
        let a = store.start_session("/tmp/project").await;
        // Ensure a later timestamp for the second id.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = store.start_session("/tmp/project").await;
        assert_ne!(a, b);
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_start_or_get_is_idempotent_per_path() {
        let store = ConversationStore::new(limits());
        let a = store.start_or_get_session("/tmp/project").await;
        let b = store.start_or_get_session("/tmp/project").await;
        assert_eq!(a, b);
        let c = store.start_or_get_session("/tmp/other").await;
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_compression_below_threshold_is_noop() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;
        fill(&store, &id, 20).await;
        let compressed = store.maybe_compress(&id, &FixedSummarizer).await.unwrap();
        assert!(!compressed);
        assert_eq!(store.snapshot(&id).await.unwrap().messages.len(), 20);
    }

    #[tokio::test]
    async fn test_compression_preserves_recent_messages() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;
        fill(&store, &id, 23).await;

        let before = store.snapshot(&id).await.unwrap();
        let tail_before: Vec<_> = before.messages[18..].to_vec();

        let compressed = store.maybe_compress(&id, &FixedSummarizer).await.unwrap();
        assert!(compressed);

        let after = store.snapshot(&id).await.unwrap();
        assert_eq!(after.messages.len(), 6);
        assert!(after.messages[0].content.starts_with(COMPRESSED_TAG));
        assert_eq!(after.messages[0].role, MessageRole::Assistant);
        // The retained tail is byte-identical.
        assert_eq!(&after.messages[1..], &tail_before[..]);
    }

    #[tokio::test]
    async fn test_compression_failure_truncates() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;
        fill(&store, &id, 55).await;

        let compressed = store.maybe_compress(&id, &FailingSummarizer).await.unwrap();
        assert!(compressed);

        let after = store.snapshot(&id).await.unwrap();
        assert_eq!(after.messages.len(), 50);
        // The oldest messages were dropped, not the newest.
        assert_eq!(after.messages.last().unwrap().content, "message 54");
        assert_eq!(after.messages[0].content, "message 5");
    }

    #[tokio::test]
    async fn test_ceiling_holds_under_plain_appends() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;
        fill(&store, &id, 60).await;
        let snap = store.snapshot(&id).await.unwrap();
        assert_eq!(snap.messages.len(), 50);
        assert_eq!(snap.messages.last().unwrap().content, "message 59");
    }

    #[tokio::test]
    async fn test_append_exchange_appends_pair_in_order() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;
        store
            .append_exchange(
                &id,
                ConversationMessage::new(MessageRole::User, "question"),
                ConversationMessage::new(MessageRole::Assistant, "answer"),
            )
            .await
            .unwrap();
        let snap = store.snapshot(&id).await.unwrap();
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[0].role, MessageRole::User);
        assert_eq!(snap.messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_evict_older_than() {
        let store = ConversationStore::new(limits());
        let id = store.start_session("/tmp/project").await;

        // A generous bound keeps the fresh session alive.
        assert_eq!(store.evict_older_than(chrono::Duration::hours(1)).await, 0);
        assert_eq!(store.session_count().await, 1);

        // A negative bound treats everything as stale.
        assert_eq!(
            store.evict_older_than(chrono::Duration::milliseconds(-1)).await,
            1
        );
        assert_eq!(store.session_count().await, 0);
        assert!(store.snapshot(&id).await.is_err());

        // The path index entry is gone too: a new session is created.
        let id2 = store.start_or_get_session("/tmp/project").await;
        assert_ne!(id, id2);
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let store = ConversationStore::new(limits());
        store.start_session("/tmp/a").await;
        store.start_session("/tmp/b").await;
        store.shutdown().await;
        assert_eq!(store.session_count().await, 0);
    }
}
