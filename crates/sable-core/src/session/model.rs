//! Session domain model.
//!
//! This module contains the core Session entity that represents one
//! project's conversation with the external tool.

use super::message::ConversationMessage;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Represents one project's conversation state.
///
/// A session contains:
/// - The ordered conversation history (append-only except compression)
/// - The owning project path
/// - Timestamps for creation and last activity
/// - A cumulative token estimate across all appended messages
///
/// Sessions are owned exclusively by the `ConversationStore` and live for
/// the process lifetime unless explicitly evicted by age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier, derived from the project path and the
    /// creation time (see [`Session::derive_id`]).
    pub id: String,
    /// The project directory this conversation is about.
    pub project_path: PathBuf,
    /// Ordered conversation history.
    pub messages: Vec<ConversationMessage>,
    /// Timestamp when the session was created (ISO 8601 format).
    pub created_at: String,
    /// Timestamp of the last append or compression (ISO 8601 format).
    pub last_activity: String,
    /// Cumulative token estimate of everything appended to this session.
    pub total_tokens: usize,
}

impl Session {
    /// Creates a new empty session for a project path.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        let project_path = project_path.into();
        let now = chrono::Utc::now();
        Self {
            id: Self::derive_id(&project_path, now.timestamp_millis()),
            project_path,
            messages: Vec::new(),
            created_at: now.to_rfc3339(),
            last_activity: now.to_rfc3339(),
            total_tokens: 0,
        }
    }

    /// Derives a session id from the project path and a creation timestamp.
    ///
    /// The id embeds current time, so every call produces a fresh id even
    /// for the same path; callers that want one session per path must
    /// cache the returned id or use the store's path index.
    pub fn derive_id(project_path: &Path, timestamp_millis: i64) -> String {
        let mut hasher = DefaultHasher::new();
        project_path.hash(&mut hasher);
        format!("sess-{:08x}-{}", hasher.finish() as u32, timestamp_millis)
    }

    /// Appends a message, updating activity time and token accounting.
    pub fn push(&mut self, message: ConversationMessage) {
        self.total_tokens += message.token_estimate;
        self.messages.push(message);
        self.touch();
    }

    /// Updates the last-activity timestamp to now.
    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now().to_rfc3339();
    }

    /// Renders the full history as `Role: content` lines, one per message.
    pub fn render_history(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.render())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Age of the session since last activity.
    ///
    /// Returns zero if the stored timestamp cannot be parsed, so a
    /// corrupted timestamp never causes spurious eviction.
    pub fn idle_time(&self) -> chrono::Duration {
        match chrono::DateTime::parse_from_rfc3339(&self.last_activity) {
            Ok(t) => chrono::Utc::now().signed_duration_since(t),
            Err(_) => chrono::Duration::zero(),
        }
    }
}
