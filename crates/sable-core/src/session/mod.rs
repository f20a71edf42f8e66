//! Session state: message model, session entity, and the conversation
//! store that owns them.

pub mod message;
pub mod model;
pub mod store;

pub use message::{ConversationMessage, MessageRole, estimate_tokens};
pub use model::Session;
pub use store::{COMPRESSED_TAG, ConversationStore, Summarizer};
