//! sable-interaction: everything that talks to the external LLM tool.
//!
//! Three layers, composed by [`manager::InteractionManager`]:
//!
//! - [`invoke`]: one-shot subprocess execution through a chain of
//!   environment/authentication fallback strategies. Never fails.
//! - [`driver`]: long-lived interactive sessions that answer in-stream
//!   permission requests.
//! - [`manager`]: the facade callers use, wired to the conversation
//!   store in `sable-core`.

pub mod driver;
pub mod invoke;
pub mod manager;

pub use driver::{InteractiveSessionDriver, SessionOutcome};
pub use invoke::{InvocationChain, InvocationOutcome};
pub use manager::{InteractionManager, Reply};
