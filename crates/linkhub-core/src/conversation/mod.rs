//! Chat conversation state machine: per-user sessions and the engine that
//! advances them one message at a time.

pub mod engine;
pub mod session;

pub use engine::{Command, ConversationEngine, Inbound, Prompt, Signal};
pub use session::{Phase, SessionHandle, SessionStore};
