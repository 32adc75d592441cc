#![forbid(unsafe_code)]
//! Wires `acp-protocol`'s framing, `acp-session`'s state, and
//! `cursor-agent`'s backend bridge into a JSON-RPC dispatcher that speaks
//! the Agent Client Protocol over stdio.

pub mod client_rpc;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extensions;
pub mod prompt;
pub mod state;

pub use config::AgentConfig;
pub use error::AgentError;
pub use state::AgentState;
