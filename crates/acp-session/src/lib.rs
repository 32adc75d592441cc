#![forbid(unsafe_code)]
//! Session lifecycle, conversation/tool-call bookkeeping, permission
//! arbitration, and the slash-command registry backing `session/update`
//! notifications.
//!
//! This crate owns state; it knows nothing about JSON-RPC framing
//! (`acp-protocol`) or how prompts actually reach the backend CLI
//! (`cursor-agent`) — those are composed on top in `acp-agent`.

mod commands;
mod error;
mod manager;
mod model;
mod permissions;
mod tool_calls;

pub use commands::{SlashCommandInfo, SlashCommandRegistry};
pub use error::SessionError;
pub use manager::{SessionManager, SessionManagerConfig};
pub use model::{
    ContentBlock, Message, ModeInfo, ModelInfo, Role, Session, SessionListFilter, SessionState,
    SessionStatus,
};
pub use permissions::{
    PendingPermission, PermissionHandler, PermissionOption, PermissionOptionKind, PermissionOutcome,
};
pub use tool_calls::{ToolCallInfo, ToolCallLedger, ToolCallStatus};
