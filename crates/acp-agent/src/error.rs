use thiserror::Error;

use acp_protocol::ProtocolError;
use acp_session::SessionError;
use cursor_agent::BackendError;

/// The dispatcher's single error currency: every handler returns this, and
/// the dispatcher is the only place that maps it to a JSON-RPC error
/// object.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("client refused reverse RPC: {0}")]
    ClientRefused(String),
    #[error("reverse RPC deadline exceeded")]
    ReverseRpcDeadline,
    #[error("tool error: {0}")]
    Tool(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Maps this error to the JSON-RPC error code and a `data.name`
    /// discriminant the dispatcher attaches.
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            AgentError::Protocol(inner) => inner.code(),
            AgentError::InvalidParams(_) => acp_protocol::INVALID_PARAMS,
            AgentError::InvalidConfig(_) => acp_protocol::INTERNAL_ERROR,
            AgentError::Session(_)
            | AgentError::Backend(_)
            | AgentError::ClientRefused(_)
            | AgentError::ReverseRpcDeadline
            | AgentError::Tool(_)
            | AgentError::Internal(_) => acp_protocol::INTERNAL_ERROR,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentError::Protocol(_) => "protocol",
            AgentError::Session(_) => "session",
            AgentError::Backend(_) => "backend",
            AgentError::InvalidParams(_) => "invalid_params",
            AgentError::InvalidConfig(_) => "invalid_config",
            AgentError::ClientRefused(_) => "reverse_rpc",
            AgentError::ReverseRpcDeadline => "reverse_rpc",
            AgentError::Tool(_) => "tool",
            AgentError::Internal(_) => "internal",
        }
    }
}
