use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes used by the framer and dispatcher.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line exceeds the {limit} byte frame limit")]
    FrameTooLarge { limit: usize },
    #[error("malformed JSON-RPC envelope: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("the stdout writer has shut down")]
    WriterClosed,
    #[error("reverse-RPC call timed out")]
    Deadline,
    #[error("reverse-RPC channel closed before a reply arrived")]
    ChannelClosed,
}

impl ProtocolError {
    /// Maps this error onto a JSON-RPC error code for the dispatcher's
    /// response translation.
    pub fn code(&self) -> i64 {
        match self {
            ProtocolError::FrameTooLarge { .. } => PARSE_ERROR,
            ProtocolError::Parse(_) => PARSE_ERROR,
            ProtocolError::InvalidRequest(_) => INVALID_REQUEST,
            ProtocolError::WriterClosed | ProtocolError::Deadline | ProtocolError::ChannelClosed => {
                INTERNAL_ERROR
            }
        }
    }
}
