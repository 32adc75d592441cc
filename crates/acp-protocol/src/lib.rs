#![forbid(unsafe_code)]
//! Line-delimited JSON-RPC 2.0 transport for the Agent Client Protocol.
//!
//! This crate is deliberately small: it owns frame decoding/encoding and
//! the reverse-RPC waiter table. Everything about *what* a method means
//! lives one layer up, in `acp-session` and `acp-agent`.

mod envelope;
mod error;
mod framer;
mod reverse;

pub use envelope::{
    classify, notification, outbound_request, response_err, response_ok, Inbound, RpcErrorObject,
    RpcId,
};
pub use error::{
    ProtocolError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use framer::{FrameReader, FrameWriter, MAX_FRAME_BYTES};
pub use reverse::{ReverseRpcTable, DEFAULT_REVERSE_RPC_DEADLINE};
