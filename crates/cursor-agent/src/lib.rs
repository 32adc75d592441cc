#![forbid(unsafe_code)]
//! Async bridge around the `cursor-agent` backend CLI.
//!
//! Covers one-shot invocation with retry/backoff, streaming
//! `--output-format stream-json` prompts, and the auxiliary
//! version/authentication/model probes. This crate intentionally does not
//! model any of `cursor-agent`'s interactive (non-`--print`) behavior.

mod auth;
mod bridge;
mod builder;
mod error;
mod models;
mod process;
mod request;
mod stream;
mod stream_json;
mod version;

pub use auth::AuthStatus;
pub use bridge::{Bridge, ExecOptions};
pub use builder::{BridgeBuilder, BINARY_ENV_VAR};
pub use error::BackendError;
pub use models::{infer_provider, ModelInfo};
pub use process::CommandOutput;
pub use request::StreamingPromptRequest;
pub use stream::{StreamChunk, StreamStatus};
pub use stream_json::{extract_text, ParsedLine};
