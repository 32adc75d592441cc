use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cursor-agent binary not found")]
    MissingBinary,
    #[error("failed to spawn cursor-agent (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("cursor-agent timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("failed waiting for cursor-agent: {0}")]
    Wait(std::io::Error),
    #[error("failed reading stdout: {0}")]
    StdoutRead(std::io::Error),
    #[error("failed reading stderr: {0}")]
    StderrRead(std::io::Error),
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("internal error: missing stderr pipe")]
    MissingStderr,
    #[error("internal error: join failure: {0}")]
    Join(String),
    #[error("request is invalid: {0}")]
    InvalidRequest(String),
    #[error("cursor-agent exited with status {status}: {stderr}")]
    NonZeroExit { status: ExitStatus, stderr: String },
    #[error("the call was cancelled")]
    Cancelled,
    #[error("failed to parse cursor-agent output: {0}")]
    Parse(String),
}
