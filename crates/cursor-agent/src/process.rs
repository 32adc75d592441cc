use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

async fn drain<R>(mut reader: R) -> Result<Vec<u8>, std::io::Error>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Spawns `command`, retrying the OS-level spawn (not the whole
/// invocation) when the executable is transiently busy — e.g. a concurrent
/// self-update is still flushing the binary to disk. This is distinct from
/// the caller-visible `retries` knob on [`crate::Bridge::execute_command`],
/// which re-runs the entire command.
pub(crate) fn spawn_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<tokio::process::Child, BackendError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(BackendError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }
    unreachable!("spawn_with_retry should return before exhausting retries")
}

/// Runs `command` to completion, capturing stdout/stderr and racing the
/// whole invocation against `timeout` if given, and against `cancel` if
/// one is supplied. Either one kills the child immediately rather than
/// letting it run to its own exit. cursor-agent takes its input as argv,
/// never stdin, so this never writes to the child's stdin.
pub(crate) async fn run_to_completion(
    mut command: Command,
    binary: &Path,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Result<CommandOutput, BackendError> {
    command.stdin(std::process::Stdio::null());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let mut child = spawn_with_retry(&mut command, binary)?;

    let stdout = child.stdout.take().ok_or(BackendError::MissingStdout)?;
    let stderr = child.stderr.take().ok_or(BackendError::MissingStderr)?;

    let stdout_task = tokio::spawn(drain(stdout));
    let stderr_task = tokio::spawn(drain(stderr));

    let timeout_fut = async {
        if let Some(dur) = timeout {
            time::sleep(dur).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    let cancel_fut = async {
        if let Some(token) = cancel {
            token.cancelled().await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(timeout_fut, cancel_fut);

    let status = tokio::select! {
        biased;
        _ = &mut cancel_fut => {
            let _ = child.start_kill();
            return Err(BackendError::Cancelled);
        }
        _ = &mut timeout_fut => {
            let _ = child.start_kill();
            return Err(BackendError::Timeout { timeout: timeout.unwrap_or_default() });
        }
        result = child.wait() => result.map_err(BackendError::Wait)?,
    };

    let stdout = stdout_task
        .await
        .map_err(|e| BackendError::Join(e.to_string()))?
        .map_err(BackendError::StdoutRead)?;
    let stderr = stderr_task
        .await
        .map_err(|e| BackendError::Join(e.to_string()))?
        .map_err(BackendError::StderrRead)?;

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Strips ANSI SGR/cursor escape sequences, used before parsing human
/// readable `status` output.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}
