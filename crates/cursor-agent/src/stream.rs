use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::request::StreamingPromptRequest;
use crate::stream_json::{extract_text, ParsedLine, StreamJsonParser};

/// One increment of a streaming prompt turn: the underlying callback-driven
/// child process output translated into a single-producer lazy sequence of
/// chunks delivered to the caller.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Content(ParsedLine),
    Done,
    Error(String),
}

/// Terminal classification of a streaming prompt once its receiver is
/// exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Aborted,
    Error,
}

/// Spawns `cursor-agent` in streaming mode and returns a channel of
/// [`StreamChunk`]s the caller pulls from; the producer backpressures on
/// send. The returned task handle resolves to the final status once the
/// child exits or is cancelled.
pub fn send_streaming_prompt(
    binary: PathBuf,
    working_dir: Option<PathBuf>,
    request: StreamingPromptRequest,
    timeout: Option<Duration>,
    cancel: CancellationToken,
) -> (
    mpsc::UnboundedReceiver<StreamChunk>,
    tokio::task::JoinHandle<StreamStatus>,
) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let status = run_streaming(binary, working_dir, request, timeout, cancel, &tx).await;
        match &status {
            Ok(()) => {
                let _ = tx.send(StreamChunk::Done);
                StreamStatus::Completed
            }
            Err(BackendError::Cancelled) => {
                let _ = tx.send(StreamChunk::Error(BackendError::Cancelled.to_string()));
                StreamStatus::Aborted
            }
            Err(err) => {
                let _ = tx.send(StreamChunk::Error(err.to_string()));
                StreamStatus::Error
            }
        }
    });

    (rx, handle)
}

async fn run_streaming(
    binary: PathBuf,
    working_dir: Option<PathBuf>,
    request: StreamingPromptRequest,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    tx: &mpsc::UnboundedSender<StreamChunk>,
) -> Result<(), BackendError> {
    let mut command = Command::new(&binary);
    command.args(request.argv());
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    command.stdin(std::process::Stdio::null());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let mut child = crate::process::spawn_with_retry(&mut command, &binary)?;
    let stdout = child.stdout.take().ok_or(BackendError::MissingStdout)?;
    let stderr = child.stderr.take().ok_or(BackendError::MissingStderr)?;

    let mut lines = BufReader::new(stdout).lines();
    let mut parser = StreamJsonParser::new();

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    });

    let timeout_fut = async {
        if let Some(dur) = timeout {
            tokio::time::sleep(dur).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(timeout_fut);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                break Err(BackendError::Cancelled);
            }
            _ = &mut timeout_fut => {
                let _ = child.start_kill();
                break Err(BackendError::Timeout { timeout: timeout.unwrap_or_default() });
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        if let Some(parsed) = parser.parse_line(&raw) {
                            if let ParsedLine::Json(value) = &parsed {
                                let _ = extract_text(value);
                            }
                            let _ = tx.send(StreamChunk::Content(parsed));
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(err) => break Err(BackendError::StdoutRead(err)),
                }
            }
        }
    };

    let status = child.wait().await.map_err(BackendError::Wait);
    let stderr_text = stderr_task.await.unwrap_or_default();

    outcome?;

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(BackendError::NonZeroExit {
            status,
            stderr: stderr_text,
        }),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn echo_script(lines: &[&str], exit_code: i32) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        for line in lines {
            writeln!(file, "printf '%s\\n' '{}'", line.replace('\'', "'\\''")).unwrap();
        }
        writeln!(file, "exit {exit_code}").unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(file.path(), perms).unwrap();
        file
    }

    #[tokio::test]
    async fn aggregates_two_json_lines_then_done() {
        let script = echo_script(&["{\"content\":\"Hello\"}", "{\"content\":\" world\"}"], 0);
        let (mut rx, handle) = send_streaming_prompt(
            script.path().to_path_buf(),
            None,
            StreamingPromptRequest::new("hi"),
            Some(Duration::from_secs(5)),
            CancellationToken::new(),
        );

        let mut texts = Vec::new();
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Content(ParsedLine::Json(v)) => {
                    if let Some(text) = extract_text(&v) {
                        texts.push(text);
                    }
                }
                StreamChunk::Done => break,
                StreamChunk::Error(e) => panic!("unexpected error chunk: {e}"),
                _ => {}
            }
        }
        assert_eq!(texts.concat(), "Hello world");
        assert_eq!(handle.await.unwrap(), StreamStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_yields_aborted_status() {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "sleep 5").unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let cancel = CancellationToken::new();
        let (_rx, handle) = send_streaming_prompt(
            file.path().to_path_buf(),
            None,
            StreamingPromptRequest::new("hi"),
            None,
            cancel.clone(),
        );
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), StreamStatus::Aborted);
    }
}
