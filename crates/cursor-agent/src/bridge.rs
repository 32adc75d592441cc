use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::auth::{parse_status, AuthStatus};
use crate::error::BackendError;
use crate::models::{parse_models, ModelInfo};
use crate::process::{run_to_completion, CommandOutput};
use crate::request::StreamingPromptRequest;
use crate::stream::{send_streaming_prompt, StreamChunk, StreamStatus};
use crate::version::parse_version;

/// Options for a one-shot [`Bridge::execute_command`] invocation.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Option<Duration>,
    pub retries: u32,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            retries: 0,
        }
    }
}

/// Async bridge to a `cursor-agent` binary: one-shot and streaming
/// invocation, plus the auxiliary probes (`GetVersion`,
/// `CheckAuthentication`, `ListModels`).
#[derive(Debug, Clone)]
pub struct Bridge {
    pub(crate) binary: PathBuf,
    pub(crate) working_dir: Option<PathBuf>,
}

impl Bridge {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            working_dir: None,
        }
    }

    pub fn builder() -> crate::builder::BridgeBuilder {
        crate::builder::BridgeBuilder::default()
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// One-shot `ExecuteCommand`: retries the whole invocation up to
    /// `opts.retries` times with backoff `min(2^(attempt-1), 5)` seconds.
    /// Interrupted by `cancel`.
    pub async fn execute_command(
        &self,
        args: Vec<String>,
        opts: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, BackendError> {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(BackendError::Cancelled);
            }

            let output = run_to_completion(self.command(&args), &self.binary, opts.timeout, Some(&cancel)).await;

            match output {
                Ok(output) if output.status.success() => return Ok(output),
                Err(BackendError::Cancelled) => return Err(BackendError::Cancelled),
                Ok(output) if attempt >= opts.retries => {
                    return Err(BackendError::NonZeroExit {
                        status: output.status,
                        stderr: output.stderr_string(),
                    });
                }
                Err(err) if attempt >= opts.retries => return Err(err),
                _ => {}
            }

            attempt += 1;
            let backoff_secs = 2u64.saturating_pow(attempt.saturating_sub(1)).min(5);
            let backoff = Duration::from_secs(backoff_secs);

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
            }
        }
    }

    /// Streaming `session/prompt` turn.
    pub fn send_streaming_prompt(
        &self,
        request: StreamingPromptRequest,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> (
        tokio::sync::mpsc::UnboundedReceiver<StreamChunk>,
        tokio::task::JoinHandle<StreamStatus>,
    ) {
        send_streaming_prompt(
            self.binary.clone(),
            self.working_dir.clone(),
            request,
            timeout,
            cancel,
        )
    }

    pub async fn get_version(&self) -> Result<String, BackendError> {
        let output = run_to_completion(
            self.command(&["--version".to_string()]),
            &self.binary,
            Some(Duration::from_secs(10)),
            None,
        )
        .await?;
        Ok(parse_version(&output.stdout_string()))
    }

    pub async fn check_authentication(&self) -> Result<AuthStatus, BackendError> {
        let output = run_to_completion(
            self.command(&["status".to_string()]),
            &self.binary,
            Some(Duration::from_secs(10)),
            None,
        )
        .await?;
        Ok(parse_status(&output.stdout_string()))
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let output = run_to_completion(
            self.command(&["models".to_string()]),
            &self.binary,
            Some(Duration::from_secs(10)),
            None,
        )
        .await;

        match output {
            Ok(output) if output.status.success() => Ok(parse_models(&output.stdout_string())),
            _ => Ok(vec![ModelInfo::auto()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn failing_then_succeeding_script(fail_times: u32) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        let counter = file.path().with_extension("count");
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "COUNT_FILE=\"{}\"", counter.display()).unwrap();
        writeln!(file, "if [ ! -f \"$COUNT_FILE\" ]; then echo 0 > \"$COUNT_FILE\"; fi").unwrap();
        writeln!(file, "N=$(cat \"$COUNT_FILE\")").unwrap();
        writeln!(file, "N=$((N+1))").unwrap();
        writeln!(file, "echo $N > \"$COUNT_FILE\"").unwrap();
        writeln!(file, "if [ \"$N\" -le {fail_times} ]; then echo fail 1>&2; exit 1; fi").unwrap();
        writeln!(file, "echo ok").unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(file.path(), perms).unwrap();
        file
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let script = failing_then_succeeding_script(2);
        let bridge = Bridge::new(script.path().to_path_buf());
        let output = bridge
            .execute_command(
                vec![],
                ExecOptions {
                    timeout: Some(Duration::from_secs(5)),
                    retries: 3,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout_string().trim(), "ok");
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let script = failing_then_succeeding_script(10);
        let bridge = Bridge::new(script.path().to_path_buf());
        let err = bridge
            .execute_command(
                vec![],
                ExecOptions {
                    timeout: Some(Duration::from_secs(5)),
                    retries: 1,
                },
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn cancelling_kills_the_subprocess_instead_of_waiting_out_its_timeout() {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "sleep 30").unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let bridge = Bridge::new(file.path().to_path_buf());
        let cancel = CancellationToken::new();
        let cancel_for_call = cancel.clone();
        let call = tokio::spawn(async move {
            bridge
                .execute_command(
                    vec![],
                    ExecOptions {
                        timeout: Some(Duration::from_secs(60)),
                        retries: 0,
                    },
                    cancel_for_call,
                )
                .await
        });

        tokio::task::yield_now().await;
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("cancellation should resolve promptly, not wait out the 60s timeout")
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, BackendError::Cancelled));
    }

    #[tokio::test]
    async fn list_models_falls_back_to_auto_on_failure() {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "exit 1").unwrap();
        let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let bridge = Bridge::new(file.path().to_path_buf());
        let models = bridge.list_models().await.unwrap();
        assert_eq!(models, vec![ModelInfo::auto()]);
    }
}
