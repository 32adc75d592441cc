use std::sync::Arc;
use std::time::Duration;

use acp_protocol::{outbound_request, ProtocolError, ReverseRpcTable};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::AgentError;

/// Whatever emits a fully framed outbound message onto the stdout writer;
/// implemented by the binary's frame writer in production, a channel in
/// tests.
#[async_trait::async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, message: Value);
}

pub struct ClientRpcClient {
    table: Arc<ReverseRpcTable>,
    sink: Arc<dyn OutboundSink>,
}

impl ClientRpcClient {
    pub fn new(table: Arc<ReverseRpcTable>, sink: Arc<dyn OutboundSink>) -> Self {
        Self { table, sink }
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        deadline: Duration,
    ) -> Result<R, AgentError> {
        let (id, rx) = self.table.begin_call().await;
        let params = serde_json::to_value(params)
            .map_err(|e| AgentError::InvalidParams(e.to_string()))?;
        let message = outbound_request(id.clone(), method, params);
        self.sink.send(message).await;

        let result = self
            .table
            .await_reply(id, rx, deadline)
            .await
            .map_err(|error| match error {
                ProtocolError::Deadline => AgentError::ReverseRpcDeadline,
                other => AgentError::Internal(other.to_string()),
            })?;
        serde_json::from_value(result).map_err(|e| AgentError::Internal(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadTextFileParams {
    pub session_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReadTextFileResult {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteTextFileParams {
    pub session_id: String,
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTerminalParams {
    pub session_id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateTerminalResult {
    pub terminal_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerminalIdParams {
    pub session_id: String,
    pub terminal_id: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TerminalOutputResult {
    pub output: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub exit_status: Option<i32>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TerminalExitResult {
    pub exit_status: Option<i32>,
}

const DEFAULT_CLIENT_CALL_DEADLINE: Duration = Duration::from_secs(90);

/// Typed wrappers over reverse-RPC: validate required fields before the
/// call, parse the response shape after it.
pub struct FsClient(ClientRpcClient);

impl FsClient {
    pub fn new(client: ClientRpcClient) -> Self {
        Self(client)
    }

    pub async fn read_text_file(&self, params: ReadTextFileParams) -> Result<ReadTextFileResult, AgentError> {
        if params.path.trim().is_empty() {
            return Err(AgentError::InvalidParams("path must not be empty".to_string()));
        }
        self.0
            .call("fs/read_text_file", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await
    }

    pub async fn write_text_file(&self, params: WriteTextFileParams) -> Result<(), AgentError> {
        if params.path.trim().is_empty() {
            return Err(AgentError::InvalidParams("path must not be empty".to_string()));
        }
        let _: Value = self
            .0
            .call("fs/write_text_file", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await?;
        Ok(())
    }
}

pub struct TerminalClient(ClientRpcClient);

impl TerminalClient {
    pub fn new(client: ClientRpcClient) -> Self {
        Self(client)
    }

    pub async fn create(&self, params: CreateTerminalParams) -> Result<CreateTerminalResult, AgentError> {
        if params.command.trim().is_empty() {
            return Err(AgentError::InvalidParams("command must not be empty".to_string()));
        }
        self.0
            .call("terminal/create", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await
    }

    pub async fn output(&self, params: TerminalIdParams) -> Result<TerminalOutputResult, AgentError> {
        self.0
            .call("terminal/output", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await
    }

    pub async fn wait_for_exit(&self, params: TerminalIdParams) -> Result<TerminalExitResult, AgentError> {
        self.0
            .call("terminal/wait_for_exit", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await
    }

    pub async fn kill(&self, params: TerminalIdParams) -> Result<(), AgentError> {
        let _: Value = self
            .0
            .call("terminal/kill", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await?;
        Ok(())
    }

    pub async fn release(&self, params: TerminalIdParams) -> Result<(), AgentError> {
        let _: Value = self
            .0
            .call("terminal/release", params, DEFAULT_CLIENT_CALL_DEADLINE)
            .await?;
        Ok(())
    }
}

/// In-memory sink used by tests to capture outbound reverse-RPC calls
/// without a real stdio writer.
pub struct RecordingSink {
    pub sent: Mutex<Vec<Value>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl OutboundSink for RecordingSink {
    async fn send(&self, message: Value) {
        self.sent.lock().await.push(message);
    }
}
