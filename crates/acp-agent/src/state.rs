use std::collections::HashMap;
use std::sync::Arc;

use acp_protocol::{RpcId, ReverseRpcTable};
use acp_session::{ModeInfo, PermissionHandler, SessionManager, SessionManagerConfig, SlashCommandRegistry, ToolCallLedger};
use cursor_agent::Bridge;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client_rpc::{ClientRpcClient, FsClient, OutboundSink, TerminalClient};
use crate::config::AgentConfig;
use crate::extensions::ExtensionRegistry;

fn default_modes() -> Vec<ModeInfo> {
    vec![
        ModeInfo {
            id: "ask".to_string(),
            name: "Ask".to_string(),
        },
        ModeInfo {
            id: "agent".to_string(),
            name: "Agent".to_string(),
        },
    ]
}

/// One active streaming prompt turn, keyed by session id so
/// `session/cancel{sessionId}` can find it; the request id is kept
/// alongside so a `session/cancel{sessionId, requestId}` only cancels a
/// turn still answering that specific request.
pub struct ActivePrompt {
    pub request_id: RpcId,
    pub cancel: CancellationToken,
}

/// Everything the dispatcher and prompt handler share for the process
/// lifetime. Constructed once in `main`, held behind an `Arc`.
pub struct AgentState {
    pub config: AgentConfig,
    pub sessions: Arc<SessionManager>,
    pub bridge: Bridge,
    pub tool_calls: Arc<ToolCallLedger>,
    pub permissions: Arc<PermissionHandler>,
    pub commands: Arc<SlashCommandRegistry>,
    pub extensions: Arc<ExtensionRegistry>,
    pub reverse: Arc<ReverseRpcTable>,
    pub sink: Arc<dyn OutboundSink>,
    pub active_prompts: Mutex<HashMap<String, ActivePrompt>>,
    pub client_capabilities: Mutex<Option<serde_json::Value>>,
    pub negotiated_version: Mutex<Option<i64>>,
}

impl AgentState {
    pub async fn new(config: AgentConfig, bridge: Bridge, sink: Arc<dyn OutboundSink>) -> Result<Arc<Self>, crate::error::AgentError> {
        config
            .validate()
            .map_err(|e| crate::error::AgentError::InvalidConfig(e.to_string()))?;

        let models = bridge.list_models().await.unwrap_or_else(|_| vec![cursor_agent::ModelInfo::auto()]);
        let available_models = models.into_iter().map(to_session_model).collect();

        let sessions = SessionManager::new(SessionManagerConfig {
            max_sessions: config.max_sessions,
            session_timeout: std::time::Duration::from_millis(config.session_timeout_ms),
            storage_dir: config.expanded_session_dir(),
            default_mode: "ask".to_string(),
            default_model: "auto".to_string(),
            available_modes: default_modes(),
            available_models,
        })
        .await?;

        tokio::spawn(sessions.clone().run_cleanup_loop());

        let reverse = Arc::new(ReverseRpcTable::default());

        Ok(Arc::new(Self {
            config,
            sessions,
            bridge,
            tool_calls: Arc::new(ToolCallLedger::new()),
            permissions: Arc::new(PermissionHandler::new()),
            commands: Arc::new(SlashCommandRegistry::new()),
            extensions: Arc::new(ExtensionRegistry::new()),
            reverse,
            sink,
            active_prompts: Mutex::new(HashMap::new()),
            client_capabilities: Mutex::new(None),
            negotiated_version: Mutex::new(None),
        }))
    }

    pub fn fs_client(&self) -> FsClient {
        FsClient::new(ClientRpcClient::new(self.reverse.clone(), self.sink.clone()))
    }

    pub fn terminal_client(&self) -> TerminalClient {
        TerminalClient::new(ClientRpcClient::new(self.reverse.clone(), self.sink.clone()))
    }
}

fn to_session_model(model: cursor_agent::ModelInfo) -> acp_session::ModelInfo {
    acp_session::ModelInfo {
        id: model.id,
        name: model.name,
        provider: model.provider,
    }
}
