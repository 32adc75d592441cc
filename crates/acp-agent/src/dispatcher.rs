use std::sync::Arc;

use acp_protocol::{notification, response_err, response_ok, RpcId};
use acp_session::{PermissionHandler, PermissionOption, Role, SessionListFilter};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::prompt;
use crate::state::AgentState;

const SUPPORTED_PROTOCOL_VERSION: i64 = 1;

/// Parses and routes one inbound request, returning the response line to
/// write (dispatcher never answers notifications).
pub async fn handle_request(state: &Arc<AgentState>, id: RpcId, method: String, params: Option<Value>) -> Value {
    if method.starts_with('_') {
        if let Some(result) = state.extensions.dispatch(&method, params.clone()).await {
            return finish(id, result);
        }
    }

    let result = route(state, id.clone(), &method, params).await;
    let response = finish(id, result);
    run_post_response_side_effect(state, &method, &response).await;
    response
}

/// Runs the one dispatcher-level side effect that depends on a response
/// having been delivered rather than merely computed: once a new session
/// is visible to the client, it observes exactly one
/// `available_commands_update` notification for that session.
async fn run_post_response_side_effect(state: &Arc<AgentState>, method: &str, response: &Value) {
    if method != "session/new" {
        return;
    }
    let Some(session_id) = response
        .get("result")
        .and_then(|r| r.get("sessionId"))
        .and_then(Value::as_str)
    else {
        return;
    };
    let commands = state.commands.list().await;
    state
        .sink
        .send(notification(
            "session/update",
            json!({
                "sessionId": session_id,
                "update": {
                    "sessionUpdate": "available_commands_update",
                    "availableCommands": commands,
                },
            }),
        ))
        .await;
}

fn finish(id: RpcId, result: Result<Value, AgentError>) -> Value {
    match result {
        Ok(value) => response_ok(id, value),
        Err(error) => response_err(
            id,
            error.json_rpc_code(),
            error.to_string(),
            Some(json!({"name": error.name()})),
        ),
    }
}

async fn route(state: &Arc<AgentState>, id: RpcId, method: &str, params: Option<Value>) -> Result<Value, AgentError> {
    match method {
        "initialize" => handle_initialize(state, params).await,
        "session/new" => handle_session_new(state, params).await,
        "session/load" => handle_session_load(state, params).await,
        "session/list" => handle_session_list(state, params).await,
        "session/delete" => handle_session_delete(state, params).await,
        "session/set_mode" => handle_session_set_mode(state, params).await,
        "session/set_model" => handle_session_set_model(state, params).await,
        "session/prompt" => prompt::handle_prompt(state, id, params).await,
        "session/request_permission" => handle_request_permission(params).await,
        "tools/list" => handle_tools_list(state).await,
        "tools/call" => Err(AgentError::Tool(
            "individual tool implementations are out of scope; use the fs/terminal reverse-RPC stubs".to_string(),
        )),
        other => Err(AgentError::Protocol(acp_protocol::ProtocolError::InvalidRequest(format!(
            "method not found: {other}"
        )))),
    }
}

/// `session/cancel` is always a notification: cancels the
/// streaming prompt keyed on `requestId` if given, else whichever turn is
/// active for the session, plus every in-flight tool call and pending
/// permission request for that session.
pub async fn handle_cancel_notification(state: &Arc<AgentState>, params: Option<Value>) {
    let Some(params) = params else {
        warn!("session/cancel notification missing params");
        return;
    };
    let Some(session_id) = params.get("sessionId").and_then(Value::as_str) else {
        warn!("session/cancel notification missing sessionId");
        return;
    };
    let request_id_filter: Option<RpcId> = params
        .get("requestId")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());

    let mut active = state.active_prompts.lock().await;
    if let Some(entry) = active.get(session_id) {
        let matches = request_id_filter
            .as_ref()
            .map(|rid| *rid == entry.request_id)
            .unwrap_or(true);
        if matches {
            entry.cancel.cancel();
        }
    }
    drop(active);

    let cancelled = state.tool_calls.cancel_session_tool_calls(session_id).await;
    for call in cancelled {
        state
            .sink
            .send(notification(
                "session/update",
                json!({
                    "sessionId": session_id,
                    "update": {
                        "sessionUpdate": "tool_call_update",
                        "toolCallId": call.tool_call_id,
                        "title": call.title,
                        "status": call.status,
                    },
                    "_meta": {"notificationSequence": state.tool_calls.next_sequence(session_id).await},
                }),
            ))
            .await;
    }
    info!(session_id, "session cancelled");
}

async fn handle_initialize(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.unwrap_or(Value::Null);
    let requested_version = params
        .get("protocolVersion")
        .and_then(Value::as_i64)
        .ok_or_else(|| AgentError::InvalidParams("protocolVersion is required".to_string()))?;
    if requested_version == 0 {
        return Err(AgentError::InvalidParams("protocolVersion must not be 0".to_string()));
    }
    let negotiated = requested_version.min(SUPPORTED_PROTOCOL_VERSION).max(1);

    if let Some(caps) = params.get("clientCapabilities") {
        *state.client_capabilities.lock().await = Some(caps.clone());
    }
    *state.negotiated_version.lock().await = Some(negotiated);

    let version = state.bridge.get_version().await;
    let auth = state.bridge.check_authentication().await;

    let mut meta = json!({
        "negotiation": {"requested": requested_version, "negotiated": negotiated},
        "extensions": state.extensions.digest().await,
    });

    let mut cli_diagnostics = json!({});
    let mut guidance: Vec<Value> = Vec::new();
    match &version {
        Ok(v) => cli_diagnostics["version"] = json!(v),
        Err(error) => guidance.push(json!({
            "issue": "backend CLI missing or unreachable",
            "resolution": format!("install/configure cursor-agent: {error}"),
        })),
    }
    match &auth {
        Ok(status) => cli_diagnostics["authenticated"] = json!(status.authenticated),
        Err(error) => guidance.push(json!({
            "issue": "backend CLI authentication check failed",
            "resolution": format!("run `cursor-agent login`: {error}"),
        })),
    }
    meta["cursorCli"] = cli_diagnostics;
    if !guidance.is_empty() {
        meta["cursorCliGuidance"] = json!(guidance);
    }

    let backend_available = version.is_ok();

    Ok(json!({
        "protocolVersion": negotiated,
        "agentCapabilities": {
            "loadSession": true,
            "promptCapabilities": {
                "image": backend_available,
                "embeddedContext": backend_available,
            },
            "sessionCapabilities": {
                "_meta": {
                    "supportsSessionModes": true,
                    "supportsSetMode": true,
                    "supportsSetModel": true,
                }
            },
        },
        "_meta": meta,
    }))
}

fn is_absolute_path(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && (bytes[2] == b'\\' || bytes[2] == b'/')
}

async fn handle_session_new(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.unwrap_or(Value::Null);
    let cwd = params
        .get("cwd")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("cwd is required".to_string()))?;
    if cwd.is_empty() || !is_absolute_path(cwd) {
        return Err(AgentError::Internal(format!(
            "cwd must be an absolute path: {cwd:?}"
        )));
    }
    if !matches!(params.get("mcpServers"), Some(Value::Array(_))) {
        return Err(AgentError::InvalidParams("mcpServers must be a non-null array".to_string()));
    }

    let session = state.sessions.create(cwd).await?;
    state.tool_calls.next_sequence(&session.id).await;

    Ok(json!({
        "sessionId": session.id,
        "modes": {
            "current": session.state.current_mode,
            "available": state.sessions.available_modes(),
        },
        "models": {
            "current": session.state.current_model,
            "available": state.sessions.available_models(),
        },
        "_meta": {
            "createdAt": session.created_at,
        },
    }))
}

async fn handle_session_load(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.ok_or_else(|| AgentError::InvalidParams("params required".to_string()))?;
    let session_id = params
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("sessionId is required".to_string()))?;
    let session = state.sessions.get(session_id).await?;

    for message in &session.conversation {
        let kind = match message.role {
            Role::User => "user_message_chunk",
            _ => "agent_message_chunk",
        };
        for block in &message.content {
            state.sink.send(notification(
                "session/update",
                json!({
                    "sessionId": session.id,
                    "update": {"sessionUpdate": kind, "content": block},
                }),
            )).await;
        }
    }

    Ok(json!({"session": session}))
}

async fn handle_session_list(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let filter = params
        .map(|p| SessionListFilter {
            name: p.get("name").and_then(Value::as_str).map(str::to_string),
            tags: p
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
        })
        .unwrap_or_default();

    let sessions = state.sessions.list(&filter).await;
    Ok(json!({"sessions": sessions}))
}

async fn handle_session_delete(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let session_id = required_session_id(&params)?;
    state.sessions.delete(session_id).await?;
    Ok(json!({"deleted": true}))
}

async fn handle_session_set_mode(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.ok_or_else(|| AgentError::InvalidParams("params required".to_string()))?;
    let session_id = params
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("sessionId is required".to_string()))?;
    let mode_id = params
        .get("modeId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("modeId is required".to_string()))?;
    let previous = state.sessions.get(session_id).await?.state.current_mode;
    state.sessions.set_mode(session_id, mode_id).await?;
    Ok(json!({"previous": previous, "current": mode_id}))
}

async fn handle_session_set_model(state: &Arc<AgentState>, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.ok_or_else(|| AgentError::InvalidParams("params required".to_string()))?;
    let session_id = params
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("sessionId is required".to_string()))?;
    let model_id = params
        .get("modelId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("modelId is required".to_string()))?;
    let previous = state.sessions.get(session_id).await?.state.current_model;
    state.sessions.set_model(session_id, model_id).await?;
    Ok(json!({"previous": previous, "current": model_id}))
}

fn required_session_id(params: &Option<Value>) -> Result<&str, AgentError> {
    params
        .as_ref()
        .and_then(|p| p.get("sessionId"))
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("sessionId is required".to_string()))
}

/// `session/request_permission`: the client asks the agent to choose on
/// its behalf, so this runs the heuristic synchronously rather than
/// registering a pending entry.
async fn handle_request_permission(params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.ok_or_else(|| AgentError::InvalidParams("params required".to_string()))?;
    let tool_name = params
        .get("toolName")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("toolName is required".to_string()))?;
    let raw_options = params
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::InvalidParams("options is required".to_string()))?;

    let mut options = Vec::with_capacity(raw_options.len());
    for raw in raw_options {
        // Deserialization itself is the validation: an unrecognized `kind`
        // string fails to parse as `PermissionOptionKind`.
        let option: PermissionOption = serde_json::from_value(raw.clone()).map_err(|_| {
            AgentError::InvalidParams(format!("option has an unrecognized kind: {raw}"))
        })?;
        options.push(option);
    }

    let outcome = PermissionHandler::decide_synchronously(tool_name, &options);
    Ok(json!({"optionId": outcome.option_id, "kind": outcome.kind}))
}

async fn handle_tools_list(state: &Arc<AgentState>) -> Result<Value, AgentError> {
    Ok(json!({
        "tools": {
            "filesystem": {
                "enabled": state.config.tools.filesystem.enabled,
                "methods": ["fs/read_text_file", "fs/write_text_file"],
            },
            "terminal": {
                "enabled": state.config.tools.terminal.enabled,
                "methods": [
                    "terminal/create", "terminal/output", "terminal/wait_for_exit",
                    "terminal/kill", "terminal/release",
                ],
            },
        }
    }))
}
