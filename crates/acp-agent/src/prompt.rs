use std::sync::Arc;
use std::time::Duration;

use acp_protocol::{notification, RpcId};
use acp_session::{ContentBlock, Message, Role};
use cursor_agent::{ParsedLine, StreamChunk, StreamStatus, StreamingPromptRequest};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::AgentError;
use crate::state::{ActivePrompt, AgentState};

fn parse_content_blocks(params: &Value) -> Result<Vec<ContentBlock>, AgentError> {
    // `prompt` and `content` are both accepted; prefer `content` when
    // both are present.
    if let Some(content) = params.get("content") {
        let blocks: Vec<ContentBlock> =
            serde_json::from_value(content.clone()).map_err(|e| AgentError::InvalidParams(e.to_string()))?;
        return Ok(blocks);
    }
    match params.get("prompt") {
        Some(Value::String(text)) => Ok(vec![ContentBlock::text(text.clone())]),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value.clone()).map_err(|e| AgentError::InvalidParams(e.to_string()))
        }
        _ => Err(AgentError::InvalidParams(
            "either content or prompt is required".to_string(),
        )),
    }
}

fn flatten(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(ContentBlock::flatten_for_prompt)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives one `session/prompt` turn end to end.
pub async fn handle_prompt(state: &Arc<AgentState>, request_id: RpcId, params: Option<Value>) -> Result<Value, AgentError> {
    let params = params.ok_or_else(|| AgentError::InvalidParams("params required".to_string()))?;
    let session_id = params
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParams("sessionId is required".to_string()))?
        .to_string();

    let blocks = parse_content_blocks(&params)?;
    if blocks.is_empty() {
        return Err(AgentError::InvalidParams("content must not be empty".to_string()));
    }

    state.sessions.begin_processing(&session_id).await?;
    let result = run_turn(state, &session_id, &request_id, blocks).await;
    state.sessions.end_processing(&session_id).await;
    state.active_prompts.lock().await.remove(&session_id);
    result
}

async fn run_turn(
    state: &Arc<AgentState>,
    session_id: &str,
    request_id: &RpcId,
    blocks: Vec<ContentBlock>,
) -> Result<Value, AgentError> {
    let session = state.sessions.get(session_id).await?;
    state
        .sessions
        .update(session_id, |s| {
            s.add_message(Message::new(Role::User, blocks.clone()));
            Ok(())
        })
        .await?;

    let cancel = CancellationToken::new();
    state.active_prompts.lock().await.insert(
        session_id.to_string(),
        ActivePrompt {
            request_id: request_id.clone(),
            cancel: cancel.clone(),
        },
    );

    let text = flatten(&blocks);
    let mut request = StreamingPromptRequest::new(text).model(session.state.current_model.clone());
    if let Some(chat_id) = session.metadata.get("cursorChatId").and_then(Value::as_str) {
        request = request.resume(chat_id.to_string());
    }

    let timeout = Duration::from_millis(state.config.cursor.timeout);
    let (mut rx, handle) = state.bridge.send_streaming_prompt(request, Some(timeout), cancel.clone());

    let mut transcript = String::new();
    let mut saw_error = false;
    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Content(parsed) => {
                let text = match &parsed {
                    ParsedLine::Json(value) => cursor_agent::extract_text(value),
                    ParsedLine::Raw(raw) => Some(raw.clone()),
                };
                if let Some(text) = text {
                    transcript.push_str(&text);
                    state
                        .sink
                        .send(notification(
                            "session/update",
                            json!({
                                "sessionId": session_id,
                                "update": {
                                    "sessionUpdate": "agent_message_chunk",
                                    "content": {"type": "text", "text": text},
                                },
                                "_meta": {"notificationSequence": state.tool_calls.next_sequence(session_id).await},
                            }),
                        ))
                        .await;
                }
            }
            StreamChunk::Done => break,
            StreamChunk::Error(message) => {
                warn!(session_id, %message, "streaming prompt reported an error chunk");
                saw_error = true;
                break;
            }
        }
    }

    let status = handle.await.map_err(|e| AgentError::Internal(e.to_string()))?;
    let stop_reason = match status {
        StreamStatus::Completed if saw_error => "error",
        StreamStatus::Completed => "end_turn",
        StreamStatus::Aborted => "cancelled",
        StreamStatus::Error => "error",
    };

    let assistant_blocks = vec![ContentBlock::text(transcript.clone())];
    state
        .sessions
        .update(session_id, |s| {
            s.add_message(Message::new(Role::Assistant, assistant_blocks.clone()));
            Ok(())
        })
        .await?;

    Ok(json!({"stopReason": stop_reason}))
}
