use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

const POST_TERMINAL_PURGE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ToolCallStatus::Completed | ToolCallStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub tool_call_id: String,
    pub session_id: String,
    pub title: String,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
}

/// Per-session monotonic counter backing `_meta.notificationSequence`:
/// strictly increasing so a client can detect drops or reordering on the
/// wire.
#[derive(Default)]
struct SessionSequence(AtomicU64);

impl SessionSequence {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Tracks in-flight and recently-terminal tool calls per session, and
/// hands out a monotonically increasing notification sequence per
/// session so update notifications can be ordered on the wire.
pub struct ToolCallLedger {
    calls: RwLock<HashMap<String, ToolCallInfo>>,
    sequences: RwLock<HashMap<String, Arc<SessionSequence>>>,
}

impl Default for ToolCallLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallLedger {
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            sequences: RwLock::new(HashMap::new()),
        }
    }

    pub async fn next_sequence(&self, session_id: &str) -> u64 {
        let existing = {
            let sequences = self.sequences.read().await;
            sequences.get(session_id).cloned()
        };
        let sequence = match existing {
            Some(sequence) => sequence,
            None => {
                let mut sequences = self.sequences.write().await;
                sequences
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(SessionSequence::default()))
                    .clone()
            }
        };
        sequence.next()
    }

    pub async fn report(&self, info: ToolCallInfo) {
        let mut calls = self.calls.write().await;
        calls.insert(info.tool_call_id.clone(), info);
    }

    pub async fn update(
        &self,
        tool_call_id: &str,
        status: Option<ToolCallStatus>,
        content: Option<Value>,
    ) -> Option<ToolCallInfo> {
        let mut calls = self.calls.write().await;
        let entry = calls.get_mut(tool_call_id)?;
        if let Some(status) = status {
            entry.status = status;
        }
        if content.is_some() {
            entry.content = content;
        }
        Some(entry.clone())
    }

    pub async fn complete(
        self: &Arc<Self>,
        tool_call_id: &str,
        raw_output: Option<Value>,
    ) -> Option<ToolCallInfo> {
        let updated = {
            let mut calls = self.calls.write().await;
            let entry = calls.get_mut(tool_call_id)?;
            entry.status = ToolCallStatus::Completed;
            entry.raw_output = raw_output;
            entry.clone()
        };
        self.schedule_purge(tool_call_id.to_string());
        Some(updated)
    }

    pub async fn fail(
        self: &Arc<Self>,
        tool_call_id: &str,
        raw_output: Option<Value>,
    ) -> Option<ToolCallInfo> {
        let updated = {
            let mut calls = self.calls.write().await;
            let entry = calls.get_mut(tool_call_id)?;
            entry.status = ToolCallStatus::Failed;
            entry.raw_output = raw_output;
            entry.clone()
        };
        self.schedule_purge(tool_call_id.to_string());
        Some(updated)
    }

    fn schedule_purge(self: &Arc<Self>, tool_call_id: String) {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(POST_TERMINAL_PURGE_DELAY).await;
            let mut calls = ledger.calls.write().await;
            if let Some(entry) = calls.get(&tool_call_id) {
                if entry.status.is_terminal() {
                    calls.remove(&tool_call_id);
                }
            }
        });
    }

    /// Transitions every non-terminal tool call belonging to a session to
    /// `failed` with title `"Cancelled by user"`, e.g. when its prompt
    /// turn is cancelled. Returns the updated records so the caller can
    /// emit `tool_call_update` notifications for them; no purge timer is
    /// scheduled since the session is already torn down.
    pub async fn cancel_session_tool_calls(&self, session_id: &str) -> Vec<ToolCallInfo> {
        let mut calls = self.calls.write().await;
        let mut cancelled = Vec::new();
        for call in calls.values_mut() {
            if call.session_id == session_id && !call.status.is_terminal() {
                call.status = ToolCallStatus::Failed;
                call.title = "Cancelled by user".to_string();
                cancelled.push(call.clone());
            }
        }
        cancelled
    }

    pub async fn get(&self, tool_call_id: &str) -> Option<ToolCallInfo> {
        self.calls.read().await.get(tool_call_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, session: &str) -> ToolCallInfo {
        ToolCallInfo {
            tool_call_id: id.to_string(),
            session_id: session.to_string(),
            title: "read file".to_string(),
            status: ToolCallStatus::Pending,
            content: None,
            raw_input: None,
            raw_output: None,
        }
    }

    #[tokio::test]
    async fn sequence_is_monotonic_per_session() {
        let ledger = Arc::new(ToolCallLedger::new());
        let a = ledger.next_sequence("s1").await;
        let b = ledger.next_sequence("s1").await;
        let c = ledger.next_sequence("s2").await;
        assert!(b > a);
        assert_eq!(c, 0);
    }

    #[tokio::test]
    async fn complete_transitions_status_and_cancel_only_touches_non_terminal() {
        let ledger = Arc::new(ToolCallLedger::new());
        ledger.report(sample("tc1", "s1")).await;
        ledger.report(sample("tc2", "s1")).await;
        ledger.complete("tc1", Some(serde_json::json!({"ok": true}))).await;

        let cancelled = ledger.cancel_session_tool_calls("s1").await;
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].tool_call_id, "tc2");
        assert_eq!(cancelled[0].title, "Cancelled by user");
        assert_eq!(ledger.get("tc1").await.unwrap().status, ToolCallStatus::Completed);
        assert_eq!(ledger.get("tc2").await.unwrap().status, ToolCallStatus::Failed);
    }
}
