use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, RwLock};
use tracing::warn;

const PERMISSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    pub option_id: String,
    pub name: String,
    pub kind: PermissionOptionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOptionKind {
    AllowOnce,
    AllowAlways,
    RejectOnce,
    RejectAlways,
}

#[derive(Debug, Clone)]
pub struct PendingPermission {
    pub request_id: String,
    pub session_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub options: Vec<PermissionOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOutcome {
    pub option_id: String,
    pub kind: PermissionOptionKind,
}

struct Pending {
    waiter: oneshot::Sender<PermissionOutcome>,
}

/// Arbitrates tool-call permission requests raised mid-prompt.
///
/// A request either resolves from an explicit client reply or expires
/// after [`PERMISSION_TIMEOUT`] and falls back to a flat reject-once
/// rather than hanging indefinitely.
pub struct PermissionHandler {
    pending: RwLock<HashMap<String, Pending>>,
}

impl Default for PermissionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionHandler {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a pending request and returns a future that resolves to
    /// the client's reply, or a flat reject-once if the timeout fires
    /// first.
    pub async fn request(&self, pending: PendingPermission) -> PermissionOutcome {
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.pending.write().await;
            table.insert(pending.request_id.clone(), Pending { waiter: tx });
        }

        let fallback = Self::flat_reject_once(&pending.options);
        let outcome = match tokio::time::timeout(PERMISSION_TIMEOUT, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => fallback.clone(),
            Err(_) => {
                warn!(
                    request_id = %pending.request_id,
                    tool_name = %pending.tool_name,
                    "permission request timed out, defaulting to reject-once"
                );
                fallback.clone()
            }
        };

        let mut table = self.pending.write().await;
        table.remove(&pending.request_id);
        outcome
    }

    /// Resolves a previously registered request with the client's chosen
    /// option. Returns `false` if the option id is unknown or the
    /// request already resolved (timed out or was answered).
    pub async fn resolve(
        &self,
        request_id: &str,
        pending: &PendingPermission,
        option_id: &str,
    ) -> bool {
        let Some(option) = pending.options.iter().find(|o| o.option_id == option_id) else {
            warn!(request_id, option_id, "unknown permission option id");
            return false;
        };
        let mut table = self.pending.write().await;
        let Some(entry) = table.remove(request_id) else {
            return false;
        };
        let _ = entry.waiter.send(PermissionOutcome {
            option_id: option.option_id.clone(),
            kind: option.kind,
        });
        true
    }

    /// Flat fallback used when an async request times out or its channel
    /// drops without an answer: always reject-once, independent of tool
    /// kind, since nothing actually decided the request.
    fn flat_reject_once(options: &[PermissionOption]) -> PermissionOutcome {
        options
            .iter()
            .find(|o| o.kind == PermissionOptionKind::RejectOnce)
            .map(|o| PermissionOutcome {
                option_id: o.option_id.clone(),
                kind: o.kind,
            })
            .unwrap_or(PermissionOutcome {
                option_id: "reject_once".to_string(),
                kind: PermissionOptionKind::RejectOnce,
            })
    }

    /// Tool-kind heuristic usable directly by a synchronous
    /// `session/request_permission` handler without going through the
    /// async register/timeout machinery `request()` uses for
    /// agent-initiated reverse-RPC permission prompts.
    pub fn decide_synchronously(tool_name: &str, options: &[PermissionOption]) -> PermissionOutcome {
        let name = tool_name.to_lowercase();
        let is_benign = ["read", "search", "think", "fetch", "list", "grep"]
            .iter()
            .any(|k| name.contains(k));
        let is_risky = ["edit", "delete", "write", "execute", "move", "remove"]
            .iter()
            .any(|k| name.contains(k));

        let wanted_kind = if is_benign && !is_risky {
            PermissionOptionKind::AllowOnce
        } else if is_risky {
            PermissionOptionKind::RejectOnce
        } else {
            return options
                .first()
                .map(|o| PermissionOutcome {
                    option_id: o.option_id.clone(),
                    kind: o.kind,
                })
                .unwrap_or(PermissionOutcome {
                    option_id: "reject_once".to_string(),
                    kind: PermissionOptionKind::RejectOnce,
                });
        };

        options
            .iter()
            .find(|o| o.kind == wanted_kind)
            .or_else(|| options.first())
            .map(|o| PermissionOutcome {
                option_id: o.option_id.clone(),
                kind: o.kind,
            })
            .unwrap_or(PermissionOutcome {
                option_id: "reject_once".to_string(),
                kind: PermissionOptionKind::RejectOnce,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<PermissionOption> {
        vec![
            PermissionOption {
                option_id: "allow".to_string(),
                name: "Allow".to_string(),
                kind: PermissionOptionKind::AllowOnce,
            },
            PermissionOption {
                option_id: "reject".to_string(),
                name: "Reject".to_string(),
                kind: PermissionOptionKind::RejectOnce,
            },
        ]
    }

    #[test]
    fn synchronous_heuristic_defaults_to_allow_for_read_tools() {
        let outcome = PermissionHandler::decide_synchronously("read_file", &options());
        assert_eq!(outcome.kind, PermissionOptionKind::AllowOnce);
    }

    #[test]
    fn synchronous_heuristic_defaults_to_reject_for_destructive_tools() {
        let outcome = PermissionHandler::decide_synchronously("delete_file", &options());
        assert_eq!(outcome.kind, PermissionOptionKind::RejectOnce);
    }

    #[test]
    fn async_fallback_is_flat_reject_once_regardless_of_tool_kind() {
        let outcome = PermissionHandler::flat_reject_once(&options());
        assert_eq!(outcome.kind, PermissionOptionKind::RejectOnce);

        let allow_only = vec![options()[0].clone()];
        let outcome = PermissionHandler::flat_reject_once(&allow_only);
        assert_eq!(outcome.option_id, "reject_once");
        assert_eq!(outcome.kind, PermissionOptionKind::RejectOnce);
    }

    #[tokio::test]
    async fn explicit_resolve_wins_over_timeout() {
        let handler = PermissionHandler::new();
        let pending = PendingPermission {
            request_id: "r4".to_string(),
            session_id: "s1".to_string(),
            tool_call_id: "tc4".to_string(),
            tool_name: "edit_file".to_string(),
            options: options(),
        };
        let pending_for_request = pending.clone();
        let request_future = handler.request(pending_for_request);
        tokio::pin!(request_future);

        // Give the request() call a chance to register before resolving.
        tokio::task::yield_now().await;
        let resolved = handler.resolve("r4", &pending, "allow").await;
        assert!(resolved);

        let outcome = request_future.await;
        assert_eq!(outcome.option_id, "allow");
    }
}
