use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::time;

use crate::envelope::{RpcErrorObject, RpcId};
use crate::error::ProtocolError;

/// Default deadline for an agent→client call.
pub const DEFAULT_REVERSE_RPC_DEADLINE: Duration = Duration::from_secs(90);

type Waiter = oneshot::Sender<Result<Value, RpcErrorObject>>;

/// Tracks agent-issued (reverse) RPC calls awaiting a reply on the same
/// stdio channel the client uses to send us requests. One waiter per
/// in-flight id; a reply with no matching waiter (late, or for an id we
/// never issued) is silently dropped.
pub struct ReverseRpcTable {
    pending: Mutex<HashMap<RpcId, Waiter>>,
    next_id: AtomicU64,
}

impl Default for ReverseRpcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseRpcTable {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Mints a new `client_<n>` id and registers a single-shot waiter for
    /// it. The caller is responsible for writing the outbound request frame
    /// carrying this id — the table only tracks replies.
    pub async fn begin_call(&self) -> (RpcId, oneshot::Receiver<Result<Value, RpcErrorObject>>) {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = RpcId::String(format!("client_{n}"));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Feeds an inbound reply line to the matching waiter, if any is still
    /// registered. Called from the stdin-reading task when it classifies a
    /// line as [`crate::envelope::Inbound::Reply`].
    pub async fn resolve(&self, id: &RpcId, result: Option<Value>, error: Option<RpcErrorObject>) {
        let waiter = self.pending.lock().await.remove(id);
        let Some(tx) = waiter else {
            tracing::warn!(%id, "reverse-RPC reply with no matching waiter (late or unknown)");
            return;
        };
        let outcome = match error {
            Some(err) => Err(err),
            None => Ok(result.unwrap_or(Value::Null)),
        };
        // The receiver may already be gone (deadline elapsed); that's fine.
        let _ = tx.send(outcome);
    }

    /// Deregisters a waiter without resolving it, e.g. when a deadline
    /// elapses before any reply arrives.
    pub async fn cancel(&self, id: &RpcId) {
        self.pending.lock().await.remove(id);
    }

    /// Awaits a previously-registered waiter with a deadline, deregistering
    /// it on timeout so a later, late reply is a no-op rather than a leak.
    pub async fn await_reply(
        self: &Arc<Self>,
        id: RpcId,
        rx: oneshot::Receiver<Result<Value, RpcErrorObject>>,
        deadline: Duration,
    ) -> Result<Value, ProtocolError> {
        match time::timeout(deadline, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(ProtocolError::InvalidRequest(err.message)),
            Ok(Err(_)) => Err(ProtocolError::ChannelClosed),
            Err(_) => {
                self.cancel(&id).await;
                Err(ProtocolError::Deadline)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_a_registered_waiter() {
        let table = Arc::new(ReverseRpcTable::new());
        let (id, rx) = table.begin_call().await;
        table
            .resolve(&id, Some(serde_json::json!({"content": "hi"})), None)
            .await;
        let result = table
            .await_reply(id, rx, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"content": "hi"}));
    }

    #[tokio::test]
    async fn times_out_and_drops_a_late_reply_without_panicking() {
        let table = Arc::new(ReverseRpcTable::new());
        let (id, rx) = table.begin_call().await;
        let err = table
            .await_reply(id.clone(), rx, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Deadline));

        // A reply that shows up after the deadline must not panic or block.
        table.resolve(&id, Some(Value::Null), None).await;
    }

    #[tokio::test]
    async fn unknown_reply_id_is_a_noop() {
        let table = ReverseRpcTable::new();
        table
            .resolve(&RpcId::String("never-registered".into()), None, None)
            .await;
    }
}
