use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Either side of a JSON-RPC id: editors commonly send numbers, we mint
/// strings for reverse-RPC calls we issue ourselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcId::Number(n) => write!(f, "{n}"),
            RpcId::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A fully decoded, classified inbound line. One JSON value maps to exactly
/// one variant: `method` + `id` is a request, `method` alone is a
/// notification, `id` alone is a reply keyed into the reverse-RPC table.
#[derive(Debug, Clone)]
pub enum Inbound {
    Request {
        id: RpcId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Reply {
        id: RpcId,
        result: Option<Value>,
        error: Option<RpcErrorObject>,
    },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<RpcId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Classifies one decoded JSON value. Lines whose shape matches none of
/// request/notification/reply are rejected with
/// `INVALID_REQUEST` and should be logged, not answered (notifications and
/// unrecognized shapes never receive a reply).
pub fn classify(value: Value) -> Result<Inbound, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_value(value)?;

    if let Some(version) = raw.jsonrpc.as_deref() {
        if version != "2.0" {
            return Err(ProtocolError::InvalidRequest(format!(
                "unsupported jsonrpc version {version:?}"
            )));
        }
    }

    match (raw.id, raw.method) {
        (Some(id), Some(method)) => {
            if method.is_empty() {
                return Err(ProtocolError::InvalidRequest("empty method".to_string()));
            }
            Ok(Inbound::Request {
                id,
                method,
                params: raw.params,
            })
        }
        (None, Some(method)) => {
            if method.is_empty() {
                return Err(ProtocolError::InvalidRequest("empty method".to_string()));
            }
            Ok(Inbound::Notification {
                method,
                params: raw.params,
            })
        }
        (Some(id), None) => Ok(Inbound::Reply {
            id,
            result: raw.result,
            error: raw.error,
        }),
        (None, None) => Err(ProtocolError::InvalidRequest(
            "envelope has neither id nor method".to_string(),
        )),
    }
}

/// Builds the outbound success response line for a request.
pub fn response_ok(id: RpcId, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Builds the outbound error response line for a request.
pub fn response_err(id: RpcId, code: i64, message: impl Into<String>, data: Option<Value>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
            "data": data,
        },
    })
}

/// Builds an outbound notification line (no `id`, never answered).
pub fn notification(method: impl Into<String>, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method.into(),
        "params": params,
    })
}

/// Builds an outbound agent→client request line.
pub fn outbound_request(id: RpcId, method: impl Into<String>, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method.into(),
        "params": params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_request_notification_and_reply() {
        let req = classify(serde_json::json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}})).unwrap();
        assert!(matches!(req, Inbound::Request { .. }));

        let note = classify(serde_json::json!({"jsonrpc":"2.0","method":"session/cancel","params":{}})).unwrap();
        assert!(matches!(note, Inbound::Notification { .. }));

        let reply = classify(serde_json::json!({"jsonrpc":"2.0","id":"client_1","result":{}})).unwrap();
        assert!(matches!(reply, Inbound::Reply { .. }));
    }

    #[test]
    fn rejects_envelope_with_neither_id_nor_method() {
        let err = classify(serde_json::json!({"jsonrpc":"2.0"})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }

    #[test]
    fn rejects_empty_method() {
        let err = classify(serde_json::json!({"jsonrpc":"2.0","id":1,"method":""})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidRequest(_)));
    }
}
