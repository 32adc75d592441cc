use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::AgentError;

pub type ExtensionHandler =
    Arc<dyn Fn(Option<Value>) -> Result<Value, AgentError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionKind {
    Method,
    Notification,
}

struct Registration {
    kind: ExtensionKind,
    handler: ExtensionHandler,
}

/// Routes methods/notifications whose name begins with the extension
/// sigil `_` to registered handlers, and reports a capability digest for
/// `initialize`. Unregistered `_`-prefixed names yield method-not-found
/// same as any other unknown method.
#[derive(Default)]
pub struct ExtensionRegistry {
    handlers: RwLock<HashMap<String, Registration>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, name: impl Into<String>, kind: ExtensionKind, handler: ExtensionHandler) {
        let name = name.into();
        debug_assert!(name.starts_with('_'), "extension names must begin with '_'");
        let mut handlers = self.handlers.write().await;
        handlers.insert(name, Registration { kind, handler });
    }

    pub async fn dispatch(&self, name: &str, params: Option<Value>) -> Option<Result<Value, AgentError>> {
        let handlers = self.handlers.read().await;
        let registration = handlers.get(name)?;
        Some((registration.handler)(params))
    }

    /// Per-namespace capability summary for `initialize`'s `_meta` block:
    /// the sigil-stripped first path segment, and whether it carries
    /// request-style or notification-style members.
    pub async fn digest(&self) -> HashMap<String, Vec<String>> {
        let handlers = self.handlers.read().await;
        let mut digest: HashMap<String, Vec<String>> = HashMap::new();
        for (name, registration) in handlers.iter() {
            let namespace = name
                .trim_start_matches('_')
                .split('/')
                .next()
                .unwrap_or("")
                .to_string();
            let label = match registration.kind {
                ExtensionKind::Method => name.clone(),
                ExtensionKind::Notification => format!("{name} (notification)"),
            };
            digest.entry(namespace).or_default().push(label);
        }
        for values in digest.values_mut() {
            values.sort();
        }
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatches_registered_extension_method() {
        let registry = ExtensionRegistry::new();
        registry
            .register(
                "_vendor/ping",
                ExtensionKind::Method,
                Arc::new(|_params| Ok(serde_json::json!({"pong": true}))),
            )
            .await;

        let result = registry.dispatch("_vendor/ping", None).await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!({"pong": true}));
    }

    #[tokio::test]
    async fn unregistered_extension_name_yields_none() {
        let registry = ExtensionRegistry::new();
        assert!(registry.dispatch("_vendor/unknown", None).await.is_none());
    }

    #[tokio::test]
    async fn digest_groups_by_namespace() {
        let registry = ExtensionRegistry::new();
        registry
            .register("_vendor/ping", ExtensionKind::Method, Arc::new(|_| Ok(Value::Null)))
            .await;
        registry
            .register(
                "_vendor/notify",
                ExtensionKind::Notification,
                Arc::new(|_| Ok(Value::Null)),
            )
            .await;

        let digest = registry.digest().await;
        assert_eq!(digest["vendor"].len(), 2);
    }
}
