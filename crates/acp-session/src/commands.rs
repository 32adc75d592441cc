use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommandInfo {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<String>,
}

/// Tracks the set of slash commands currently advertised to clients and
/// publishes change events so the dispatcher can emit
/// `session/update` notifications of kind `available_commands_update`.
pub struct SlashCommandRegistry {
    commands: RwLock<HashMap<String, SlashCommandInfo>>,
    tx: watch::Sender<Vec<SlashCommandInfo>>,
}

impl Default for SlashCommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SlashCommandRegistry {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            commands: RwLock::new(HashMap::new()),
            tx,
        }
    }

    pub async fn register(&self, command: SlashCommandInfo) {
        let mut commands = self.commands.write().await;
        commands.insert(command.name.clone(), command);
        self.publish(&commands);
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut commands = self.commands.write().await;
        let removed = commands.remove(name).is_some();
        if removed {
            self.publish(&commands);
        }
        removed
    }

    pub async fn list(&self) -> Vec<SlashCommandInfo> {
        let commands = self.commands.read().await;
        let mut list: Vec<_> = commands.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Subscribes to command-set changes; the receiver's initial value is
    /// whatever the set looked like when `subscribe` was called.
    pub fn subscribe(&self) -> watch::Receiver<Vec<SlashCommandInfo>> {
        self.tx.subscribe()
    }

    fn publish(&self, commands: &HashMap<String, SlashCommandInfo>) {
        let mut list: Vec<_> = commands.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        let _ = self.tx.send(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_observe_registrations_and_removals() {
        let registry = SlashCommandRegistry::new();
        let mut rx = registry.subscribe();

        registry
            .register(SlashCommandInfo {
                name: "review".to_string(),
                description: "run a code review".to_string(),
                input_hint: None,
            })
            .await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        registry.unregister("review").await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let registry = SlashCommandRegistry::new();
        registry
            .register(SlashCommandInfo {
                name: "zeta".to_string(),
                description: "z".to_string(),
                input_hint: None,
            })
            .await;
        registry
            .register(SlashCommandInfo {
                name: "alpha".to_string(),
                description: "a".to_string(),
                input_hint: None,
            })
            .await;
        let names: Vec<_> = registry.list().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
