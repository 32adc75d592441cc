use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata blob: an untyped `map<string,any>` that stays a
/// dynamic value rather than being forced into a closed schema, since the
/// wire contract requires pass-through.
pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Discriminated union over ACP content block kinds. Fields irrelevant to
/// a given variant are simply absent — `#[serde(flatten)]`
/// on an inner struct would force every variant to carry every field, so
/// each variant only declares what it actually uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    ResourceLink {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Flattens this block into prompt text: text blocks pass through
    /// verbatim, everything else renders as an annotated placeholder.
    pub fn flatten_for_prompt(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { mime_type, .. } => format!("[image attachment: {mime_type}]"),
            ContentBlock::Audio { mime_type, .. } => format!("[audio attachment: {mime_type}]"),
            ContentBlock::Resource { uri, .. } => format!("[resource: {uri}]"),
            ContentBlock::ResourceLink { uri, name, .. } => match name {
                Some(name) => format!("[resource link: {name} ({uri})]"),
                None => format!("[resource link: {uri}]"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Expired,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    pub status: SessionStatus,
    pub current_mode: String,
    pub current_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub conversation: Vec<Message>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(cwd: &str, default_mode: &str, default_model: &str) -> Self {
        let now = Utc::now();
        let mut metadata = Metadata::new();
        metadata.insert("cwd".to_string(), Value::String(cwd.to_string()));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata,
            conversation: Vec::new(),
            state: SessionState {
                last_activity: now,
                message_count: 0,
                token_count: None,
                status: SessionStatus::Active,
                current_mode: default_mode.to_string(),
                current_model: default_model.to_string(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.conversation.push(message);
        self.state.message_count = self.conversation.len();
        self.state.last_activity = Utc::now();
        self.updated_at = self.state.last_activity;
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

impl ModelInfo {
    pub fn auto() -> Self {
        Self {
            id: "auto".to_string(),
            name: "Auto".to_string(),
            provider: "cursor".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionListFilter {
    pub name: Option<String>,
    pub tags: Vec<String>,
}

impl SessionListFilter {
    /// `name` is a case-insensitive substring over `metadata.name`; `tags`
    /// matches case-insensitive equality against any element of
    /// `metadata.tags`.
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(name_filter) = &self.name {
            let needle = name_filter.to_lowercase();
            let matched = session
                .name()
                .map(|n| n.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let tags = session.tags();
            let matched = self.tags.iter().any(|wanted| {
                tags.iter()
                    .any(|t| t.eq_ignore_ascii_case(wanted))
            });
            if !matched {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_non_text_blocks_as_placeholders() {
        let block = ContentBlock::Image {
            data: "base64".into(),
            mime_type: "image/png".into(),
        };
        assert_eq!(block.flatten_for_prompt(), "[image attachment: image/png]");
    }

    #[test]
    fn filter_matches_case_insensitive_name_substring() {
        let mut session = Session::new("/tmp", "ask", "auto");
        session
            .metadata
            .insert("name".to_string(), Value::String("My Session".to_string()));
        let filter = SessionListFilter {
            name: Some("session".to_string()),
            tags: vec![],
        };
        assert!(filter.matches(&session));
    }

    #[test]
    fn filter_matches_tag_case_insensitively() {
        let mut session = Session::new("/tmp", "ask", "auto");
        session.metadata.insert(
            "tags".to_string(),
            Value::Array(vec![Value::String("Backend".to_string())]),
        );
        let filter = SessionListFilter {
            name: None,
            tags: vec!["backend".to_string()],
        };
        assert!(filter.matches(&session));
    }
}
