/// Arguments for a streaming `session/prompt` turn, built into the argv
/// `cursor-agent` expects.
#[derive(Debug, Clone, Default)]
pub struct StreamingPromptRequest {
    pub content: String,
    pub model: Option<String>,
    pub resume_chat_id: Option<String>,
}

impl StreamingPromptRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            resume_chat_id: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn resume(mut self, chat_id: impl Into<String>) -> Self {
        self.resume_chat_id = Some(chat_id.into());
        self
    }

    /// `[--model M?, --resume CHATID?, agent, --print, --output-format
    /// stream-json, --stream-partial-output, --force, CONTENT]`.
    pub fn argv(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(model) = &self.model {
            out.push("--model".to_string());
            out.push(model.clone());
        }
        if let Some(chat_id) = &self.resume_chat_id {
            out.push("--resume".to_string());
            out.push(chat_id.clone());
        }
        out.push("agent".to_string());
        out.push("--print".to_string());
        out.push("--output-format".to_string());
        out.push("stream-json".to_string());
        out.push("--stream-partial-output".to_string());
        out.push("--force".to_string());
        out.push(self.content.clone());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_orders_flags_before_content() {
        let req = StreamingPromptRequest::new("hello").model("auto").resume("chat-1");
        assert_eq!(
            req.argv(),
            vec![
                "--model", "auto", "--resume", "chat-1", "agent", "--print",
                "--output-format", "stream-json", "--stream-partial-output", "--force", "hello",
            ]
        );
    }

    #[test]
    fn omits_optional_flags_when_absent() {
        let req = StreamingPromptRequest::new("hi");
        assert_eq!(
            req.argv(),
            vec![
                "agent", "--print", "--output-format", "stream-json",
                "--stream-partial-output", "--force", "hi",
            ]
        );
    }
}
