use serde_json::Value;

/// One line of `--output-format stream-json` output, parsed if it was
/// valid JSON and left raw otherwise.
#[derive(Debug, Clone)]
pub enum ParsedLine {
    Json(Value),
    Raw(String),
}

/// Tolerant line-oriented JSON parser: blank lines are skipped, malformed
/// JSON degrades to [`ParsedLine::Raw`] rather than aborting the stream.
#[derive(Debug, Clone, Default)]
pub struct StreamJsonParser;

impl StreamJsonParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_line(&mut self, line: &str) -> Option<ParsedLine> {
        let line = line.trim_end_matches('\r');
        if line.chars().all(char::is_whitespace) {
            return None;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Some(ParsedLine::Json(value)),
            Err(_) => Some(ParsedLine::Raw(line.to_string())),
        }
    }
}

/// Extracts the first non-empty string field among
/// `result | response | content | message` for transcript aggregation.
pub fn extract_text(value: &Value) -> Option<String> {
    for key in ["result", "response", "content", "message"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_tolerant_and_line_oriented() {
        let mut parser = StreamJsonParser::new();
        assert!(parser.parse_line("   ").is_none());
        assert!(matches!(
            parser.parse_line("{\"content\":\"hi\"}"),
            Some(ParsedLine::Json(_))
        ));
        assert!(matches!(
            parser.parse_line("{not-json}"),
            Some(ParsedLine::Raw(_))
        ));
    }

    #[test]
    fn extracts_first_matching_text_field() {
        let v = serde_json::json!({"response": "", "content": "hello"});
        assert_eq!(extract_text(&v).as_deref(), Some("hello"));

        let v = serde_json::json!({"other": "x"});
        assert_eq!(extract_text(&v), None);
    }
}
