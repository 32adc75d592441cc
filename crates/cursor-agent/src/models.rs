use serde::{Deserialize, Serialize};

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

/// Infers a provider from substring tokens of a model id.
pub fn infer_provider(id: &str) -> &'static str {
    let lowered = id.to_lowercase();
    if lowered.contains("gpt") || lowered.contains("codex") {
        "openai"
    } else if lowered.contains("opus") || lowered.contains("sonnet") || lowered.contains("claude") {
        "anthropic"
    } else if lowered.contains("gemini") {
        "google"
    } else if lowered.contains("grok") {
        "xai"
    } else if lowered.contains("auto") || lowered.contains("composer") {
        "cursor"
    } else {
        "unknown"
    }
}

/// Parses the `models` subcommand's `"id - Name"` lines, starting after an
/// "Available models" heading and stopping at the next blank line. Always
/// guarantees an `auto` entry at the head.
pub fn parse_models(stdout: &str) -> Vec<ModelInfo> {
    let mut models = Vec::new();
    let mut in_section = false;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if !in_section {
            if trimmed.to_lowercase().contains("available models") {
                in_section = true;
            }
            continue;
        }
        if trimmed.is_empty() {
            break;
        }
        if let Some((id, name)) = trimmed.split_once(" - ") {
            let id = id.trim().to_string();
            let name = name.trim().to_string();
            if id.is_empty() {
                continue;
            }
            let provider = infer_provider(&id).to_string();
            models.push(ModelInfo { id, name, provider });
        }
    }

    if !models.iter().any(|m| m.id == "auto") {
        models.insert(0, ModelInfo::auto());
    } else {
        let pos = models.iter().position(|m| m.id == "auto").unwrap();
        let auto = models.remove(pos);
        models.insert(0, auto);
    }

    models
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Some preamble\n\nAvailable models:\nauto - Auto\ngpt-5-codex - GPT-5 Codex\nclaude-opus-4.1 - Claude Opus 4.1\ngemini-2.5-pro - Gemini 2.5 Pro\n\nTrailing text ignored\n";

    #[test]
    fn parses_models_and_infers_provider() {
        let models = parse_models(SAMPLE);
        assert_eq!(models[0].id, "auto");
        assert!(models.iter().any(|m| m.id == "gpt-5-codex" && m.provider == "openai"));
        assert!(models.iter().any(|m| m.id == "claude-opus-4.1" && m.provider == "anthropic"));
        assert!(models.iter().any(|m| m.id == "gemini-2.5-pro" && m.provider == "google"));
    }

    #[test]
    fn guarantees_auto_entry_even_when_absent() {
        let stdout = "Available models:\nopus - Opus\n\n";
        let models = parse_models(stdout);
        assert_eq!(models[0].id, "auto");
        assert_eq!(models[0].provider, "cursor");
    }

    #[test]
    fn idempotent_on_its_own_canonical_printout() {
        let first = parse_models(SAMPLE);
        let printout = format!(
            "Available models:\n{}\n",
            first
                .iter()
                .map(|m| format!("{} - {}", m.id, m.name))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let second = parse_models(&printout);
        assert_eq!(first, second);
    }
}
