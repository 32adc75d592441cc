/// Extracts a `\d+\.\d+\.\d+` run from `cursor-agent --version` stdout,
/// falling back to the raw trimmed text, then `"unknown"`.
pub fn parse_version(stdout: &str) -> String {
    let trimmed = stdout.trim();
    if let Some(semver) = find_semver(trimmed) {
        return semver;
    }
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    "unknown".to_string()
}

fn find_semver(text: &str) -> Option<String> {
    let bytes: Vec<char> = text.chars().collect();
    let is_digit = |c: char| c.is_ascii_digit();

    for start in 0..bytes.len() {
        if !is_digit(bytes[start]) {
            continue;
        }
        let mut i = start;
        let mut parts = 0;
        let mut end = start;
        loop {
            let run_start = i;
            while i < bytes.len() && is_digit(bytes[i]) {
                i += 1;
            }
            if i == run_start {
                break;
            }
            parts += 1;
            end = i;
            if parts == 3 {
                break;
            }
            if i < bytes.len() && bytes[i] == '.' {
                i += 1;
            } else {
                break;
            }
        }
        if parts == 3 {
            return Some(bytes[start..end].iter().collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_semver_from_surrounding_text() {
        assert_eq!(parse_version("cursor-agent 1.2.3 (build abc)"), "1.2.3");
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(parse_version("  dev-build  "), "dev-build");
    }

    #[test]
    fn falls_back_to_unknown_when_empty() {
        assert_eq!(parse_version("   "), "unknown");
    }
}
