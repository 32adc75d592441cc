use crate::process::strip_ansi;

/// Result of probing `cursor-agent status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user: Option<String>,
    pub email: Option<String>,
    pub plan: Option<String>,
}

impl AuthStatus {
    fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            user: None,
            email: None,
            plan: None,
        }
    }
}

/// Parses the human-readable `status` subcommand after stripping ANSI
/// escapes, locating `logged in as`/`signed in as` plus `User:`, `Email:`,
/// `Plan:` labels.
pub fn parse_status(stdout: &str) -> AuthStatus {
    let plain = strip_ansi(stdout);
    let lowered = plain.to_lowercase();

    let authenticated = lowered.contains("logged in as") || lowered.contains("signed in as");
    if !authenticated {
        return AuthStatus::unauthenticated();
    }

    AuthStatus {
        authenticated: true,
        user: extract_label(&plain, "User:"),
        email: extract_label(&plain, "Email:"),
        plan: extract_label(&plain, "Plan:"),
    }
}

fn extract_label(text: &str, label: &str) -> Option<String> {
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(label) {
            let value = rest.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authenticated_status() {
        let stdout = "\u{1b}[1mlogged in as\u{1b}[0m\nUser: Ada Lovelace\nEmail: ada@example.com\nPlan: Pro\n";
        let status = parse_status(stdout);
        assert!(status.authenticated);
        assert_eq!(status.user.as_deref(), Some("Ada Lovelace"));
        assert_eq!(status.email.as_deref(), Some("ada@example.com"));
        assert_eq!(status.plan.as_deref(), Some("Pro"));
    }

    #[test]
    fn not_authenticated_when_no_login_marker() {
        let status = parse_status("not logged in\n");
        assert!(!status.authenticated);
        assert_eq!(status.user, None);
    }
}
