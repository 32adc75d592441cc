use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemToolConfig {
    pub enabled: bool,
    pub allowed_paths: Vec<PathBuf>,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for FilesystemToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_paths: Vec::new(),
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalToolConfig {
    pub enabled: bool,
    pub max_processes: u32,
    pub default_output_byte_limit: u64,
    pub max_output_byte_limit: u64,
    pub forbidden_commands: Vec<String>,
    pub allowed_commands: Vec<String>,
    pub default_cwd: Option<PathBuf>,
}

impl Default for TerminalToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_processes: 5,
            default_output_byte_limit: 1024 * 1024,
            max_output_byte_limit: 10 * 1024 * 1024,
            forbidden_commands: Vec::new(),
            allowed_commands: Vec::new(),
            default_cwd: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub filesystem: FilesystemToolConfig,
    pub terminal: TerminalToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            filesystem: FilesystemToolConfig::default(),
            terminal: TerminalToolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub timeout: u64,
    pub retries: u32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            timeout: 30_000,
            retries: 2,
        }
    }
}

/// Runtime-tunable knobs for session limits, tool gating, and the backend
/// CLI invocation. Loading this from a file or CLI arguments is out of
/// scope; callers construct it directly (tests) or layer a
/// config-parsing crate in front (a real launcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub log_level: LogLevel,
    pub session_dir: PathBuf,
    pub max_sessions: usize,
    pub session_timeout_ms: u64,
    pub tools: ToolsConfig,
    pub cursor: CursorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            session_dir: PathBuf::from("~/.cursor-sessions"),
            max_sessions: 100,
            session_timeout_ms: 30 * 60 * 1000,
            tools: ToolsConfig::default(),
            cursor: CursorConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if !(1..=1000).contains(&self.max_sessions) {
            return Err(AgentError::InvalidConfig(
                "maxSessions must be in [1, 1000]".to_string(),
            ));
        }
        if !(60_000..=86_400_000).contains(&self.session_timeout_ms) {
            return Err(AgentError::InvalidConfig(
                "sessionTimeout must be in [60000, 86400000] ms".to_string(),
            ));
        }
        if !(1..=20).contains(&self.tools.terminal.max_processes) {
            return Err(AgentError::InvalidConfig(
                "tools.terminal.maxProcesses must be in [1, 20]".to_string(),
            ));
        }
        if !(5_000..=300_000).contains(&self.cursor.timeout) {
            return Err(AgentError::InvalidConfig(
                "cursor.timeout must be in [5000, 300000] ms".to_string(),
            ));
        }
        if self.cursor.retries > 10 {
            return Err(AgentError::InvalidConfig(
                "cursor.retries must be in [0, 10]".to_string(),
            ));
        }
        let worst_case = self.cursor.timeout.saturating_mul(self.cursor.retries as u64 + 1);
        if worst_case > 600_000 {
            return Err(AgentError::InvalidConfig(
                "cursor.timeout * (cursor.retries + 1) must be <= 600000".to_string(),
            ));
        }
        Ok(())
    }

    /// Expands a leading `~` to the current user's home directory. Path
    /// normalization beyond this is out of scope.
    pub fn expanded_session_dir(&self) -> PathBuf {
        let raw = self.session_dir.to_string_lossy();
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest);
            }
        } else if raw == "~" {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home);
            }
        }
        self.session_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_max_sessions() {
        let mut config = AgentConfig::default();
        config.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_timeout_retry_product_over_budget() {
        let mut config = AgentConfig::default();
        config.cursor.timeout = 300_000;
        config.cursor.retries = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn expands_tilde_using_home_env() {
        let mut config = AgentConfig::default();
        config.session_dir = PathBuf::from("~/sessions");
        std::env::set_var("HOME", "/home/testuser");
        assert_eq!(
            config.expanded_session_dir(),
            PathBuf::from("/home/testuser/sessions")
        );
    }
}
