use std::path::PathBuf;

use crate::bridge::Bridge;

/// Environment variable tests use to replace the backend CLI path without
/// touching the binary's argv or working directory.
pub const BINARY_ENV_VAR: &str = "CURSOR_AGENT_BINARY";

#[derive(Debug, Clone, Default)]
pub struct BridgeBuilder {
    binary: Option<PathBuf>,
    working_dir: Option<PathBuf>,
}

impl BridgeBuilder {
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Bridge {
        let binary = self.binary.unwrap_or_else(|| {
            std::env::var(BINARY_ENV_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cursor-agent"))
        });
        Bridge {
            binary,
            working_dir: self.working_dir,
        }
    }
}
