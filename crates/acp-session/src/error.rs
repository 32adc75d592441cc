use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session capacity reached ({0} sessions)")]
    Capacity(usize),
    #[error("failed to persist session {id}: {source}")]
    Persistence {
        id: String,
        source: std::io::Error,
    },
    #[error("failed to (de)serialize session {id}: {source}")]
    Serde {
        id: String,
        source: serde_json::Error,
    },
    #[error("unknown mode id {0}")]
    UnknownMode(String),
    #[error("unknown model id {0}")]
    UnknownModel(String),
    #[error("session {0} is already processing a prompt")]
    AlreadyProcessing(String),
}
