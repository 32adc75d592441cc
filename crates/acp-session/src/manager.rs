use std::collections::HashSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::model::{
    ModeInfo, ModelInfo, Session, SessionListFilter, SessionState, SessionStatus,
};

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);
const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub max_sessions: usize,
    pub session_timeout: Duration,
    pub storage_dir: PathBuf,
    pub default_mode: String,
    pub default_model: String,
    pub available_modes: Vec<ModeInfo>,
    pub available_models: Vec<ModelInfo>,
}

impl SessionManagerConfig {
    /// Cleanup sweep cadence: a quarter of the session timeout, clamped to
    /// [30s, 5m].
    pub fn cleanup_interval(&self) -> Duration {
        (self.session_timeout / 4).clamp(MIN_CLEANUP_INTERVAL, MAX_CLEANUP_INTERVAL)
    }
}

struct Entry {
    session: Session,
    processing: bool,
}

/// Owns the in-memory session table and its on-disk mirror.
///
/// Every session mutation goes through `self.sessions` under a single
/// async `RwLock`; disk writes happen while holding a read guard over the
/// already-updated in-memory copy, so readers never observe a session
/// whose file write is still in flight half-applied (the temp file is
/// invisible until `persist` renames it in).
pub struct SessionManager {
    config: SessionManagerConfig,
    sessions: RwLock<std::collections::HashMap<String, Entry>>,
    write_lock: Mutex<()>,
}

impl SessionManager {
    pub async fn new(config: SessionManagerConfig) -> Result<Arc<Self>, SessionError> {
        tokio::fs::create_dir_all(&config.storage_dir)
            .await
            .map_err(|source| SessionError::Persistence {
                id: "<storage_dir>".to_string(),
                source,
            })?;
        tokio::fs::set_permissions(
            &config.storage_dir,
            std::fs::Permissions::from_mode(0o755),
        )
        .await
        .map_err(|source| SessionError::Persistence {
            id: "<storage_dir>".to_string(),
            source,
        })?;
        let manager = Arc::new(Self {
            config,
            sessions: RwLock::new(std::collections::HashMap::new()),
            write_lock: Mutex::new(()),
        });
        manager.load_all().await?;
        Ok(manager)
    }

    async fn load_all(&self) -> Result<(), SessionError> {
        let mut dir = match tokio::fs::read_dir(&self.config.storage_dir).await {
            Ok(dir) => dir,
            Err(source) => {
                return Err(SessionError::Persistence {
                    id: "<storage_dir>".to_string(),
                    source,
                })
            }
        };
        let mut sessions = self.sessions.write().await;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|source| SessionError::Persistence {
                id: "<storage_dir>".to_string(),
                source,
            })?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(source) => {
                    warn!(path = %path.display(), %source, "skipping unreadable session file");
                    continue;
                }
            };
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => {
                    sessions.insert(
                        session.id.clone(),
                        Entry {
                            session,
                            processing: false,
                        },
                    );
                }
                Err(source) => {
                    warn!(path = %path.display(), %source, "skipping malformed session file");
                }
            }
        }
        info!(count = sessions.len(), "loaded sessions from disk");
        Ok(())
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.config.storage_dir.join(format!("{id}.json"))
    }

    /// Recomputes `Active`/`Inactive`/`Expired` from `lastActivity` at read
    /// time; `Error` is sticky because it cannot be derived from elapsed
    /// time alone.
    fn derive_status(&self, state: &SessionState) -> SessionStatus {
        if state.status == SessionStatus::Error {
            return SessionStatus::Error;
        }
        let elapsed = chrono::Utc::now() - state.last_activity;
        let elapsed = elapsed.to_std().unwrap_or(Duration::ZERO);
        if elapsed >= self.config.session_timeout {
            SessionStatus::Expired
        } else if elapsed >= self.config.session_timeout / 2 {
            SessionStatus::Inactive
        } else {
            SessionStatus::Active
        }
    }

    fn materialize(&self, entry: &Entry) -> Session {
        let mut session = entry.session.clone();
        session.state.status = self.derive_status(&session.state);
        session
    }

    async fn write_to_disk(&self, session: &Session) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        let path = self.session_path(&session.id);
        let bytes = serde_json::to_vec_pretty(session).map_err(|source| SessionError::Serde {
            id: session.id.clone(),
            source,
        })?;
        let dir = self.config.storage_dir.clone();
        let id = session.id.clone();
        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            std::io::Write::write_all(&mut tmp, &bytes)?;
            tmp.persist(dir.join(format!("{id}.json")))
                .map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| SessionError::Persistence {
            id: session.id.clone(),
            source: std::io::Error::other(e.to_string()),
        })?
        .map_err(|source| SessionError::Persistence {
            id: session.id.clone(),
            source,
        })?;
        debug!(session_id = %path.display(), "persisted session");
        Ok(())
    }

    async fn delete_from_disk(&self, id: &str) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Persistence {
                id: id.to_string(),
                source,
            }),
        }
    }

    pub async fn create(&self, cwd: &str) -> Result<Session, SessionError> {
        self.expire_sweep().await?;
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.config.max_sessions {
            return Err(SessionError::Capacity(self.config.max_sessions));
        }
        let session = Session::new(cwd, &self.config.default_mode, &self.config.default_model);
        self.write_to_disk(&session).await?;
        sessions.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                processing: false,
            },
        );
        Ok(session)
    }

    /// Looks up a session, transparently loading it from disk on a cache
    /// miss — a session written by another process after this manager's
    /// startup sweep is still visible without a restart.
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(id) {
                return Ok(self.materialize(entry));
            }
        }
        self.load_on_miss(id).await
    }

    async fn load_on_miss(&self, id: &str) -> Result<Session, SessionError> {
        let bytes = match tokio::fs::read(self.session_path(id)).await {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()))
            }
            Err(source) => {
                return Err(SessionError::Persistence {
                    id: id.to_string(),
                    source,
                })
            }
        };
        let session: Session = serde_json::from_slice(&bytes).map_err(|source| SessionError::Serde {
            id: id.to_string(),
            source,
        })?;

        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session.id.clone()).or_insert_with(|| Entry {
            session: session.clone(),
            processing: false,
        });
        Ok(self.materialize(entry))
    }

    pub async fn list(&self, filter: &SessionListFilter) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .map(|entry| self.materialize(entry))
            .filter(|session| filter.matches(session))
            .collect()
    }

    pub async fn update<F>(&self, id: &str, f: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session) -> Result<(), SessionError>,
    {
        let updated = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            f(&mut entry.session)?;
            entry.session.updated_at = chrono::Utc::now();
            entry.session.clone()
        };
        self.write_to_disk(&updated).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        drop(sessions);
        self.delete_from_disk(id).await
    }

    pub async fn set_mode(&self, id: &str, mode_id: &str) -> Result<Session, SessionError> {
        if !self.config.available_modes.iter().any(|m| m.id == mode_id) {
            return Err(SessionError::UnknownMode(mode_id.to_string()));
        }
        self.update(id, |session| {
            session.state.current_mode = mode_id.to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_model(&self, id: &str, model_id: &str) -> Result<Session, SessionError> {
        if !self.config.available_models.iter().any(|m| m.id == model_id) {
            return Err(SessionError::UnknownModel(model_id.to_string()));
        }
        self.update(id, |session| {
            session.state.current_model = model_id.to_string();
            Ok(())
        })
        .await
    }

    /// Brackets prompt processing so the cleanup sweep never evicts a
    /// session mid-turn.
    pub async fn begin_processing(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if entry.processing {
            return Err(SessionError::AlreadyProcessing(id.to_string()));
        }
        entry.processing = true;
        Ok(())
    }

    pub async fn end_processing(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(id) {
            entry.processing = false;
        }
    }

    async fn expire_sweep(&self) -> Result<(), SessionError> {
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|entry| {
                    !entry.processing
                        && self.derive_status(&entry.session.state) == SessionStatus::Expired
                })
                .map(|entry| entry.session.id.clone())
                .collect()
        };
        for id in &expired {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id);
            drop(sessions);
            self.delete_from_disk(id).await?;
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions swept");
        }
        Ok(())
    }

    /// Runs the periodic cleanup sweep until the returned future is
    /// dropped or the process exits; intended to be spawned as a
    /// background task by the caller.
    pub async fn run_cleanup_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval());
        loop {
            ticker.tick().await;
            if let Err(error) = self.expire_sweep().await {
                warn!(%error, "cleanup sweep failed");
            }
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub fn available_modes(&self) -> &[ModeInfo] {
        &self.config.available_modes
    }

    pub fn available_models(&self) -> &[ModelInfo] {
        &self.config.available_models
    }

    pub fn known_model_ids(&self) -> HashSet<&str> {
        self.config.available_models.iter().map(|m| m.id.as_str()).collect()
    }
}
