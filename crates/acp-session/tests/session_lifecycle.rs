use std::time::Duration;

use acp_session::{ModeInfo, ModelInfo, SessionManager, SessionManagerConfig};

fn config(dir: &std::path::Path, timeout: Duration) -> SessionManagerConfig {
    SessionManagerConfig {
        max_sessions: 10,
        session_timeout: timeout,
        storage_dir: dir.to_path_buf(),
        default_mode: "ask".to_string(),
        default_model: "auto".to_string(),
        available_modes: vec![ModeInfo {
            id: "ask".to_string(),
            name: "Ask".to_string(),
        }],
        available_models: vec![ModelInfo::auto()],
    }
}

#[tokio::test]
async fn expired_sessions_are_swept_and_removed_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new(config(dir.path(), Duration::from_millis(50)))
        .await
        .unwrap();
    let session = manager.create("/tmp/project").await.unwrap();
    let path = dir.path().join(format!("{}.json", session.id));
    assert!(path.exists());

    tokio::time::sleep(Duration::from_millis(120)).await;
    // Triggering create() on a fresh session runs the expiry sweep first.
    manager.create("/tmp/other").await.unwrap();

    assert!(manager.get(&session.id).await.is_err());
    assert!(!path.exists());
}

#[tokio::test]
async fn processing_sessions_survive_the_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new(config(dir.path(), Duration::from_millis(50)))
        .await
        .unwrap();
    let session = manager.create("/tmp/project").await.unwrap();
    manager.begin_processing(&session.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    manager.create("/tmp/other").await.unwrap();

    assert!(manager.get(&session.id).await.is_ok());
}

#[tokio::test]
async fn session_survives_a_manager_restart() {
    let dir = tempfile::tempdir().unwrap();
    let created_id = {
        let manager = SessionManager::new(config(dir.path(), Duration::from_secs(300)))
            .await
            .unwrap();
        manager.create("/tmp/project").await.unwrap().id
    };

    let manager = SessionManager::new(config(dir.path(), Duration::from_secs(300)))
        .await
        .unwrap();
    let session = manager.get(&created_id).await.unwrap();
    assert_eq!(session.id, created_id);
}
