use std::io::Write;
use std::time::Duration;

use cursor_agent::{Bridge, ParsedLine, StreamChunk, StreamStatus, StreamingPromptRequest};
use tokio_util::sync::CancellationToken;

fn mock_cli(lines: &[&str], exit_code: i32) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    for line in lines {
        writeln!(file, "printf '%s\\n' '{}'", line.replace('\'', "'\\''")).unwrap();
    }
    writeln!(file, "exit {exit_code}").unwrap();
    let mut perms = std::fs::metadata(file.path()).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(file.path(), perms).unwrap();
    file
}

#[tokio::test]
async fn bridge_streams_and_aggregates_content() {
    let script = mock_cli(&["{\"content\":\"Hello\"}", "{\"content\":\" world\"}"], 0);
    let bridge = Bridge::new(script.path().to_path_buf());

    let (mut rx, handle) = bridge.send_streaming_prompt(
        StreamingPromptRequest::new("hi"),
        Some(Duration::from_secs(5)),
        CancellationToken::new(),
    );

    let mut transcript = String::new();
    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Content(ParsedLine::Json(v)) => {
                if let Some(text) = cursor_agent::extract_text(&v) {
                    transcript.push_str(&text);
                }
            }
            StreamChunk::Done => break,
            StreamChunk::Error(message) => panic!("unexpected error: {message}"),
            _ => {}
        }
    }

    assert_eq!(transcript, "Hello world");
    assert_eq!(handle.await.unwrap(), StreamStatus::Completed);
}

#[tokio::test]
async fn bridge_reports_version_and_models_from_mock_cli() {
    let version_script = mock_cli(&["cursor-agent 9.9.9"], 0);
    let bridge = Bridge::new(version_script.path().to_path_buf());
    assert_eq!(bridge.get_version().await.unwrap(), "9.9.9");

    let models_script = mock_cli(&["Available models:", "auto - Auto", "gpt-5 - GPT-5", ""], 0);
    let bridge = Bridge::new(models_script.path().to_path_buf());
    let models = bridge.list_models().await.unwrap();
    assert_eq!(models[0].id, "auto");
    assert!(models.iter().any(|m| m.id == "gpt-5" && m.provider == "openai"));
}
