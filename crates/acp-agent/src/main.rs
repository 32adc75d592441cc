use std::process::ExitCode;
use std::sync::Arc;

use acp_agent::client_rpc::OutboundSink;
use acp_agent::config::AgentConfig;
use acp_agent::error::AgentError;
use acp_agent::state::AgentState;
use acp_agent::dispatcher;
use acp_protocol::{FrameReader, FrameWriter, Inbound};
use cursor_agent::BridgeBuilder;
use serde_json::Value;
use tokio::io::{self, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Adapts [`FrameWriter`] over real stdout into the reverse-RPC layer's
/// [`OutboundSink`], so handlers and the response-writing loop share one
/// mutex-serialized writer.
struct StdoutSink(FrameWriter<io::Stdout>);

#[async_trait::async_trait]
impl OutboundSink for StdoutSink {
    async fn send(&self, message: Value) {
        if let Err(error) = self.0.write_line(&message).await {
            warn!(%error, "failed to write outbound frame");
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}

/// Spawns the task that answers one inbound line, so the stdin reader never
/// blocks on handler work.
fn dispatch_inbound(state: &Arc<AgentState>, inbound: Inbound, inflight: &mut JoinSet<()>) {
    match inbound {
        Inbound::Request { id, method, params } => {
            let state = state.clone();
            inflight.spawn(async move {
                let response = dispatcher::handle_request(&state, id, method, params).await;
                state.sink.send(response).await;
            });
        }
        Inbound::Notification { method, params } if method == "session/cancel" => {
            let state = state.clone();
            inflight.spawn(async move {
                dispatcher::handle_cancel_notification(&state, params).await;
            });
        }
        Inbound::Notification { method, params } if method.starts_with('_') => {
            let state = state.clone();
            inflight.spawn(async move {
                let _ = state.extensions.dispatch(&method, params).await;
            });
        }
        Inbound::Notification { method, .. } => {
            warn!(method, "unrecognized notification, ignoring");
        }
        Inbound::Reply { id, result, error } => {
            let state = state.clone();
            inflight.spawn(async move {
                state.reverse.resolve(&id, result, error).await;
            });
        }
    }
}

async fn run() -> Result<(), AgentError> {
    let config = AgentConfig::default();
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter_str()));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();

    let bridge = BridgeBuilder::default().build();
    let sink: Arc<dyn OutboundSink> = Arc::new(StdoutSink(FrameWriter::new(io::stdout())));
    let state = AgentState::new(config, bridge, sink).await?;

    let mut reader = FrameReader::new(BufReader::new(io::stdin()));
    let mut inflight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            frame = reader.next_frame() => {
                match frame {
                    Ok(Some(inbound)) => dispatch_inbound(&state, inbound, &mut inflight),
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Err(error) => warn!(%error, "failed to parse inbound frame, skipping"),
                }
            }
            Some(result) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(error) = result {
                    warn!(%error, "a spawned handler task panicked");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, draining in-flight requests");
                break;
            }
            _ = wait_for_sigterm() => {
                info!("received SIGTERM, draining in-flight requests");
                break;
            }
        }
    }

    while let Some(result) = inflight.join_next().await {
        if let Err(error) = result {
            warn!(%error, "a spawned handler task panicked during drain");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(0),
        Err(error) => {
            eprintln!("acp-agent: unrecoverable startup error: {error}");
            ExitCode::from(1)
        }
    }
}
