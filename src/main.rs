//! Pointer Sentry agent: replays pointer events (ndjson on stdin) into a
//! session engine. Periodic batches go to the configured classifier
//! endpoint; block and unblock decisions surface as log lines.

use pointer_sentry::{
    automation_user_agent, Attach, ClientMeta, EngineConfig, Enforcement, HttpTransport,
    RawPointerEvent, Session, SessionEngine, SessionRegistry, SessionStore, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

/// Enforcement surface of the agent: the UI overlay lives in the host
/// application, here a block is an actionable log line.
struct LogEnforcement;

impl Enforcement for LogEnforcement {
    fn on_block(&self, reason: &str) {
        warn!(reason, "session blocked; enforcement engaged");
    }

    fn on_unblock(&self) {
        info!("session unblocked; enforcement cleared");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("POINTER_SENTRY_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "pointer-sentry starting");

    let Some(endpoint) = config.transport.endpoint.clone() else {
        return Err("transport.endpoint is not configured".into());
    };

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(SessionStore::open(&config.data_dir.join("sessions.db"))?);
    let transport = Arc::new(HttpTransport::new(
        &endpoint,
        Duration::from_secs(config.transport.connect_timeout_secs),
    )?);

    let session = match std::env::var("POINTER_SENTRY_SESSION") {
        Ok(id) => Session::with_id(id),
        Err(_) => Session::new(),
    };
    let user_agent = std::env::var("POINTER_SENTRY_UA")
        .unwrap_or_else(|_| format!("pointer-sentry/{}", env!("CARGO_PKG_VERSION")));
    if automation_user_agent(&user_agent) {
        warn!(user_agent = %user_agent, "user agent announces an automation framework");
    }
    let client = ClientMeta {
        user_agent,
        url: "stdin://replay".to_string(),
        page: "/replay".to_string(),
    };

    let registry = SessionRegistry::new();
    let engine = match SessionEngine::attach(
        &registry,
        session,
        &config,
        client,
        transport,
        Arc::new(LogEnforcement),
        Some(store),
    ) {
        Attach::Owner(engine) => engine,
        Attach::Observer(_) => return Err("session already instrumented".into()),
    };
    engine.start();
    info!(
        session_id = %engine.session().session_id,
        endpoint = %endpoint,
        "replaying pointer events from stdin (Ctrl+C to stop)"
    );

    let stop = Arc::new(tokio::sync::Notify::new());
    {
        let stop = Arc::clone(&stop);
        let _ = ctrlc::set_handler(move || stop.notify_one());
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut recorded = 0u64;
    loop {
        tokio::select! {
            _ = stop.notified() => {
                info!("interrupt received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RawPointerEvent>(line) {
                        Ok(raw) => {
                            engine.record(raw);
                            recorded += 1;
                        }
                        Err(e) => warn!(error = %e, "skipping malformed event line"),
                    }
                }
                Ok(None) => {
                    info!("input exhausted");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    }

    let status = engine.status();
    info!(
        recorded,
        buffer_len = status.buffer_len,
        strikes = status.strikes,
        blocked = status.blocked,
        "replay finished"
    );
    engine.shutdown();
    // Leave the detached final send a moment to get on the wire.
    tokio::time::sleep(Duration::from_millis(250)).await;

    info!("pointer-sentry stopping");
    Ok(())
}
