//! Transport to the risk classifier endpoint.
//!
//! Two delivery modes: an awaited request/response mode for periodic
//! flushes and a fire-and-forget mode for teardown, where delivery is
//! best-effort and the caller must not be delayed.

use crate::dispatch::Batch;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("client construction failed: {0}")]
    Client(String),
}

/// Delivery seam between the dispatcher and the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Awaited mode. Returns the raw response body as JSON; interpreting
    /// it is the normalizer's job, not the transport's.
    async fn send(&self, batch: &Batch) -> Result<Value, TransportError>;

    /// Fire-and-forget mode for teardown flushes: must return immediately,
    /// never retries, and the outcome is not observable (at-most-once).
    fn send_detached(&self, batch: Batch);

    /// Detached control message (e.g. an unblock recheck). Best-effort.
    fn ping(&self, session_id: &str, action: &str) {
        let _ = (session_id, action);
    }
}

#[derive(Serialize)]
struct PingMeta<'a> {
    action: &'a str,
}

#[derive(Serialize)]
struct PingPayload<'a> {
    session_id: &'a str,
    meta: PingMeta<'a>,
}

/// HTTP POST transport over a shared connection pool.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &Batch) -> Result<Value, TransportError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(batch)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        // A non-JSON body is not an error: it degrades to "no decision"
        // downstream.
        match res.json::<Value>().await {
            Ok(body) => Ok(body),
            Err(e) => {
                debug!(error = %e, "classifier response was not JSON");
                Ok(Value::Null)
            }
        }
    }

    fn send_detached(&self, batch: Batch) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            match client.post(&endpoint).json(&batch).send().await {
                Ok(res) => debug!(status = res.status().as_u16(), "detached batch delivered"),
                Err(e) => warn!(error = %e, "detached batch send failed"),
            }
        });
    }

    fn ping(&self, session_id: &str, action: &str) {
        let payload = serde_json::to_value(PingPayload {
            session_id,
            meta: PingMeta { action },
        })
        .unwrap_or(Value::Null);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&payload).send().await {
                debug!(error = %e, "ping send failed");
            }
        });
    }
}
