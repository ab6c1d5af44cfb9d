//! Timer-driven batch dispatch.
//!
//! At most one send is in flight per session, enforced by a flag rather
//! than a queue: a tick that finds a send outstanding is skipped and its
//! events simply wait for the next tick. Events drained into a batch are
//! never restored; a failed or timed-out send loses that batch (bounded
//! memory, no duplicate counting).

use crate::config::DispatchConfig;
use crate::events::{EventBuffer, PointerEvent};
use crate::features::{self, MotionFeatures};
use crate::risk::{normalize_envelope, Enforcement, RiskResponse, StrikeMachine, Transition};
use crate::session::SharedStatus;
use crate::storage::SessionStore;
use crate::transport::Transport;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Host context stamped onto every batch.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub user_agent: String,
    pub url: String,
    pub page: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchMeta {
    pub user_agent: String,
    pub url: String,
    pub timestamp: String,
}

/// One bundle of sampled events plus derived features, consumed exactly
/// once by the transport.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub batch_id: String,
    pub session_id: String,
    pub page: String,
    /// Dispatch time, epoch milliseconds.
    pub ts: i64,
    pub events_sample: Vec<PointerEvent>,
    pub features: MotionFeatures,
    pub meta: BatchMeta,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// What one flush attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// A send was already in flight.
    SkippedBusy,
    SkippedEmpty,
    SkippedBelowMin,
    /// Batch delivered and the response applied to the strike machine.
    Sent { verdict: Transition },
    /// Send failed or timed out; the batch is gone.
    Failed,
    /// Teardown batch handed to the fire-and-forget path.
    Detached,
}

/// Releases the in-flight flag on every exit path, including cancellation.
struct SendingGuard<'a>(&'a AtomicBool);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BatchDispatcher {
    config: DispatchConfig,
    session_id: String,
    client: ClientMeta,
    buffer: Arc<Mutex<EventBuffer>>,
    transport: Arc<dyn Transport>,
    strikes: Arc<Mutex<StrikeMachine>>,
    enforcement: Arc<dyn Enforcement>,
    store: Option<Arc<SessionStore>>,
    shared: Arc<SharedStatus>,
    sending: AtomicBool,
}

impl BatchDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: DispatchConfig,
        session_id: String,
        client: ClientMeta,
        buffer: Arc<Mutex<EventBuffer>>,
        transport: Arc<dyn Transport>,
        strikes: Arc<Mutex<StrikeMachine>>,
        enforcement: Arc<dyn Enforcement>,
        store: Option<Arc<SessionStore>>,
        shared: Arc<SharedStatus>,
    ) -> Self {
        Self {
            config,
            session_id,
            client,
            buffer,
            transport,
            strikes,
            enforcement,
            store,
            shared,
            sending: AtomicBool::new(false),
        }
    }

    /// Tick loop. Runs until the shutdown signal flips; an in-flight send
    /// is not cancelled, the loop just stops scheduling new ones.
    pub(crate) async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // 1 s floor regardless of configuration.
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.flush().await;
                    debug!(session_id = %self.session_id, ?outcome, "dispatch tick");
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One periodic flush: drain, featurize, send, interpret.
    pub async fn flush(&self) -> FlushOutcome {
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return FlushOutcome::SkippedBusy;
        }
        let _guard = SendingGuard(&self.sending);

        let drained = {
            let mut buf = self.buffer.lock().expect("lock");
            if buf.is_empty() {
                return FlushOutcome::SkippedEmpty;
            }
            if buf.len() < self.config.min_events {
                return FlushOutcome::SkippedBelowMin;
            }
            buf.drain()
        };
        self.shared.set_buffer_len(0);

        let batch = self.build_batch(drained, false);
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        match tokio::time::timeout(timeout, self.transport.send(&batch)).await {
            Err(_) => {
                warn!(
                    session_id = %self.session_id,
                    batch_id = %batch.batch_id,
                    "send timed out; batch dropped"
                );
                FlushOutcome::Failed
            }
            Ok(Err(e)) => {
                warn!(
                    session_id = %self.session_id,
                    batch_id = %batch.batch_id,
                    error = %e,
                    "send failed; batch dropped"
                );
                FlushOutcome::Failed
            }
            Ok(Ok(raw)) => {
                let response = normalize_envelope(&raw);
                self.shared.set_last_response(response.clone());
                let verdict = self.apply_verdict(&response);
                FlushOutcome::Sent { verdict }
            }
        }
    }

    /// Forced teardown flush: bypasses both the minimum threshold and the
    /// in-flight flag (it may race a normal send) and uses the detached
    /// transport mode. Returns immediately; delivery is at-most-once.
    pub fn final_flush(&self) -> FlushOutcome {
        let drained = { self.buffer.lock().expect("lock").drain() };
        self.shared.set_buffer_len(0);
        if drained.is_empty() {
            return FlushOutcome::SkippedEmpty;
        }
        let batch = self.build_batch(drained, true);
        debug!(
            session_id = %self.session_id,
            batch_id = %batch.batch_id,
            events = batch.events_sample.len(),
            "final flush detached"
        );
        self.transport.send_detached(batch);
        FlushOutcome::Detached
    }

    fn build_batch(&self, mut events: Vec<PointerEvent>, is_final: bool) -> Batch {
        // Keep the most recent `sample_cap` events; features are computed
        // over the same sample that goes on the wire.
        let cap = self.config.sample_cap.max(1);
        if events.len() > cap {
            events.drain(..events.len() - cap);
        }
        let features = features::extract(&events);
        Batch {
            batch_id: Uuid::new_v4().to_string(),
            session_id: self.session_id.clone(),
            page: self.client.page.clone(),
            ts: Utc::now().timestamp_millis(),
            events_sample: events,
            features,
            meta: BatchMeta {
                user_agent: self.client.user_agent.clone(),
                url: self.client.url.clone(),
                timestamp: Utc::now().to_rfc3339(),
            },
            is_final,
        }
    }

    fn apply_verdict(&self, response: &RiskResponse) -> Transition {
        let (transition, state) = {
            let mut machine = self.strikes.lock().expect("lock");
            let t = machine.apply(response);
            (t, machine.state())
        };
        self.shared.set_strikes(state.strikes, state.blocked);

        match &transition {
            Transition::Blocked { strikes, reason } => {
                info!(
                    session_id = %self.session_id,
                    strikes,
                    reason = %reason,
                    "session blocked"
                );
                self.enforcement.on_block(reason);
            }
            Transition::Strike { strikes } => {
                debug!(session_id = %self.session_id, strikes, "bot-like verdict");
            }
            Transition::Forgive { strikes } => {
                debug!(session_id = %self.session_id, strikes, "human-like verdict");
            }
            Transition::NoVerdict => {
                debug!(session_id = %self.session_id, "no verdict this tick");
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.session_id, state, Utc::now().timestamp_millis()) {
                warn!(session_id = %self.session_id, error = %e, "strike state persist failed");
            }
        }
        transition
    }
}
