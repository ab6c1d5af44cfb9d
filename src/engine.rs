//! Session engine: one owner per session for recording, dispatch, and the
//! block/unblock decision. The host injects the session, transport, and
//! enforcement surface at construction.

use crate::config::EngineConfig;
use crate::dispatch::{BatchDispatcher, ClientMeta, FlushOutcome};
use crate::events::{EventBuffer, PointerEvent, RawPointerEvent};
use crate::risk::{Enforcement, StrikeMachine};
use crate::session::{EngineStatus, Session, SessionRegistry, SharedStatus, StatusObserver};
use crate::storage::SessionStore;
use crate::transport::Transport;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

/// Outcome of attaching a collector to a session: the first attach owns
/// recording and dispatch, any later one becomes a read-only observer.
pub enum Attach {
    Owner(SessionEngine),
    Observer(StatusObserver),
}

pub struct SessionEngine {
    session: Session,
    registry: Arc<SessionRegistry>,
    buffer: Arc<Mutex<EventBuffer>>,
    strikes: Arc<Mutex<StrikeMachine>>,
    dispatcher: Arc<BatchDispatcher>,
    transport: Arc<dyn Transport>,
    enforcement: Arc<dyn Enforcement>,
    store: Option<Arc<SessionStore>>,
    shared: Arc<SharedStatus>,
    shutdown_tx: watch::Sender<bool>,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionEngine {
    /// Attach a collector for `session`. Registration conflicts resolve
    /// deterministically: the existing owner keeps recording and the
    /// caller gets an [`Attach::Observer`].
    pub fn attach(
        registry: &Arc<SessionRegistry>,
        session: Session,
        config: &EngineConfig,
        client: ClientMeta,
        transport: Arc<dyn Transport>,
        enforcement: Arc<dyn Enforcement>,
        store: Option<Arc<SessionStore>>,
    ) -> Attach {
        let shared = SharedStatus::new(session.session_id.clone());
        if let Err(observer) = registry.register(&session.session_id, &shared) {
            info!(
                session_id = %session.session_id,
                "collector already registered; attaching read-only"
            );
            return Attach::Observer(observer);
        }

        let mut machine = StrikeMachine::new(
            config.strike.block_threshold,
            config.strike.bot_threshold,
            config.strike.decay,
        );
        let store = if config.strike.persist { store } else { None };
        if let Some(store) = &store {
            match store.load(&session.session_id) {
                Ok(Some(state)) => {
                    machine.restore(state);
                    if state.blocked {
                        // A blocked session stays blocked across reloads.
                        enforcement.on_block("restored blocked session");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(session_id = %session.session_id, error = %e, "strike state load failed")
                }
            }
        }
        let state = machine.state();
        shared.set_strikes(state.strikes, state.blocked);

        let buffer = Arc::new(Mutex::new(EventBuffer::new(config.buffer.capacity)));
        let strikes = Arc::new(Mutex::new(machine));
        let dispatcher = Arc::new(BatchDispatcher::new(
            config.dispatch.clone(),
            session.session_id.clone(),
            client,
            Arc::clone(&buffer),
            Arc::clone(&transport),
            Arc::clone(&strikes),
            Arc::clone(&enforcement),
            store.clone(),
            Arc::clone(&shared),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Attach::Owner(SessionEngine {
            session,
            registry: Arc::clone(registry),
            buffer,
            strikes,
            dispatcher,
            transport,
            enforcement,
            store,
            shared,
            shutdown_tx,
            ticker: Mutex::new(None),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Record one raw sample. Never suspends and never fails: malformed
    /// input is coerced, overflow evicts the oldest events.
    pub fn record(&self, raw: RawPointerEvent) {
        let event = PointerEvent::from_raw(raw, Utc::now().timestamp_millis());
        self.record_event(event);
    }

    pub fn record_event(&self, event: PointerEvent) {
        let len = {
            let mut buf = self.buffer.lock().expect("lock");
            buf.record(event);
            buf.len()
        };
        self.shared.set_buffer_len(len);
    }

    /// Start the periodic dispatch loop. Idempotent.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock().expect("lock");
        if ticker.is_some() {
            return;
        }
        let rx = self.shutdown_tx.subscribe();
        *ticker = Some(tokio::spawn(Arc::clone(&self.dispatcher).run(rx)));
        info!(session_id = %self.session.session_id, "dispatch loop started");
    }

    /// One immediate periodic-style flush (still subject to the in-flight
    /// flag and the minimum threshold).
    pub async fn flush_now(&self) -> FlushOutcome {
        self.dispatcher.flush().await
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.snapshot()
    }

    pub fn is_blocked(&self) -> bool {
        self.strikes.lock().expect("lock").is_blocked()
    }

    /// Explicit unblock: clears strikes and enforcement, then asks the
    /// server for a recheck (detached, best-effort).
    pub fn unblock(&self) {
        let state = {
            let mut machine = self.strikes.lock().expect("lock");
            machine.unblock();
            machine.state()
        };
        self.shared.set_strikes(state.strikes, state.blocked);
        self.enforcement.on_unblock();
        if let Some(store) = &self.store {
            if let Err(e) =
                store.save(&self.session.session_id, state, Utc::now().timestamp_millis())
            {
                warn!(session_id = %self.session.session_id, error = %e, "strike state persist failed");
            }
        }
        self.transport.ping(&self.session.session_id, "recheck");
        info!(session_id = %self.session.session_id, "session unblocked");
    }

    /// Teardown: stop scheduling ticks (an in-flight send is not
    /// cancelled) and race one final detached flush. Returns immediately.
    pub fn shutdown(&self) -> FlushOutcome {
        let _ = self.shutdown_tx.send(true);
        let outcome = self.dispatcher.final_flush();
        self.registry.release(&self.session.session_id);
        info!(session_id = %self.session.session_id, ?outcome, "engine shut down");
        outcome
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        // Free the registration slot even if the host never called
        // shutdown; the final flush only happens on an explicit shutdown.
        let _ = self.shutdown_tx.send(true);
        self.registry.release(&self.session.session_id);
    }
}
