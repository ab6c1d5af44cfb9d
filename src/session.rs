//! Session identity, shared status, and the single-owner registration
//! guard: at most one active collector records and dispatches for a given
//! session; later attachments observe, they never double-count.

use crate::risk::RiskResponse;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// User-agent substrings that identify automation frameworks outright.
const AUTOMATION_UA_VOCABULARY: &[&str] = &[
    "selenium",
    "webdriver",
    "headless",
    "phantomjs",
    "puppeteer",
    "playwright",
    "automation",
];

/// One continuous period of profiled interaction. Created once, never
/// mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with a generated `s_<unix>_<rand>` id.
    pub fn new() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        Self::with_id(format!("s_{}_{}", Utc::now().timestamp(), suffix))
    }

    /// Session with a caller-supplied opaque id (e.g. resumed from the host).
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Does this user agent announce an automation framework?
pub fn automation_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    AUTOMATION_UA_VOCABULARY.iter().any(|k| ua.contains(k))
}

/// Point-in-time view of one session's collector.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub session_id: String,
    pub buffer_len: usize,
    pub strikes: u32,
    pub blocked: bool,
    pub last_response: Option<RiskResponse>,
}

/// Status shared between the owning engine and any observers. The owner
/// writes, everyone snapshots.
#[derive(Debug)]
pub struct SharedStatus {
    session_id: String,
    buffer_len: AtomicUsize,
    strikes: AtomicU32,
    blocked: AtomicBool,
    last_response: Mutex<Option<RiskResponse>>,
}

impl SharedStatus {
    pub(crate) fn new(session_id: String) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            buffer_len: AtomicUsize::new(0),
            strikes: AtomicU32::new(0),
            blocked: AtomicBool::new(false),
            last_response: Mutex::new(None),
        })
    }

    pub(crate) fn set_buffer_len(&self, len: usize) {
        self.buffer_len.store(len, Ordering::Relaxed);
    }

    pub(crate) fn set_strikes(&self, strikes: u32, blocked: bool) {
        self.strikes.store(strikes, Ordering::Relaxed);
        self.blocked.store(blocked, Ordering::Relaxed);
    }

    pub(crate) fn set_last_response(&self, response: RiskResponse) {
        *self.last_response.lock().expect("lock") = Some(response);
    }

    pub fn snapshot(&self) -> EngineStatus {
        EngineStatus {
            session_id: self.session_id.clone(),
            buffer_len: self.buffer_len.load(Ordering::Relaxed),
            strikes: self.strikes.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            last_response: self.last_response.lock().expect("lock").clone(),
        }
    }
}

/// Read-only handle handed to a second collector attaching to an already
/// instrumented session.
#[derive(Debug, Clone)]
pub struct StatusObserver {
    shared: Arc<SharedStatus>,
}

impl StatusObserver {
    pub fn status(&self) -> EngineStatus {
        self.shared.snapshot()
    }
}

/// Host-owned registry enforcing the one-active-collector invariant.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, Weak<SharedStatus>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim ownership of a session. On conflict the caller gets an
    /// observer of the existing owner's status instead.
    pub(crate) fn register(
        &self,
        session_id: &str,
        shared: &Arc<SharedStatus>,
    ) -> Result<(), StatusObserver> {
        let mut inner = self.inner.lock().expect("lock");
        if let Some(existing) = inner.get(session_id).and_then(Weak::upgrade) {
            return Err(StatusObserver { shared: existing });
        }
        inner.insert(session_id.to_string(), Arc::downgrade(shared));
        Ok(())
    }

    pub(crate) fn release(&self, session_id: &str) {
        self.inner.lock().expect("lock").remove(session_id);
    }
}
