//! Pointer Sentry — behavioral pointer telemetry and bot risk gating.
//!
//! Modular structure:
//! - [`events`] — Pointer event types and the bounded per-session buffer
//! - [`features`] — Kinematic behavioral feature extraction
//! - [`risk`] — Classifier response normalization and strike hysteresis
//! - [`dispatch`] — Timer-driven batch dispatch, at most one send in flight
//! - [`transport`] — HTTP delivery to the classifier (awaited + detached)
//! - [`session`] — Session identity and single-owner registration
//! - [`storage`] — Durable strike-state mirror
//! - [`engine`] — Per-session orchestrator
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod features;
pub mod logging;
pub mod risk;
pub mod session;
pub mod storage;
pub mod transport;

pub use config::EngineConfig;
pub use dispatch::{Batch, BatchDispatcher, ClientMeta, FlushOutcome};
pub use engine::{Attach, SessionEngine};
pub use events::{EventBuffer, PointerEvent, PointerKind, RawPointerEvent};
pub use features::{extract, MotionFeatures};
pub use risk::{normalize, normalize_envelope, Enforcement, RiskResponse, StrikeMachine};
pub use session::{automation_user_agent, EngineStatus, Session, SessionRegistry, StatusObserver};
pub use storage::SessionStore;
pub use transport::{HttpTransport, Transport, TransportError};
pub use logging::StructuredLogger;
