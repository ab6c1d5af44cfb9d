//! Pointer interaction events and the bounded per-session event buffer.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Interaction kind, matching the DOM event vocabulary upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Move,
    Down,
    Up,
    Click,
}

impl PointerKind {
    /// Down and Click both count as press events for click dynamics.
    /// Up is deliberately excluded: DOM sources emit down+up+click for one
    /// physical click, and counting the release too would triple-count it.
    pub fn is_press(self) -> bool {
        matches!(self, PointerKind::Down | PointerKind::Click)
    }
}

/// One recorded pointer sample. Immutable once recorded; arrival order is
/// significant (time series).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
    /// Capture timestamp, milliseconds.
    pub t: i64,
    #[serde(rename = "type")]
    pub kind: PointerKind,
}

/// Raw sample as produced by an event source. Coordinates and timestamp may
/// be missing (e.g. touch events without a client position).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawPointerEvent {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub t: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<PointerKind>,
}

impl PointerEvent {
    /// Coerce a raw sample into a well-formed event. Missing coordinates
    /// become 0, a missing timestamp becomes `fallback_ts`, a missing kind
    /// becomes Move. The recording pipeline never rejects input.
    pub fn from_raw(raw: RawPointerEvent, fallback_ts: i64) -> Self {
        Self {
            x: raw.x.filter(|v| v.is_finite()).unwrap_or(0.0),
            y: raw.y.filter(|v| v.is_finite()).unwrap_or(0.0),
            t: raw.t.unwrap_or(fallback_ts),
            kind: raw.kind.unwrap_or(PointerKind::Move),
        }
    }
}

/// Append-only, capacity-bounded sequence of events for one session.
/// Overflow evicts the oldest entries so length never exceeds capacity.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<PointerEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Append one event; FIFO-trim to capacity. Never blocks, never fails.
    pub fn record(&mut self, event: PointerEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Atomically take and clear the contents. Each recorded event is
    /// handed out at most once.
    pub fn drain(&mut self) -> Vec<PointerEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
