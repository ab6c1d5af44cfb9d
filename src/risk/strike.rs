//! Strike decision state machine.
//!
//! Two net bot-like verdicts are required before a session is blocked, so a
//! single misclassification never locks anyone out; a human-like verdict
//! only partially forgives accumulated strikes (asymmetric hysteresis).
//! `blocked` is terminal until an explicit unblock.

use super::normalize::RiskResponse;
use serde::{Deserialize, Serialize};

/// Labels that count as a discrete bot verdict (substring match).
const BOT_LABEL_VOCABULARY: &[&str] = &["bot", "attack"];

/// Enforcement surface (overlay, gateway, ...). Hooks must be idempotent;
/// the machine only fires them on state transitions.
pub trait Enforcement: Send + Sync {
    fn on_block(&self, reason: &str);
    fn on_unblock(&self);
}

/// How strikes decay on a human-like verdict. The upstream collectors
/// disagreed on this, so it is policy, not contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayPolicy {
    /// `strikes = max(0, strikes - 1)`.
    #[default]
    StepDown,
    /// Any human-like verdict clears all strikes.
    Reset,
}

/// Persistable machine state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeState {
    pub strikes: u32,
    pub blocked: bool,
}

/// Outcome of applying one response.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Null probability and no usable label: no state change.
    NoVerdict,
    Strike { strikes: u32 },
    Forgive { strikes: u32 },
    /// Crossed the block threshold on this verdict. Emitted at most once
    /// per blocked period; the caller invokes the enforcement hook on it.
    Blocked { strikes: u32, reason: String },
}

#[derive(Debug)]
pub struct StrikeMachine {
    strikes: u32,
    blocked: bool,
    block_threshold: u32,
    bot_threshold: f64,
    decay: DecayPolicy,
}

impl StrikeMachine {
    pub fn new(block_threshold: u32, bot_threshold: f64, decay: DecayPolicy) -> Self {
        Self {
            strikes: 0,
            blocked: false,
            block_threshold: block_threshold.max(1),
            bot_threshold,
            decay,
        }
    }

    /// Resume from persisted state (cross-reload continuity).
    pub fn restore(&mut self, state: StrikeState) {
        self.strikes = state.strikes;
        self.blocked = state.blocked;
    }

    pub fn state(&self) -> StrikeState {
        StrikeState {
            strikes: self.strikes,
            blocked: self.blocked,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Discrete verdict for one response: probability wins, the label
    /// vocabulary fills in when only a label was returned.
    fn verdict(&self, response: &RiskResponse) -> Option<bool> {
        let label_bot = response.label.as_deref().map(|l| {
            let l = l.to_ascii_lowercase();
            BOT_LABEL_VOCABULARY.iter().any(|v| l.contains(v))
        });
        match (response.bot_probability, label_bot) {
            (Some(p), lb) => Some(p >= self.bot_threshold || lb.unwrap_or(false)),
            (None, Some(lb)) => Some(lb),
            (None, None) => None,
        }
    }

    /// Apply one normalized response. "No decision" responses change
    /// nothing; blocking is reported exactly once per blocked period.
    pub fn apply(&mut self, response: &RiskResponse) -> Transition {
        let Some(is_bot) = self.verdict(response) else {
            return Transition::NoVerdict;
        };

        if is_bot {
            self.strikes = self.strikes.saturating_add(1);
            if !self.blocked && self.strikes >= self.block_threshold {
                self.blocked = true;
                let reason = match response.bot_probability {
                    Some(p) => format!(
                        "bot behavior detected (p={:.3}, strikes={})",
                        p, self.strikes
                    ),
                    None => format!(
                        "bot behavior detected (label={}, strikes={})",
                        response.label.as_deref().unwrap_or("?"),
                        self.strikes
                    ),
                };
                return Transition::Blocked {
                    strikes: self.strikes,
                    reason,
                };
            }
            Transition::Strike {
                strikes: self.strikes,
            }
        } else {
            self.strikes = match self.decay {
                DecayPolicy::StepDown => self.strikes.saturating_sub(1),
                DecayPolicy::Reset => 0,
            };
            Transition::Forgive {
                strikes: self.strikes,
            }
        }
    }

    /// Explicit operator/user unblock: clears strikes and the blocked flag.
    pub fn unblock(&mut self) {
        self.strikes = 0;
        self.blocked = false;
    }
}
