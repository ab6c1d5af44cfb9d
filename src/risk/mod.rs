//! Risk interpretation: classifier response normalization and the
//! hysteresis-based strike machine that gates a session.

mod normalize;
mod strike;

pub use normalize::{normalize, normalize_envelope, RiskResponse};
pub use strike::{DecayPolicy, Enforcement, StrikeMachine, StrikeState, Transition};
