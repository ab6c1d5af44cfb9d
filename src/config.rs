//! Engine configuration. Defaults mirror the deployed collector constants
//! (3 s batch interval, 5000-event buffer, 6-event send minimum, 500-event
//! sample cap, two-strike block threshold).

use crate::risk::DecayPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory (session strike-state store).
    pub data_dir: PathBuf,
    /// Event buffer bounds
    pub buffer: BufferConfig,
    /// Batch dispatch timing
    pub dispatch: DispatchConfig,
    /// Strike hysteresis parameters
    pub strike: StrikeConfig,
    /// Classifier endpoint
    pub transport: TransportConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum events retained per session; oldest are evicted first.
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Tick interval (seconds); a floor of 1 s is always enforced.
    pub interval_secs: u64,
    /// Minimum buffered events for a periodic flush (forced flushes ignore it).
    pub min_events: usize,
    /// Most-recent events sampled into one batch.
    pub sample_cap: usize,
    /// Bound on one awaited send (seconds); a timeout counts as a failed send.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeConfig {
    /// Net bot-like verdicts required before the session is blocked.
    pub block_threshold: u32,
    /// Probability at or above which a response counts as bot-like.
    pub bot_threshold: f64,
    /// Strike decay on a human-like verdict.
    pub decay: DecayPolicy,
    /// Mirror strike state to the session store for cross-reload continuity.
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Collector endpoint URL; when unset the engine runs record/extract
    /// only and never dispatches.
    pub endpoint: Option<String>,
    /// TCP connect timeout (seconds).
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .map(|d| d.join("pointer-sentry"))
                .unwrap_or_else(|| PathBuf::from(".pointer-sentry")),
            buffer: BufferConfig::default(),
            dispatch: DispatchConfig::default(),
            strike: StrikeConfig::default(),
            transport: TransportConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 5000 }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            min_events: 6,
            sample_cap: 500,
            timeout_secs: 10,
        }
    }
}

impl Default for StrikeConfig {
    fn default() -> Self {
        Self {
            block_threshold: 2,
            bot_threshold: 0.5,
            decay: DecayPolicy::StepDown,
            persist: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl EngineConfig {
    /// Load from JSON file if present; otherwise return default.
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<EngineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
