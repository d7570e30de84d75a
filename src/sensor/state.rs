// src/sensor/state.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Durable per-source settings: the kill-switch, the rate-limit window and
/// whatever source-specific keys the settings document carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    #[serde(default)]
    pub offline: bool,
    /// Epoch seconds of the last upstream request.
    #[serde(default)]
    pub last_used: i64,
    /// Minimum seconds between upstream requests.
    pub request_delta: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SensorState {
    pub fn new(request_delta: i64) -> Self {
        Self {
            offline: false,
            last_used: 0,
            request_delta,
            extra: Map::new(),
        }
    }

    /// Admission control: a request is allowed iff the source is online and
    /// strictly more than `request_delta` seconds passed since `last_used`.
    pub fn request_allowed(&self, now: i64) -> bool {
        !self.offline && now.saturating_sub(self.last_used) > self.request_delta
    }

    /// Source-specific keys, opaque to the core.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
