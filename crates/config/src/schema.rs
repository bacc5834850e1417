use std::collections::HashMap;

use {
    serde::{Deserialize, Serialize},
    tracing::warn,
};

/// Lowest edit spacing accepted for a draft stream, in milliseconds.
pub const MIN_THROTTLE_MS: u64 = 50;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelixConfig {
    /// Defaults shared by every draft stream.
    pub draft: DraftStreamConfig,
    /// Per-channel account settings.
    pub channels: ChannelsConfig,
}

/// Channel accounts. Each channel crate parses its own account shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Telegram bot accounts, keyed by account ID.
    #[serde(default)]
    pub telegram: HashMap<String, serde_json::Value>,
}

/// Tuning for edit-in-place draft streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftStreamConfig {
    /// Minimum spacing between two edits of the same draft (ms).
    pub throttle_ms: u64,
    /// Maximum characters held by one physical message.
    pub max_chars: usize,
    /// How far back from `max_chars` a seal may look for a clean break.
    pub seal_lookback_chars: usize,
    /// Characters a chunk needs before its message is created outside of a
    /// seal or flush. `0` sends as soon as there is any text.
    pub min_initial_chars: usize,
    /// Retries after the first failed send/edit.
    pub max_retries: u32,
    /// First retry delay (ms); doubles on every further attempt.
    pub retry_base_ms: u64,
    /// Upper bound for a single retry delay (ms).
    pub retry_max_ms: u64,
}

impl Default for DraftStreamConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 300,
            max_chars: 4096,
            seal_lookback_chars: 200,
            min_initial_chars: 0,
            max_retries: 3,
            retry_base_ms: 250,
            retry_max_ms: 5_000,
        }
    }
}

impl DraftStreamConfig {
    /// Clamp values the streamer cannot work with.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.throttle_ms < MIN_THROTTLE_MS {
            warn!(
                throttle_ms = self.throttle_ms,
                min = MIN_THROTTLE_MS,
                "draft throttle too small, clamping"
            );
            self.throttle_ms = MIN_THROTTLE_MS;
        }
        if self.max_chars == 0 {
            warn!("draft max_chars is 0, using 1");
            self.max_chars = 1;
        }
        if self.retry_max_ms < self.retry_base_ms {
            warn!(
                retry_base_ms = self.retry_base_ms,
                retry_max_ms = self.retry_max_ms,
                "draft retry_max_ms below retry_base_ms, raising it"
            );
            self.retry_max_ms = self.retry_base_ms;
        }
        self
    }
}
