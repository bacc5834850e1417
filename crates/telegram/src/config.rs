use {
    helix_config::DraftStreamConfig,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Telegram's hard limit for the text of one message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// How streaming responses are delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Edit the message in place as text arrives.
    #[default]
    EditInPlace,
    /// No intermediate edits: messages appear only when a chunk is sealed or
    /// the stream is flushed.
    Off,
}

/// Configuration for a single Telegram bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramAccountConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// How streaming responses are delivered.
    pub stream_mode: StreamMode,

    /// Minimum interval between edit-in-place updates (ms).
    pub edit_throttle_ms: u64,

    /// Characters a draft needs before its message is first sent.
    pub stream_min_initial_chars: usize,

    /// Length at which a draft continues in a new message. Never above
    /// [`TELEGRAM_MAX_MESSAGE_LEN`].
    pub max_message_chars: usize,

    /// Send messages without a notification sound.
    pub silent: bool,
}

impl std::fmt::Debug for TelegramAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramAccountConfig")
            .field("token", &"[REDACTED]")
            .field("stream_mode", &self.stream_mode)
            .field("edit_throttle_ms", &self.edit_throttle_ms)
            .field("max_message_chars", &self.max_message_chars)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for TelegramAccountConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            stream_mode: StreamMode::default(),
            edit_throttle_ms: 300,
            stream_min_initial_chars: 30,
            max_message_chars: TELEGRAM_MAX_MESSAGE_LEN,
            silent: false,
        }
    }
}

impl TelegramAccountConfig {
    /// Draft settings for this account: `base` with the account's throttle,
    /// length limit and streaming mode applied.
    #[must_use]
    pub fn draft_config(&self, base: &DraftStreamConfig) -> DraftStreamConfig {
        let min_initial_chars = match self.stream_mode {
            StreamMode::EditInPlace => self.stream_min_initial_chars,
            StreamMode::Off => usize::MAX,
        };
        DraftStreamConfig {
            throttle_ms: self.edit_throttle_ms,
            max_chars: self.max_message_chars.clamp(1, TELEGRAM_MAX_MESSAGE_LEN),
            min_initial_chars,
            ..base.clone()
        }
        .normalized()
    }

    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn default_config() {
        let cfg = TelegramAccountConfig::default();
        assert_eq!(cfg.stream_mode, StreamMode::EditInPlace);
        assert_eq!(cfg.edit_throttle_ms, 300);
        assert_eq!(cfg.stream_min_initial_chars, 30);
        assert_eq!(cfg.max_message_chars, 4096);
        assert!(!cfg.silent);
        assert!(!cfg.has_token());
    }

    #[test]
    fn deserialize_from_json() {
        let json = r#"{
            "token": "123:ABC",
            "stream_mode": "off",
            "silent": true
        }"#;
        let cfg: TelegramAccountConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.stream_mode, StreamMode::Off);
        assert!(cfg.silent);
        // defaults for unspecified fields
        assert_eq!(cfg.edit_throttle_ms, 300);
    }

    #[test]
    fn serialize_roundtrip() {
        let cfg = TelegramAccountConfig {
            token: Secret::new("tok".into()),
            max_message_chars: 2000,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: TelegramAccountConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.max_message_chars, 2000);
        assert_eq!(cfg2.token.expose_secret(), "tok");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = TelegramAccountConfig {
            token: Secret::new("123:SECRET".into()),
            ..Default::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[rstest]
    #[case(1000, 1000)]
    #[case(4096, 4096)]
    #[case(10_000, 4096)]
    #[case(0, 1)]
    fn draft_config_clamps_message_length(#[case] configured: usize, #[case] expected: usize) {
        let cfg = TelegramAccountConfig {
            max_message_chars: configured,
            ..Default::default()
        };
        assert_eq!(cfg.draft_config(&DraftStreamConfig::default()).max_chars, expected);
    }

    #[test]
    fn draft_config_keeps_base_retry_settings() {
        let base = DraftStreamConfig {
            max_retries: 7,
            seal_lookback_chars: 64,
            ..Default::default()
        };
        let cfg = TelegramAccountConfig {
            edit_throttle_ms: 1200,
            ..Default::default()
        };
        let draft = cfg.draft_config(&base);
        assert_eq!(draft.throttle_ms, 1200);
        assert_eq!(draft.max_retries, 7);
        assert_eq!(draft.seal_lookback_chars, 64);
        assert_eq!(draft.min_initial_chars, 30);
    }

    #[test]
    fn draft_config_throttle_is_floored() {
        let cfg = TelegramAccountConfig {
            edit_throttle_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            cfg.draft_config(&DraftStreamConfig::default()).throttle_ms,
            helix_config::MIN_THROTTLE_MS
        );
    }

    #[test]
    fn stream_mode_off_holds_new_messages() {
        let cfg = TelegramAccountConfig {
            stream_mode: StreamMode::Off,
            ..Default::default()
        };
        assert_eq!(
            cfg.draft_config(&DraftStreamConfig::default()).min_initial_chars,
            usize::MAX
        );
    }
}
