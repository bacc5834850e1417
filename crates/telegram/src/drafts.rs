use std::{sync::Arc, time::Duration};

use {
    helix_channels::{DraftDestination, DraftStream, DraftStreamBuilder},
    helix_config::{DraftStreamConfig, HelixConfig},
    secrecy::ExposeSecret,
    tracing::info,
};

use crate::{
    config::TelegramAccountConfig,
    error::{Error, Result},
    outbound::TelegramDraftChannel,
};

/// HTTP timeout for a single Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens draft streams through one Telegram bot account.
#[derive(Debug, Clone)]
pub struct TelegramDrafts {
    account_id: String,
    draft: DraftStreamConfig,
    channel: Arc<TelegramDraftChannel>,
}

impl TelegramDrafts {
    pub fn new(
        account_id: impl Into<String>,
        config: &TelegramAccountConfig,
        base: &DraftStreamConfig,
    ) -> Result<Self> {
        let account_id = account_id.into();
        if !config.has_token() {
            return Err(Error::message(format!(
                "telegram account '{account_id}' has no bot token"
            )));
        }

        let client = teloxide::net::default_reqwest_settings()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let bot = teloxide::Bot::with_client(config.token.expose_secret(), client);
        let draft = config.draft_config(base);

        info!(
            account_id = %account_id,
            stream_mode = ?config.stream_mode,
            throttle_ms = draft.throttle_ms,
            max_chars = draft.max_chars,
            "telegram drafts ready"
        );
        Ok(Self {
            channel: Arc::new(TelegramDraftChannel::new(&account_id, bot, config.silent)),
            account_id,
            draft,
        })
    }

    /// Look up `account_id` under `channels.telegram` and build it with the
    /// file's draft defaults.
    pub fn from_config(account_id: &str, config: &HelixConfig) -> Result<Self> {
        let raw = config
            .channels
            .telegram
            .get(account_id)
            .ok_or_else(|| Error::message(format!("unknown telegram account '{account_id}'")))?;
        let account: TelegramAccountConfig = serde_json::from_value(raw.clone())?;
        Self::new(account_id, &account, &config.draft)
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Effective settings for streams opened here.
    pub fn draft_config(&self) -> &DraftStreamConfig {
        &self.draft
    }

    /// Builder preloaded with this account's channel and settings.
    pub fn builder(&self, destination: DraftDestination) -> DraftStreamBuilder {
        DraftStream::builder(self.channel.clone(), destination).with_config(self.draft.clone())
    }

    /// Start a stream to `destination`.
    pub fn open(&self, destination: DraftDestination) -> DraftStream {
        self.builder(destination).start()
    }
}
