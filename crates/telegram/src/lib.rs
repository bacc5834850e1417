//! Telegram channel for helix draft streams.
//!
//! [`TelegramDraftChannel`] implements `DraftChannel` on top of teloxide's
//! `sendMessage`/`editMessageText`; [`TelegramDrafts`] opens streams for one
//! configured bot account.

pub mod config;
pub mod drafts;
pub mod error;
pub mod outbound;

pub use {
    config::{StreamMode, TelegramAccountConfig},
    drafts::TelegramDrafts,
    error::{Error, Result},
    outbound::TelegramDraftChannel,
};
