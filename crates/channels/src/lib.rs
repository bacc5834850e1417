//! Channel capability and edit-in-place draft streaming.
//!
//! A channel (Telegram, Discord, ...) only has to implement [`DraftChannel`]:
//! create a message and edit it by handle. [`DraftStream`] projects a
//! growing block of text onto those two calls while respecting the
//! platform's edit rate and message length limits.

pub mod draft;
pub mod error;
pub mod plugin;

pub use {
    draft::{DraftHooks, DraftOutcome, DraftStream, DraftStreamBuilder},
    error::{Error, Result},
    plugin::{DraftChannel, DraftDestination, MessageHandle},
};
