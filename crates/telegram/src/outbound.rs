use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{ChatId, MessageId, ThreadId},
    },
    tracing::debug,
};

use helix_channels::{DraftChannel, DraftDestination, Error, MessageHandle, Result};

/// `DraftChannel` backed by one Telegram bot.
///
/// Retries are left to the draft stream; every request is issued once and
/// its failure mapped onto the channel error taxonomy.
#[derive(Debug, Clone)]
pub struct TelegramDraftChannel {
    account_id: String,
    bot: Bot,
    silent: bool,
}

impl TelegramDraftChannel {
    pub fn new(account_id: impl Into<String>, bot: Bot, silent: bool) -> Self {
        Self {
            account_id: account_id.into(),
            bot,
            silent,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

#[async_trait]
impl DraftChannel for TelegramDraftChannel {
    async fn send_new(&self, destination: &DraftDestination, text: &str) -> Result<MessageHandle> {
        let chat_id = parse_chat_id(&destination.chat_id)?;
        let mut req = self.bot.send_message(chat_id, text);
        if let Some(thread) = &destination.thread_id {
            req = req.message_thread_id(ThreadId(parse_message_id(thread)?));
        }
        if self.silent {
            req = req.disable_notification(true);
        }
        let message = req
            .await
            .map_err(|e| map_request_error("send message", e))?;

        debug!(
            account_id = %self.account_id,
            chat_id = %destination.chat_id,
            message_id = message.id.0,
            chars = text.chars().count(),
            "telegram draft message sent"
        );
        Ok(MessageHandle {
            destination: destination.clone(),
            message_id: message.id.0.to_string(),
        })
    }

    async fn edit_existing(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        let chat_id = parse_chat_id(&handle.destination.chat_id)?;
        let message_id = parse_message_id(&handle.message_id)?;
        match self.bot.edit_message_text(chat_id, message_id, text).await {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => {
                debug!(
                    account_id = %self.account_id,
                    message_id = %handle.message_id,
                    "telegram draft edit was a no-op"
                );
                Ok(())
            },
            Err(e) => Err(map_request_error("edit message", e)),
        }
    }
}

fn parse_chat_id(raw: &str) -> Result<ChatId> {
    let id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::invalid_input(format!("telegram chat id must be numeric: {raw}")))?;
    Ok(ChatId(id))
}

/// Telegram message IDs are i32.
fn parse_message_id(raw: &str) -> Result<MessageId> {
    Ok(MessageId(raw.trim().parse::<i32>()?))
}

fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

/// Sort a teloxide failure into retryable and permanent channel errors.
fn map_request_error(context: &str, error: RequestError) -> Error {
    match error {
        RequestError::RetryAfter(wait) => Error::rate_limited(wait.duration()),
        RequestError::Api(api) => Error::rejected(format!("{context}: {api}")),
        RequestError::MigrateToChatId(new_id) => {
            Error::rejected(format!("{context}: chat migrated to {}", new_id.0))
        },
        other => Error::external(context, other),
    }
}
