use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::Result;

/// Where a draft is delivered: a chat, optionally narrowed to a thread/topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftDestination {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl DraftDestination {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            thread_id: None,
        }
    }

    #[must_use]
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

impl std::fmt::Display for DraftDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.thread_id {
            Some(thread) => write!(f, "{}/{}", self.chat_id, thread),
            None => f.write_str(&self.chat_id),
        }
    }
}

/// A physical message created by a channel. Carries its destination so that
/// editing needs nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub destination: DraftDestination,
    pub message_id: String,
}

/// The two chat operations a draft stream depends on.
///
/// Both may fail transiently; the stream retries according to
/// [`crate::Error::is_transient`].
#[async_trait]
pub trait DraftChannel: Send + Sync {
    /// Create a new message and return its handle.
    async fn send_new(&self, destination: &DraftDestination, text: &str) -> Result<MessageHandle>;

    /// Replace the content of an existing message.
    async fn edit_existing(&self, handle: &MessageHandle, text: &str) -> Result<()>;
}
