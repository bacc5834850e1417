//! Edit-in-place draft streaming.
//!
//! A [`DraftStream`] mirrors a continuously growing block of text into chat
//! messages:
//!
//! - `update` stores the latest cumulative text; intermediate values are
//!   superseded, never queued.
//! - edits are spaced at least `throttle_ms` apart, and a change is never
//!   dropped: the latest text goes out within one throttle window.
//! - when the text outgrows `max_chars`, the current message is sealed at a
//!   clean break and the rest continues in a new message.
//! - `flush` lands the final text; `stop` abandons everything not yet sent.

mod buffer;
mod chunk;
mod session;
mod throttle;

use std::{fmt, sync::Arc, time::Duration};

use {
    helix_config::DraftStreamConfig,
    serde::Serialize,
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, trace, warn},
};

use crate::plugin::{DraftChannel, DraftDestination, MessageHandle};

use self::{
    buffer::CoalescingBuffer,
    session::{Command, DraftSession, DraftWorker},
    throttle::RetryPolicy,
};

/// Observer callback for the `log`/`warn` side channels.
pub type DraftLogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional side channels that receive the same messages as `tracing`.
#[derive(Clone, Default)]
pub struct DraftHooks {
    pub log: Option<DraftLogFn>,
    pub warn: Option<DraftLogFn>,
}

impl fmt::Debug for DraftHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftHooks")
            .field("log", &self.log.is_some())
            .field("warn", &self.warn.is_some())
            .finish()
    }
}

/// Final state of a draft stream after `flush` or `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DraftOutcome {
    pub stream_id: String,
    /// Physical messages in order, sealed chunks first.
    pub messages: Vec<MessageHandle>,
    /// Index of the last chunk the stream worked on.
    pub chunk_index: usize,
    /// The full text landed: flushed, every seal applied, final chunk sent.
    pub delivered: bool,
    /// Ended through `flush` rather than `stop` or drop.
    pub flushed: bool,
}

enum WorkerSlot {
    Running(JoinHandle<DraftOutcome>),
    Finished(DraftOutcome),
}

/// Builder for a [`DraftStream`].
pub struct DraftStreamBuilder {
    channel: Arc<dyn DraftChannel>,
    destination: DraftDestination,
    stream_id: Option<String>,
    config: DraftStreamConfig,
    hooks: DraftHooks,
}

impl DraftStreamBuilder {
    #[must_use]
    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: DraftStreamConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.log = Some(Arc::new(log));
        self
    }

    #[must_use]
    pub fn with_warn(mut self, warn: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.warn = Some(Arc::new(warn));
        self
    }

    /// Spawn the stream's worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(self) -> DraftStream {
        let config = self.config.normalized();
        let stream_id = self
            .stream_id
            .unwrap_or_else(|| self.destination.to_string());
        let (buffer, reader) = CoalescingBuffer::new();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        info!(
            stream_id = %stream_id,
            destination = %self.destination,
            throttle_ms = config.throttle_ms,
            max_chars = config.max_chars,
            "draft stream started"
        );

        let worker = DraftWorker {
            stream_id: stream_id.clone(),
            session: DraftSession::new(
                self.destination,
                Duration::from_millis(config.throttle_ms),
            ),
            channel: self.channel,
            retry: RetryPolicy::from_config(&config),
            config,
            hooks: self.hooks,
            buffer: reader,
            commands: commands_rx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());

        DraftStream {
            stream_id,
            buffer,
            commands: commands_tx,
            cancel,
            worker: tokio::sync::Mutex::new(WorkerSlot::Running(handle)),
        }
    }
}

/// Handle to one logical draft; see the module docs.
pub struct DraftStream {
    stream_id: String,
    buffer: CoalescingBuffer,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    worker: tokio::sync::Mutex<WorkerSlot>,
}

impl DraftStream {
    pub fn builder(
        channel: Arc<dyn DraftChannel>,
        destination: DraftDestination,
    ) -> DraftStreamBuilder {
        DraftStreamBuilder {
            channel,
            destination,
            stream_id: None,
            config: DraftStreamConfig::default(),
            hooks: DraftHooks::default(),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Supply the full text produced so far. Never blocks; ignored once the
    /// stream has been flushed or stopped.
    pub fn update(&self, text: impl AsRef<str>) {
        if self.cancel.is_cancelled() || !self.buffer.offer(text.as_ref()) {
            trace!(stream_id = %self.stream_id, "draft update after close ignored");
        }
    }

    /// Deliver the final text and end the stream.
    ///
    /// Waits for any in-flight edit, then sends the latest text without
    /// waiting for the throttle. Calling it again returns the same outcome.
    pub async fn flush(&self) -> DraftOutcome {
        let mut slot = self.worker.lock().await;
        let handle = match &mut *slot {
            WorkerSlot::Finished(outcome) => return outcome.clone(),
            WorkerSlot::Running(handle) => handle,
        };

        self.buffer.close();
        // The worker may already be gone after `stop`; its outcome still stands.
        let _ = self.commands.send(Command::Flush);
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(stream_id = %self.stream_id, error = %e, "draft worker failed");
                DraftOutcome {
                    stream_id: self.stream_id.clone(),
                    ..DraftOutcome::default()
                }
            },
        };
        *slot = WorkerSlot::Finished(outcome.clone());
        outcome
    }

    /// Abort: no further edits are scheduled. An edit already in flight
    /// completes but no longer changes the stream's state.
    pub fn stop(&self) {
        self.buffer.close();
        self.cancel.cancel();
    }

    /// Whether the stream has been flushed or stopped and ignores `update`.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.buffer.is_closed()
    }
}

impl Drop for DraftStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
