//! Per-stream state and the worker task that owns it.
//!
//! The worker is the only place a [`DraftSession`] is mutated. Edits are
//! awaited inline, so at most one channel call is outstanding per stream and
//! every dispatch reads the latest pending text at fire time.

use std::{collections::VecDeque, pin::Pin, sync::Arc, time::Duration};

use {
    helix_config::DraftStreamConfig,
    tokio::{
        sync::mpsc,
        time::{Instant, Sleep},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    draft::{
        DraftHooks, DraftOutcome,
        buffer::BufferReader,
        chunk,
        throttle::{RetryPolicy, Throttle},
    },
    plugin::{DraftChannel, DraftDestination, MessageHandle},
};

/// Requests from the [`crate::DraftStream`] handle to its worker.
#[derive(Debug)]
pub(crate) enum Command {
    Flush,
}

/// Deferred seal retries attempted before a chunk's final edit is abandoned.
const MAX_RESEAL_ROUNDS: u32 = 3;

/// A sealed chunk whose final edit failed and is retried later.
#[derive(Debug, Clone)]
struct PendingSeal {
    handle: MessageHandle,
    text: String,
    chunk_index: usize,
    rounds: u32,
}

/// Mutable state of one logical draft.
pub(crate) struct DraftSession {
    destination: DraftDestination,
    /// Message currently being edited; created lazily on first send.
    active_handle: Option<MessageHandle>,
    /// Chunk-local text already shown in `active_handle`.
    sent_text: String,
    /// Byte offset in the cumulative text where the current chunk starts.
    chunk_start: usize,
    chunk_index: usize,
    throttle: Throttle,
    timer: Option<Pin<Box<Sleep>>>,
    stopped: bool,
    flushed: bool,
    sealed: Vec<MessageHandle>,
    unsealed: VecDeque<PendingSeal>,
    abandoned_seals: usize,
}

impl DraftSession {
    pub(crate) fn new(destination: DraftDestination, throttle: Duration) -> Self {
        Self {
            destination,
            active_handle: None,
            sent_text: String::new(),
            chunk_start: 0,
            chunk_index: 0,
            throttle: Throttle::new(throttle),
            timer: None,
            stopped: false,
            flushed: false,
            sealed: Vec::new(),
            unsealed: VecDeque::new(),
            abandoned_seals: 0,
        }
    }

    /// Slice of the cumulative text that belongs to the current chunk.
    fn chunk_text<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.chunk_start..)
    }

    /// Close the current chunk at `cut` bytes into it and open the next one.
    fn advance_chunk(&mut self, cut: usize) {
        if let Some(handle) = self.active_handle.take() {
            self.sealed.push(handle);
        }
        self.chunk_start += cut;
        self.chunk_index += 1;
        self.sent_text.clear();
    }
}

/// Owns a [`DraftSession`] and drives it from buffer changes, the throttle
/// timer, and flush/stop requests.
pub(crate) struct DraftWorker {
    pub(crate) stream_id: String,
    pub(crate) session: DraftSession,
    pub(crate) channel: Arc<dyn DraftChannel>,
    pub(crate) config: DraftStreamConfig,
    pub(crate) retry: RetryPolicy,
    pub(crate) hooks: DraftHooks,
    pub(crate) buffer: BufferReader,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) cancel: CancellationToken,
}

async fn timer_fired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl DraftWorker {
    pub(crate) async fn run(mut self) -> DraftOutcome {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.halt("stopped");
                    break;
                },
                command = self.commands.recv() => match command {
                    Some(Command::Flush) => {
                        self.flush().await;
                        break;
                    },
                    None => {
                        self.halt("stream handle dropped");
                        break;
                    },
                },
                changed = self.buffer.changed() => {
                    if !changed {
                        self.halt("stream handle dropped");
                        break;
                    }
                    self.on_update().await;
                },
                () = timer_fired(&mut self.session.timer) => {
                    self.session.timer = None;
                    self.dispatch().await;
                },
            }
        }
        self.outcome()
    }

    fn is_stopped(&self) -> bool {
        self.session.stopped || self.cancel.is_cancelled()
    }

    fn halt(&mut self, reason: &str) {
        self.session.timer = None;
        self.session.stopped = true;
        self.log(&format!("draft {} halted: {reason}", self.stream_id));
    }

    fn log(&self, message: &str) {
        debug!(stream_id = %self.stream_id, "{message}");
        if let Some(hook) = &self.hooks.log {
            hook(message);
        }
    }

    fn warn(&self, message: &str) {
        warn!(stream_id = %self.stream_id, "{message}");
        if let Some(hook) = &self.hooks.warn {
            hook(message);
        }
    }

    fn arm_timer(&mut self, wait: Duration) {
        self.session.timer = Some(Box::pin(tokio::time::sleep(wait)));
    }

    /// New pending text: dispatch now if the throttle allows, else make sure
    /// exactly one deferred dispatch is scheduled.
    async fn on_update(&mut self) {
        if self.is_stopped() || self.session.timer.is_some() {
            return;
        }
        let wait = self.session.throttle.remaining(Instant::now());
        if wait.is_zero() {
            self.dispatch().await;
        } else {
            self.arm_timer(wait);
        }
    }

    /// One throttled dispatch step, followed by scheduling any deferred
    /// seal into the next free slot.
    async fn dispatch(&mut self) {
        if self.is_stopped() {
            return;
        }
        self.dispatch_step().await;
        if !self.is_stopped() && self.session.timer.is_none() && !self.session.unsealed.is_empty()
        {
            let wait = self.session.throttle.remaining(Instant::now());
            self.arm_timer(wait);
        }
    }

    async fn dispatch_step(&mut self) {
        let text = self.buffer.latest();
        let Some(local) = self.session.chunk_text(&text) else {
            self.warn(&format!(
                "draft {} text no longer extends sealed content, ignoring update",
                self.stream_id
            ));
            return;
        };

        if chunk::exceeds(local, self.config.max_chars) {
            if self.seal(&text).await && !self.is_stopped() {
                // The remainder needs its own message even without new updates.
                let rest = self.session.chunk_text(&text).unwrap_or_default();
                if !rest.is_empty() {
                    let wait = self.session.throttle.remaining(Instant::now());
                    self.arm_timer(wait);
                }
            }
            return;
        }

        if local == self.session.sent_text || local.is_empty() {
            self.retry_one_seal().await;
            return;
        }

        if self.session.active_handle.is_none()
            && chunk::char_len(local) < self.config.min_initial_chars
        {
            debug!(
                stream_id = %self.stream_id,
                chars = chunk::char_len(local),
                min_initial_chars = self.config.min_initial_chars,
                "draft below initial threshold, holding new message"
            );
            return;
        }

        let local = local.to_owned();
        self.deliver(local).await;
    }

    /// Send `text` as the content of the current chunk's message, creating the
    /// message if needed. Updates bookkeeping only while the stream is live.
    ///
    /// Returns whether the text landed. Failures are reported through `warn`
    /// here, so callers only decide what to do next.
    async fn deliver(&mut self, text: String) -> bool {
        let channel = Arc::clone(&self.channel);
        let handle = self.session.active_handle.clone();
        let destination = self.session.destination.clone();
        let operation = if handle.is_some() {
            "edit draft message"
        } else {
            "send draft message"
        };

        let result = self
            .retry
            .run(&self.cancel, operation, || {
                let channel = Arc::clone(&channel);
                let handle = handle.clone();
                let destination = destination.clone();
                let text = text.clone();
                async move {
                    match handle {
                        Some(handle) => channel.edit_existing(&handle, &text).await.map(|()| None),
                        None => channel.send_new(&destination, &text).await.map(Some),
                    }
                }
            })
            .await;

        if self.is_stopped() {
            self.log(&format!(
                "draft {} {operation} completed after stop, state frozen",
                self.stream_id
            ));
            return result.is_ok();
        }
        self.session.throttle.mark(Instant::now());

        match result {
            Ok(created) => {
                if let Some(handle) = created {
                    self.session.active_handle = Some(handle);
                }
                debug!(
                    stream_id = %self.stream_id,
                    chunk_index = self.session.chunk_index,
                    chars = chunk::char_len(&text),
                    operation,
                    "draft dispatched"
                );
                self.session.sent_text = text;
                true
            },
            Err(e) => {
                self.warn(&format!(
                    "draft {} {operation} failed for chunk {}: {e}",
                    self.stream_id, self.session.chunk_index
                ));
                false
            },
        }
    }

    /// Finalize the current chunk at a safe boundary and open the next one.
    ///
    /// Returns `false` when the chunk could not be advanced (its message was
    /// never created, or the stream stopped meanwhile).
    async fn seal(&mut self, text: &str) -> bool {
        let Some(local) = self.session.chunk_text(text) else {
            return false;
        };
        let cut = chunk::seal_boundary(
            local,
            self.config.max_chars,
            self.config.seal_lookback_chars,
        );
        let head = local[..cut].to_owned();
        let chunk_index = self.session.chunk_index;

        if head != self.session.sent_text && !self.deliver(head.clone()).await {
            if self.is_stopped() {
                return false;
            }
            match self.session.active_handle.clone() {
                Some(handle) => {
                    self.warn(&format!(
                        "draft {} seal of chunk {chunk_index} deferred",
                        self.stream_id
                    ));
                    self.session.unsealed.push_back(PendingSeal {
                        handle,
                        text: head,
                        chunk_index,
                        rounds: 0,
                    });
                },
                None => return false,
            }
        }
        if self.is_stopped() {
            return false;
        }

        self.session.advance_chunk(cut);
        info!(
            stream_id = %self.stream_id,
            sealed_chunk = chunk_index,
            sealed_chars = chunk::char_len(&local[..cut]),
            "draft chunk sealed"
        );
        true
    }

    /// Retry the oldest deferred seal. Returns `true` on success.
    async fn retry_one_seal(&mut self) -> bool {
        let Some(mut pending) = self.session.unsealed.pop_front() else {
            return false;
        };
        let channel = Arc::clone(&self.channel);
        let result = self
            .retry
            .run(&self.cancel, "reseal draft message", || {
                let channel = Arc::clone(&channel);
                let handle = pending.handle.clone();
                let text = pending.text.clone();
                async move { channel.edit_existing(&handle, &text).await }
            })
            .await;

        if self.is_stopped() {
            return result.is_ok();
        }
        self.session.throttle.mark(Instant::now());
        match result {
            Ok(()) => {
                self.log(&format!(
                    "draft {} chunk {} resealed",
                    self.stream_id, pending.chunk_index
                ));
                true
            },
            Err(e) => {
                pending.rounds += 1;
                if pending.rounds >= MAX_RESEAL_ROUNDS || !e.is_transient() {
                    self.warn(&format!(
                        "draft {} giving up on sealing chunk {}: {e}",
                        self.stream_id, pending.chunk_index
                    ));
                    self.session.abandoned_seals += 1;
                } else {
                    self.warn(&format!(
                        "draft {} reseal of chunk {} failed: {e}",
                        self.stream_id, pending.chunk_index
                    ));
                    self.session.unsealed.push_back(pending);
                }
                false
            },
        }
    }

    /// Terminal success path: bypass the throttle and land the final text.
    async fn flush(&mut self) {
        self.session.timer = None;

        loop {
            if self.is_stopped() {
                break;
            }
            let text = self.buffer.latest();
            let Some(local) = self.session.chunk_text(&text) else {
                break;
            };
            if chunk::exceeds(local, self.config.max_chars) {
                if self.seal(&text).await {
                    continue;
                }
                break;
            }
            if !local.is_empty() && local != self.session.sent_text {
                let local = local.to_owned();
                self.deliver(local).await;
            }
            break;
        }

        let attempts = self.session.unsealed.len();
        for _ in 0..attempts {
            if self.is_stopped() {
                break;
            }
            self.retry_one_seal().await;
        }

        if !self.is_stopped() {
            self.session.flushed = true;
        }
        self.session.stopped = true;
        self.log(&format!("draft {} flushed", self.stream_id));
    }

    fn outcome(&mut self) -> DraftOutcome {
        let text = self.buffer.latest();
        let final_landed = self
            .session
            .chunk_text(&text)
            .is_some_and(|local| local == self.session.sent_text);
        let mut messages = self.session.sealed.clone();
        messages.extend(self.session.active_handle.clone());

        let outcome = DraftOutcome {
            stream_id: self.stream_id.clone(),
            messages,
            chunk_index: self.session.chunk_index,
            delivered: self.session.flushed
                && final_landed
                && self.session.unsealed.is_empty()
                && self.session.abandoned_seals == 0,
            flushed: self.session.flushed,
        };
        info!(
            stream_id = %outcome.stream_id,
            messages = outcome.messages.len(),
            delivered = outcome.delivered,
            flushed = outcome.flushed,
            "draft stream finished"
        );
        outcome
    }
}
