use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Producer side: holds only the latest cumulative text.
pub(crate) struct CoalescingBuffer {
    tx: watch::Sender<String>,
    closed: AtomicBool,
}

/// Dispatcher side of the buffer.
pub(crate) struct BufferReader {
    rx: watch::Receiver<String>,
}

impl CoalescingBuffer {
    pub(crate) fn new() -> (Self, BufferReader) {
        let (tx, rx) = watch::channel(String::new());
        let buffer = Self {
            tx,
            closed: AtomicBool::new(false),
        };
        (buffer, BufferReader { rx })
    }

    /// Replace the pending text. Returns `false` once the buffer is closed.
    ///
    /// Offering the text that is already pending does not wake the reader.
    pub(crate) fn offer(&self, text: &str) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send_if_modified(|pending| {
            if pending == text {
                false
            } else {
                text.clone_into(pending);
                true
            }
        });
        true
    }

    /// Ignore every later offer.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl BufferReader {
    /// The latest pending text; marks it as seen.
    pub(crate) fn latest(&mut self) -> String {
        self.rx.borrow_and_update().clone()
    }

    /// Resolve once unseen text is pending. Returns `false` when the
    /// producer side has been dropped.
    pub(crate) async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
