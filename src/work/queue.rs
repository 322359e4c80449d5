//! Shared queues between the driver and the two worker pools.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use super::item::{Stage1Item, Stage2Item};

/// Pre-seeded stage-1 work; drained without blocking by the device workers.
#[derive(Debug, Default)]
pub struct Stage1Queue {
    items: Mutex<VecDeque<Stage1Item>>,
}

impl Stage1Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: Stage1Item) {
        debug!(item = %item, "pushing stage-1 work unit");
        self.lock().push_back(item);
    }

    /// Next item, or `None` once the queue is drained.
    pub fn try_pop(&self) -> Option<Stage1Item> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Stage1Item>> {
        // A panicking holder cannot leave the deque half-updated.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create the stage-2 stream. Closing the sender side (dropping every
/// [`Stage2Sender`]) is the end-of-stream signal for the receiver.
pub fn stage2_queue() -> (Stage2Sender, Stage2Receiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Stage2Sender { tx }, Stage2Receiver { rx })
}

/// Producer handle for stage-2 work.
#[derive(Debug, Clone)]
pub struct Stage2Sender {
    tx: mpsc::UnboundedSender<Stage2Item>,
}

impl Stage2Sender {
    /// Push one item. Returns `false` if the consumer is already gone.
    pub fn push(&self, item: Stage2Item) -> bool {
        debug!(item = %item, "pushing stage-2 work unit");
        self.tx.send(item).is_ok()
    }

    /// Signal end-of-stream from this handle.
    pub fn close(self) {
        debug!("closing stage-2 stream");
        drop(self.tx);
    }
}

/// Consumer handle for stage-2 work.
#[derive(Debug)]
pub struct Stage2Receiver {
    rx: mpsc::UnboundedReceiver<Stage2Item>,
}

impl Stage2Receiver {
    /// Wait for the next item; `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<Stage2Item> {
        self.rx.recv().await
    }
}
