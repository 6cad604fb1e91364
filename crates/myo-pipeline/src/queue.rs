//! Bounded stage-to-stage queues and latest-value registers
//!
//! Stage handoff goes through bounded FIFOs with non-blocking drop-newest
//! enqueue and non-blocking dequeue. Snapshot reads for display go through
//! dedicated single-slot overwrite registers, keeping delivery and
//! snapshot semantics separate.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::watch;

/// Outcome of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Item enqueued
    Delivered,
    /// Queue full; the incoming item was dropped (drop-newest)
    DroppedNewest,
    /// Consumer side is gone
    Disconnected,
}

/// Create a bounded FIFO of fixed capacity
pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Producing end of a bounded FIFO
pub struct QueueProducer<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        QueueProducer { tx: self.tx.clone() }
    }
}

impl<T> QueueProducer<T> {
    /// Non-blocking enqueue. A full queue drops the incoming item and the
    /// producer continues.
    pub fn push(&self, item: T) -> PushResult {
        match self.tx.try_send(item) {
            Ok(()) => PushResult::Delivered,
            Err(TrySendError::Full(_)) => PushResult::DroppedNewest,
            Err(TrySendError::Closed(_)) => PushResult::Disconnected,
        }
    }

    /// Fixed queue capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consuming end of a bounded FIFO
pub struct QueueConsumer<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> QueueConsumer<T> {
    /// Non-blocking dequeue. `None` when the queue is currently empty (the
    /// stage skips this iteration) or the producer side is gone.
    pub fn poll(&mut self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a single-slot overwrite register holding `initial`
pub fn register<T>(initial: T) -> (LatestWriter<T>, LatestReader<T>) {
    let (tx, rx) = watch::channel(initial);
    (LatestWriter { tx }, LatestReader { rx })
}

/// Writing end of a latest-value register
pub struct LatestWriter<T> {
    tx: watch::Sender<T>,
}

impl<T> LatestWriter<T> {
    /// Overwrite the register with the newest value
    pub fn publish(&self, value: T) {
        let _ = self.tx.send_replace(value);
    }
}

/// Reading end of a latest-value register. Cloneable so any number of
/// independent readers can observe current state at their own pace.
pub struct LatestReader<T> {
    rx: watch::Receiver<T>,
}

impl<T> Clone for LatestReader<T> {
    fn clone(&self) -> Self {
        LatestReader { rx: self.rx.clone() }
    }
}

impl<T: Clone> LatestReader<T> {
    /// Snapshot the most recent value without consuming it
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }
}
