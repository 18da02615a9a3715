//! Bounded hand-off from the radio receive path to the link worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use tokio::sync::Notify;

use crate::core::{InitError, MacAddress};
use crate::link::{InboundEnvelope, LinkClock};
use crate::radio::ReceiveCallback;

/// Fixed-capacity FIFO of inbound datagrams.
///
/// The producer side never blocks and never waits on a lock: when the queue
/// is full the newest datagram is dropped and counted. The single consumer
/// is the link worker.
#[derive(Debug, Clone)]
pub struct InboundQueue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    queue: ArrayQueue<InboundEnvelope>,
    notify: Notify,
    accepted: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl InboundQueue {
    /// Create a queue holding up to `capacity` datagrams.
    pub fn new(capacity: usize) -> Result<Self, InitError> {
        if capacity == 0 {
            return Err(InitError::Queue("inbound"));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                queue: ArrayQueue::new(capacity),
                notify: Notify::new(),
                accepted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        })
    }

    /// Enqueue a datagram. Returns `false` if the queue was full.
    pub fn push(&self, envelope: InboundEnvelope) -> bool {
        if self.inner.queue.push(envelope).is_err() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.inner.accepted.fetch_add(1, Ordering::Relaxed);
        self.inner.notify.notify_one();
        true
    }

    /// Wrap raw bytes and enqueue them.
    ///
    /// Empty or oversized datagrams are counted as rejected.
    pub fn push_raw(&self, sender: MacAddress, data: &[u8], received_at: u32) -> bool {
        match InboundEnvelope::new(sender, data, received_at) {
            Some(envelope) => self.push(envelope),
            None => {
                self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Radio callback feeding this queue, stamping arrivals with `clock`.
    pub fn receive_callback(&self, clock: LinkClock) -> ReceiveCallback {
        let queue = self.clone();
        Arc::new(move |sender: MacAddress, data: &[u8]| {
            queue.push_raw(sender, data, clock.now_ms());
        })
    }

    /// Dequeue without waiting.
    pub fn try_recv(&self) -> Option<InboundEnvelope> {
        self.inner.queue.pop()
    }

    /// Dequeue the oldest datagram, waiting for one if necessary.
    pub async fn recv(&self) -> InboundEnvelope {
        loop {
            if let Some(envelope) = self.inner.queue.pop() {
                return envelope;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Datagrams waiting.
    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Check if no datagram is waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.inner.queue.capacity()
    }

    /// Datagrams enqueued so far.
    pub fn accepted(&self) -> u64 {
        self.inner.accepted.load(Ordering::Relaxed)
    }

    /// Datagrams lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Datagrams that could not be wrapped at all.
    pub fn rejected(&self) -> u64 {
        self.inner.rejected.load(Ordering::Relaxed)
    }
}
