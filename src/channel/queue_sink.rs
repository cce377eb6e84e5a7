//! Queue-backed receive sink.
//!
//! Bridges the interrupt-context delivery path to a synchronous
//! consumer loop over an `embassy-sync` bounded channel: the rx
//! interrupt copies each message out of the mailbox and `try_send`s
//! it; the consumer drains with [`QueueSink::try_recv`] at its own
//! pace. When the queue is full the message is dropped and counted —
//! the interrupt handler must never block.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::channel::MsgSink;
use crate::link::SubChannelId;
use crate::mailbox::MSG_CAP;

/// Queue depth of a [`QueueSink`].
pub const QUEUE_SINK_DEPTH: usize = 8;

/// One received message, copied out of the mailbox.
pub struct RxMessage {
    pub sub: SubChannelId,
    pub data: heapless::Vec<u8, MSG_CAP>,
}

/// A [`MsgSink`] that parks messages on a bounded channel for a
/// caller-context consumer.
pub struct QueueSink {
    queue: Channel<CriticalSectionRawMutex, RxMessage, QUEUE_SINK_DEPTH>,
    dropped: AtomicU32,
}

impl QueueSink {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Take the next queued message, if any.
    pub fn try_recv(&self) -> Option<RxMessage> {
        self.queue.try_receive().ok()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for QueueSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgSink for QueueSink {
    fn on_message(&self, sub: SubChannelId, data: &[u8]) -> usize {
        let mut copy = heapless::Vec::new();
        if copy.extend_from_slice(data).is_err() {
            // Larger than MSG_CAP cannot happen via the mailbox.
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return 0;
        }
        let msg = RxMessage { sub, data: copy };
        if self.queue.try_send(msg).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("chan: queue sink full, dropping frame on sub {}", sub);
            return 0;
        }
        data.len()
    }
}
