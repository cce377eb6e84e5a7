//! Runtime transport metrics.
//!
//! One [`Counters`] block per physical link, shared by the message
//! channel and the RPC port sitting on it. Counters are bumped with
//! relaxed atomics so interrupt handlers can report anomalies that
//! have no caller to return an error to (stray interrupts, dropped
//! frames, reply-queue overflow). A [`CounterSnapshot`] is cheap to
//! take and serializable for a diagnostics RPC response.

use core::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counter block. All methods take `&self` and are safe from
/// interrupt context.
#[derive(Debug, Default)]
pub struct Counters {
    sends: AtomicU32,
    send_busy: AtomicU32,
    tx_acks: AtomicU32,
    rx_frames: AtomicU32,
    rx_dropped: AtomicU32,
    stray_irqs: AtomicU32,
    reply_overflow: AtomicU32,
    malformed_frames: AtomicU32,
    unsolicited_dropped: AtomicU32,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[doc = concat!("Increment `", stringify!($field), "`.")]
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            sends: AtomicU32::new(0),
            send_busy: AtomicU32::new(0),
            tx_acks: AtomicU32::new(0),
            rx_frames: AtomicU32::new(0),
            rx_dropped: AtomicU32::new(0),
            stray_irqs: AtomicU32::new(0),
            reply_overflow: AtomicU32::new(0),
            malformed_frames: AtomicU32::new(0),
            unsolicited_dropped: AtomicU32::new(0),
        }
    }

    bump! {
        count_send => sends,
        count_send_busy => send_busy,
        count_tx_ack => tx_acks,
        count_rx_frame => rx_frames,
        count_rx_dropped => rx_dropped,
        count_stray_irq => stray_irqs,
        count_reply_overflow => reply_overflow,
        count_malformed => malformed_frames,
        count_unsolicited_dropped => unsolicited_dropped,
    }

    /// Consistent-enough point-in-time copy. Individual fields are read
    /// relaxed; the snapshot is for trend reporting, not accounting.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            sends: self.sends.load(Ordering::Relaxed),
            send_busy: self.send_busy.load(Ordering::Relaxed),
            tx_acks: self.tx_acks.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            stray_irqs: self.stray_irqs.load(Ordering::Relaxed),
            reply_overflow: self.reply_overflow.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            unsolicited_dropped: self.unsolicited_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics copy for a diagnostics RPC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Messages accepted by `send`.
    pub sends: u32,
    /// `send` calls refused with `Busy`.
    pub send_busy: u32,
    /// Transmit-done acknowledgements received.
    pub tx_acks: u32,
    /// Messages delivered to rx sinks.
    pub rx_frames: u32,
    /// Messages discarded because no sink accepted them.
    pub rx_dropped: u32,
    /// Interrupts for closed sub-channels or empty mailboxes.
    pub stray_irqs: u32,
    /// Replies rejected because the reply queue was full.
    pub reply_overflow: u32,
    /// RPC frames that failed to decode.
    pub malformed_frames: u32,
    /// Non-reply frames dropped for lack of a request sink.
    pub unsolicited_dropped: u32,
}
