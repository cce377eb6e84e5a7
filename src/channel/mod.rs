//! Message channel — ordered message delivery over one physical link.
//!
//! Turns the link driver's raw "peer sent something" / "peer finished
//! receiving" interrupts into a flow-controlled stream of discrete
//! messages per sub-channel.
//!
//! ```text
//!  caller ──send──▶ pending list ──post──▶ mailbox ──irq──▶ peer rx sink
//!                      ▲                                        │
//!                      └────── record freed ◀──tx-done irq──────┘
//! ```
//!
//! Send path: a free [`SendRecord`](records) is claimed, the payload
//! moves into a mailbox slot, and the record queues on the sub-channel's
//! pending list. While the link is idle the whole pending list is
//! published as one chain and the peer is interrupted; further sends
//! queue behind it until the transmit-done acknowledgement releases the
//! batch. One chain is in flight per link at a time; sub-channels are
//! serviced round-robin.
//!
//! Receive path: the rx interrupt takes the posted chain, hands each
//! message to the sub-channel's [`MsgSink`], then acknowledges. With
//! rx flow control enabled the acknowledgement (and the receive
//! interrupt itself) is withheld until the consumer calls
//! [`MessageChannel::rx_done`], bounding how far the peer can race
//! ahead.
//!
//! Interrupt handlers (`rx_irq`, `tx_irq`, `poll`) never fail: anomalies
//! from the other execution domain are counted and logged, since a peer
//! core cannot be trusted to be perfectly synchronized with local state.

mod queue_sink;
mod records;

pub use queue_sink::{QueueSink, RxMessage};
pub use records::MAX_SEND_RECORDS;

use heapless::{Deque, Vec};
use log::{info, warn};

use crate::diagnostics::Counters;
use crate::error::{ChannelError, Result};
use crate::link::{LinkDriver, LinkIrq, SubChannelId, NUM_SUB_CHANNELS};
use crate::mailbox::{MailboxEndpoint, MSG_CAP};
use records::{RecordPool, SendRecord};

/// Owned message payload. Moving it into [`MessageChannel::send`]
/// transfers the buffer to the transport for the in-flight period.
pub type Payload = heapless::Vec<u8, MSG_CAP>;

/// Receive delegate for one sub-channel, invoked from interrupt
/// context. Returns the number of bytes accepted; anything short of
/// `data.len()` is counted as a drop.
pub trait MsgSink: Sync {
    fn on_message(&self, sub: SubChannelId, data: &[u8]) -> usize;
}

/// Transmit-completion delegate. `delivered` is false when a send was
/// failed by `close` before reaching the peer.
pub trait TxDoneSink: Sync {
    fn on_tx_done(&self, sub: SubChannelId, seq: u32, delivered: bool);
}

/// Callback table registered at `open`.
#[derive(Clone, Copy)]
pub struct Callbacks<'a> {
    pub rx: &'a dyn MsgSink,
    pub tx_done: Option<&'a dyn TxDoneSink>,
}

/// Observable sub-channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    Closed,
    /// Open with send capacity available.
    Ready,
    /// Open but the send-record pool is exhausted (peer backpressure
    /// or unacknowledged traffic).
    Busy,
}

struct SubChannel<'a> {
    opened: bool,
    rx_flow_ctrl: bool,
    /// Receiver side: consumed-ack withheld until `rx_done`.
    ack_owed: bool,
    pool: RecordPool,
    /// Record ids queued but not yet published.
    pending: Deque<usize, MAX_SEND_RECORDS>,
    /// Record ids of the chain currently visible to the peer.
    posted: Vec<usize, MAX_SEND_RECORDS>,
    next_seq: u32,
    callbacks: Option<Callbacks<'a>>,
}

impl SubChannel<'_> {
    const fn new() -> Self {
        Self {
            opened: false,
            rx_flow_ctrl: false,
            ack_owed: false,
            pool: RecordPool::new(),
            pending: Deque::new(),
            posted: Vec::new(),
            next_seq: 0,
            callbacks: None,
        }
    }
}

/// One endpoint of a physical link, multiplexing [`NUM_SUB_CHANNELS`]
/// sub-channels.
pub struct MessageChannel<'a, L: LinkDriver> {
    link: L,
    mailbox: MailboxEndpoint<'a>,
    counters: &'a Counters,
    subs: [SubChannel<'a>; NUM_SUB_CHANNELS],
    /// A chain is published and unacknowledged (link-wide, all subs).
    busy_now: bool,
    /// Round-robin start for the next publish.
    post_cursor: usize,
}

impl<'a, L: LinkDriver> MessageChannel<'a, L> {
    pub fn new(link: L, mailbox: MailboxEndpoint<'a>, counters: &'a Counters) -> Self {
        Self {
            link,
            mailbox,
            counters,
            subs: core::array::from_fn(|_| SubChannel::new()),
            busy_now: false,
            post_cursor: 0,
        }
    }

    fn sub_index(sub: SubChannelId) -> core::result::Result<usize, ChannelError> {
        if (sub as usize) < NUM_SUB_CHANNELS {
            Ok(sub as usize)
        } else {
            Err(ChannelError::InvalidParam)
        }
    }

    /// Open a sub-channel and register its callbacks.
    ///
    /// With `rx_flow_ctrl` set, received chains are not acknowledged
    /// (and further receive interrupts stay masked) until the consumer
    /// calls [`Self::rx_done`].
    pub fn open(
        &mut self,
        sub: SubChannelId,
        rx_flow_ctrl: bool,
        callbacks: Callbacks<'a>,
    ) -> Result<()> {
        let i = Self::sub_index(sub)?;
        if self.subs[i].opened {
            return Err(ChannelError::AlreadyOpen.into());
        }
        self.link.open(sub)?;

        let s = &mut self.subs[i];
        s.opened = true;
        s.rx_flow_ctrl = rx_flow_ctrl;
        s.ack_owed = false;
        s.callbacks = Some(callbacks);
        info!("chan: sub {} opened (rx_flow_ctrl={})", sub, rx_flow_ctrl);
        Ok(())
    }

    /// Close a sub-channel, failing every queued or in-flight send.
    /// Closing an unopened sub-channel is a no-op success.
    ///
    /// If a chain is posted and unconsumed, it is retracted from the
    /// mailbox; callers must quiesce peer traffic on the sub-channel
    /// before closing, as a peer mid-walk cannot be interrupted.
    pub fn close(&mut self, sub: SubChannelId) -> Result<()> {
        let i = Self::sub_index(sub)?;
        if !self.subs[i].opened {
            return Ok(());
        }

        // Release a peer blocked on our flow-control window first.
        if self.subs[i].ack_owed {
            self.subs[i].ack_owed = false;
            let _ = self.link.start_recv(sub);
            let _ = self.link.interrupt_peer(sub, LinkIrq::TxDone);
        }

        let mailbox = self.mailbox;
        let s = &mut self.subs[i];
        let tx_done = s.callbacks.as_ref().and_then(|c| c.tx_done);
        let had_posted = !s.posted.is_empty();

        while let Some(id) = s.pending.pop_front() {
            if let Some(record) = s.pool.release(id) {
                mailbox.free_slot(record.slot);
                if let Some(cb) = tx_done {
                    cb.on_tx_done(sub, record.seq, false);
                }
            }
        }

        if had_posted {
            let _ = mailbox.retract(sub);
            for &id in s.posted.iter() {
                if let Some(record) = s.pool.release(id) {
                    mailbox.free_slot(record.slot);
                    if let Some(cb) = tx_done {
                        cb.on_tx_done(sub, record.seq, false);
                    }
                }
            }
            s.posted.clear();
        }

        s.opened = false;
        s.rx_flow_ctrl = false;
        s.callbacks = None;
        if had_posted {
            self.busy_now = false;
        }
        self.link.close(sub)?;
        info!("chan: sub {} closed", sub);

        // The link may have capacity for another sub-channel's traffic.
        self.post_next();
        Ok(())
    }

    /// Queue a message for transmission. The payload moves into the
    /// transport until the transmit-done acknowledgement.
    ///
    /// Returns an opaque sequence number usable with [`Self::tx_active`].
    /// Fails with `Busy` when the record pool or the link window is
    /// exhausted — backpressure is reported, never absorbed silently.
    pub fn send(&mut self, sub: SubChannelId, payload: Payload) -> Result<u32> {
        let i = Self::sub_index(sub)?;
        if !self.subs[i].opened {
            return Err(ChannelError::NotOpen.into());
        }
        if payload.is_empty() {
            return Err(ChannelError::InvalidParam.into());
        }

        let mailbox = self.mailbox;
        let counters = self.counters;
        let s = &mut self.subs[i];

        if s.pool.is_exhausted() {
            counters.count_send_busy();
            return Err(ChannelError::Busy.into());
        }
        let Some(slot) = mailbox.alloc_slot() else {
            counters.count_send_busy();
            return Err(ChannelError::Busy.into());
        };
        mailbox.write_slot(slot, &payload);

        s.next_seq = s.next_seq.wrapping_add(1);
        let seq = s.next_seq;
        let Some(id) = s.pool.acquire(SendRecord { seq, slot }) else {
            // Checked above; unreachable unless the pool was corrupted.
            mailbox.free_slot(slot);
            counters.count_send_busy();
            return Err(ChannelError::Busy.into());
        };
        if s.pending.push_back(id).is_err() {
            let _ = s.pool.release(id);
            mailbox.free_slot(slot);
            counters.count_send_busy();
            return Err(ChannelError::Busy.into());
        }
        counters.count_send();

        if !self.busy_now {
            self.post_next();
        }
        Ok(seq)
    }

    /// Whether the send carrying `seq` is still unacknowledged.
    pub fn tx_active(&self, sub: SubChannelId, seq: u32) -> bool {
        match Self::sub_index(sub) {
            Ok(i) => self.subs[i].pool.is_active(seq),
            Err(_) => false,
        }
    }

    /// Consumer acknowledgement for a flow-controlled sub-channel:
    /// unmasks the receive interrupt and releases the peer's batch.
    pub fn rx_done(&mut self, sub: SubChannelId) -> Result<()> {
        let i = Self::sub_index(sub)?;
        if !self.subs[i].opened {
            return Err(ChannelError::NotOpen.into());
        }
        if !self.subs[i].ack_owed {
            return Ok(());
        }
        self.subs[i].ack_owed = false;
        self.link.start_recv(sub)?;
        self.link.interrupt_peer(sub, LinkIrq::TxDone)?;
        Ok(())
    }

    /// Observable state of a sub-channel.
    pub fn state(&self, sub: SubChannelId) -> SubState {
        match Self::sub_index(sub) {
            Ok(i) if self.subs[i].opened => {
                if self.subs[i].pool.is_exhausted() {
                    SubState::Busy
                } else {
                    SubState::Ready
                }
            }
            _ => SubState::Closed,
        }
    }

    /// Metrics block shared with the RPC port on this link.
    pub fn counters(&self) -> &'a Counters {
        self.counters
    }

    // ── Interrupt handlers ───────────────────────────────────────

    /// Service pending link interrupts. Call from the idle loop or a
    /// wait spin on cores that poll instead of vectoring.
    ///
    /// Returns the number of interrupts serviced.
    pub fn poll(&mut self) -> usize {
        let mut serviced = 0;
        while let Some((sub, irq)) = self.link.pending() {
            match irq {
                LinkIrq::RxPending => self.rx_irq(sub),
                LinkIrq::TxDone => self.tx_irq(sub),
            }
            serviced += 1;
        }
        serviced
    }

    /// Receive-pending interrupt: walk the peer's posted chain and
    /// deliver each message to the sub-channel's sink.
    pub fn rx_irq(&mut self, sub: SubChannelId) {
        let Ok(i) = Self::sub_index(sub) else {
            self.counters.count_stray_irq();
            warn!("chan: rx irq for bad sub {}", sub);
            return;
        };
        if !self.subs[i].opened {
            self.counters.count_stray_irq();
            warn!("chan: rx irq on closed sub {}", sub);
            return;
        }
        let Some(head) = self.mailbox.take_posted(sub) else {
            self.counters.count_stray_irq();
            warn!("chan: rx irq with empty mailbox on sub {}", sub);
            return;
        };

        let mailbox = self.mailbox;
        let counters = self.counters;
        let s = &self.subs[i];
        if let Some(callbacks) = &s.callbacks {
            let mut cursor = Some(head);
            while let Some(idx) = cursor {
                mailbox.read_slot(idx, |bytes| {
                    counters.count_rx_frame();
                    let accepted = callbacks.rx.on_message(sub, bytes);
                    if accepted < bytes.len() {
                        counters.count_rx_dropped();
                        warn!(
                            "chan: sink took {}/{} bytes on sub {}",
                            accepted,
                            bytes.len(),
                            sub
                        );
                    }
                });
                cursor = mailbox.next_of(idx);
            }
        }

        if self.subs[i].rx_flow_ctrl {
            // Hold the consumed ack (and further rx interrupts) until
            // the consumer signals rx_done.
            self.subs[i].ack_owed = true;
            let _ = self.link.stop_recv(sub);
        } else if self.link.interrupt_peer(sub, LinkIrq::TxDone).is_err() {
            warn!("chan: tx-done ack failed on sub {}", sub);
        }
    }

    /// Transmit-done interrupt: the peer consumed our posted chain.
    /// Releases the batch and publishes the next pending one.
    pub fn tx_irq(&mut self, sub: SubChannelId) {
        let Ok(i) = Self::sub_index(sub) else {
            self.counters.count_stray_irq();
            warn!("chan: tx irq for bad sub {}", sub);
            return;
        };
        let mailbox = self.mailbox;
        let counters = self.counters;
        let s = &mut self.subs[i];
        if s.posted.is_empty() {
            counters.count_stray_irq();
            warn!("chan: spurious tx-done on sub {}", sub);
            return;
        }

        let tx_done = s.callbacks.as_ref().and_then(|c| c.tx_done);
        for &id in s.posted.iter() {
            if let Some(record) = s.pool.release(id) {
                mailbox.free_slot(record.slot);
                counters.count_tx_ack();
                if let Some(cb) = tx_done {
                    cb.on_tx_done(sub, record.seq, true);
                }
            }
        }
        s.posted.clear();

        self.busy_now = false;
        self.post_next();
    }

    /// Publish the next pending batch, round-robin across sub-channels.
    fn post_next(&mut self) {
        if self.busy_now {
            return;
        }
        let mailbox = self.mailbox;
        for offset in 0..NUM_SUB_CHANNELS {
            let i = (self.post_cursor + offset) % NUM_SUB_CHANNELS;
            let s = &mut self.subs[i];
            if s.pending.is_empty() {
                continue;
            }

            let mut head = None;
            let mut prev: Option<u8> = None;
            while let Some(id) = s.pending.pop_front() {
                let Some(record) = s.pool.get(id) else {
                    continue;
                };
                match prev {
                    Some(p) => mailbox.link_slot(p, record.slot),
                    None => head = Some(record.slot),
                }
                prev = Some(record.slot);
                // Capacity matches the pool bound; cannot overflow.
                let _ = s.posted.push(id);
            }
            let Some(head) = head else {
                continue;
            };

            mailbox.post(i as SubChannelId, head);
            self.post_cursor = (i + 1) % NUM_SUB_CHANNELS;
            self.busy_now = true;
            if self
                .link
                .interrupt_peer(i as SubChannelId, LinkIrq::RxPending)
                .is_err()
            {
                warn!("chan: peer interrupt failed on sub {}", i);
            }
            return;
        }
    }
}
