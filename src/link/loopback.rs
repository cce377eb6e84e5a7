//! In-memory link pair for host simulation and self-test.
//!
//! A [`LoopbackBus`] models the interrupt wiring between two cores as
//! a block of atomics, so the two endpoint drivers can live on
//! different threads (or be pumped in lockstep on one). "Raising an
//! interrupt on the peer" latches a bit the peer's `pending` call
//! reports and clears — the same latch-until-serviced behaviour a
//! hardware pending register has.
//!
//! Tests can also inject interrupts directly with
//! [`LoopbackBus::inject`] to exercise stray-interrupt handling.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::link::{check_sub, LinkDriver, LinkError, LinkIrq, SubChannelId, NUM_SUB_CHANNELS};
use crate::mailbox::Side;

const IRQ_RX_PENDING: u8 = 1 << 0;
const IRQ_TX_DONE: u8 = 1 << 1;

/// Shared interrupt wiring of one simulated physical link.
pub struct LoopbackBus {
    /// Latched interrupts, per side, per sub-channel.
    pend: [[AtomicU8; NUM_SUB_CHANNELS]; 2],
    /// Receive-unmasked bits, one per sub-channel, per side.
    rx_enabled: [AtomicU8; 2],
}

impl LoopbackBus {
    pub const fn new() -> Self {
        Self {
            pend: [const { [const { AtomicU8::new(0) }; NUM_SUB_CHANNELS] }; 2],
            rx_enabled: [const { AtomicU8::new(0) }; 2],
        }
    }

    /// Endpoint driver for one side of the link.
    pub fn driver(&self, side: Side) -> LoopbackLink<'_> {
        LoopbackLink { bus: self, side }
    }

    /// Latch an interrupt on `side` directly, bypassing the peer
    /// driver. Simulates a spurious or ill-timed hardware interrupt.
    pub fn inject(&self, side: Side, sub: SubChannelId, irq: LinkIrq) {
        self.latch(side_index(side), sub, irq);
    }

    fn latch(&self, side: usize, sub: SubChannelId, irq: LinkIrq) {
        self.pend[side][sub as usize].fetch_or(irq_bit(irq), Ordering::AcqRel);
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

fn irq_bit(irq: LinkIrq) -> u8 {
    match irq {
        LinkIrq::RxPending => IRQ_RX_PENDING,
        LinkIrq::TxDone => IRQ_TX_DONE,
    }
}

/// One side's driver over a [`LoopbackBus`].
pub struct LoopbackLink<'a> {
    bus: &'a LoopbackBus,
    side: Side,
}

impl LoopbackLink<'_> {
    fn me(&self) -> usize {
        side_index(self.side)
    }

    fn peer(&self) -> usize {
        1 - side_index(self.side)
    }

    fn take_bit(&self, sub: usize, bit: u8) -> bool {
        self.bus.pend[self.me()][sub].fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }
}

impl LinkDriver for LoopbackLink<'_> {
    fn open(&mut self, sub: SubChannelId) -> Result<(), LinkError> {
        check_sub(sub)?;
        self.bus.rx_enabled[self.me()].fetch_or(1 << sub, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self, sub: SubChannelId) -> Result<(), LinkError> {
        check_sub(sub)?;
        self.bus.rx_enabled[self.me()].fetch_and(!(1 << sub), Ordering::AcqRel);
        self.bus.pend[self.me()][sub as usize].store(0, Ordering::Release);
        Ok(())
    }

    fn interrupt_peer(&mut self, sub: SubChannelId, irq: LinkIrq) -> Result<(), LinkError> {
        check_sub(sub)?;
        self.bus.latch(self.peer(), sub, irq);
        Ok(())
    }

    fn pending(&mut self) -> Option<(SubChannelId, LinkIrq)> {
        // Tx-done first: completed sends release records before new
        // traffic is serviced.
        for sub in 0..NUM_SUB_CHANNELS {
            if self.take_bit(sub, IRQ_TX_DONE) {
                return Some((sub as SubChannelId, LinkIrq::TxDone));
            }
        }
        let unmasked = self.bus.rx_enabled[self.me()].load(Ordering::Acquire);
        for sub in 0..NUM_SUB_CHANNELS {
            if unmasked & (1 << sub) == 0 {
                continue; // Masked: leave the latch set.
            }
            if self.take_bit(sub, IRQ_RX_PENDING) {
                return Some((sub as SubChannelId, LinkIrq::RxPending));
            }
        }
        None
    }

    fn start_recv(&mut self, sub: SubChannelId) -> Result<(), LinkError> {
        check_sub(sub)?;
        self.bus.rx_enabled[self.me()].fetch_or(1 << sub, Ordering::AcqRel);
        Ok(())
    }

    fn stop_recv(&mut self, sub: SubChannelId) -> Result<(), LinkError> {
        check_sub(sub)?;
        self.bus.rx_enabled[self.me()].fetch_and(!(1 << sub), Ordering::AcqRel);
        Ok(())
    }
}
