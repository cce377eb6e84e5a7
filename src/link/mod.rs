//! Channel drivers — the raw interrupt wiring of one physical link.
//!
//! ```text
//!   platform irq glue ──▶ LinkDriver impl ──▶ MessageChannel
//! ```
//!
//! A [`LinkDriver`] owns one link's interrupt lines: it can raise an
//! interrupt on the peer core, report and clear pending local
//! interrupts, and mask or unmask the receive path. It carries no
//! queueing or message state of its own; everything above the
//! interrupt lines lives in [`crate::channel`].
//!
//! One implementation exists per physical link and is selected at
//! construction. The crate ships [`loopback`] for host simulation and
//! single-core self-test; hardware implementations live in platform
//! glue next to the vector table.

pub mod loopback;

use crate::error::LinkError;

/// Logical multiplexing units per physical link.
pub const NUM_SUB_CHANNELS: usize = 2;

/// Sub-channel id, `0..NUM_SUB_CHANNELS`.
pub type SubChannelId = u8;

/// The physical inter-core links of the SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreLink {
    /// Application CPU ↔ Bluetooth core.
    ApBt = 0,
    /// Application CPU ↔ system core.
    ApSys = 1,
    /// Bluetooth core ↔ system core.
    BtSys = 2,
    /// Application CPU ↔ sensor hub.
    SensorHub = 3,
}

/// Number of physical links.
pub const NUM_CORE_LINKS: usize = 4;

impl CoreLink {
    /// Decode a wire/config core id.
    pub fn from_index(index: u8) -> Result<Self, LinkError> {
        match index {
            0 => Ok(Self::ApBt),
            1 => Ok(Self::ApSys),
            2 => Ok(Self::BtSys),
            3 => Ok(Self::SensorHub),
            _ => Err(LinkError::InvalidCore),
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for CoreLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ApBt => write!(f, "ap-bt"),
            Self::ApSys => write!(f, "ap-sys"),
            Self::BtSys => write!(f, "bt-sys"),
            Self::SensorHub => write!(f, "sensor-hub"),
        }
    }
}

/// The two interrupt kinds a link carries per sub-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkIrq {
    /// Peer posted a message chain into the mailbox.
    RxPending,
    /// Peer consumed the chain we posted.
    TxDone,
}

/// Raw interrupt capability of one physical link endpoint.
///
/// Implementations are pure signal plumbing: `open`/`close` gate
/// delivery, `interrupt_peer` raises the line on the other core,
/// `pending` reports-and-clears latched local interrupts, and
/// `stop_recv`/`start_recv` mask the receive line without tearing the
/// channel down (flow-control backpressure). A masked receive
/// interrupt stays latched and is reported once unmasked, matching
/// hardware mask-register semantics.
pub trait LinkDriver {
    /// Enable interrupt delivery for a sub-channel.
    fn open(&mut self, sub: SubChannelId) -> Result<(), LinkError>;

    /// Disable delivery and clear anything latched. Idempotent:
    /// closing an unopened sub-channel is a no-op success.
    fn close(&mut self, sub: SubChannelId) -> Result<(), LinkError>;

    /// Raise `irq` on the peer core's endpoint.
    fn interrupt_peer(&mut self, sub: SubChannelId, irq: LinkIrq) -> Result<(), LinkError>;

    /// Take one pending local interrupt, if any. Transmit-done is
    /// reported ahead of receive-pending so completed sends free their
    /// records before new traffic is serviced.
    fn pending(&mut self) -> Option<(SubChannelId, LinkIrq)>;

    /// Unmask the receive interrupt for a sub-channel.
    fn start_recv(&mut self, sub: SubChannelId) -> Result<(), LinkError>;

    /// Mask the receive interrupt for a sub-channel. Latched interrupts
    /// are held, not dropped.
    fn stop_recv(&mut self, sub: SubChannelId) -> Result<(), LinkError>;
}

pub(crate) fn check_sub(sub: SubChannelId) -> Result<(), LinkError> {
    if (sub as usize) < NUM_SUB_CHANNELS {
        Ok(())
    } else {
        Err(LinkError::InvalidSubChannel)
    }
}
