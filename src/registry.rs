//! Process-wide link registry.
//!
//! One [`MessageChannel`] per physical link, keyed by [`CoreLink`] and
//! created once at subsystem init. Callers address links by core id
//! through the registry instead of reaching for ambient globals; a core
//! id outside the enumerated links fails with `InvalidCore`, a link
//! with no channel attached fails with `Unsupported`.

use crate::channel::{Callbacks, MessageChannel, Payload};
use crate::error::{LinkError, Result};
use crate::link::{CoreLink, LinkDriver, SubChannelId, NUM_CORE_LINKS};

/// Registry of the message channels attached to this core's links.
pub struct LinkRegistry<'a, L: LinkDriver> {
    links: [Option<MessageChannel<'a, L>>; NUM_CORE_LINKS],
}

impl<'a, L: LinkDriver> LinkRegistry<'a, L> {
    pub fn new() -> Self {
        Self {
            links: core::array::from_fn(|_| None),
        }
    }

    /// Attach the channel for one physical link. Fails if the link
    /// already has one.
    pub fn attach(&mut self, core: CoreLink, chan: MessageChannel<'a, L>) -> Result<()> {
        let slot = &mut self.links[core.index()];
        if slot.is_some() {
            return Err(LinkError::AlreadyAttached.into());
        }
        *slot = Some(chan);
        Ok(())
    }

    pub fn get(&self, core: CoreLink) -> Result<&MessageChannel<'a, L>> {
        self.links[core.index()]
            .as_ref()
            .ok_or_else(|| LinkError::Unsupported.into())
    }

    pub fn get_mut(&mut self, core: CoreLink) -> Result<&mut MessageChannel<'a, L>> {
        self.links[core.index()]
            .as_mut()
            .ok_or_else(|| LinkError::Unsupported.into())
    }

    /// Open a sub-channel on a link addressed by raw core id, per the
    /// subsystem's external contract.
    pub fn open(
        &mut self,
        core_id: u8,
        sub: SubChannelId,
        rx_flow_ctrl: bool,
        callbacks: Callbacks<'a>,
    ) -> Result<()> {
        let core = CoreLink::from_index(core_id)?;
        self.get_mut(core)?.open(sub, rx_flow_ctrl, callbacks)
    }

    /// Close a sub-channel addressed by raw core id.
    pub fn close(&mut self, core_id: u8, sub: SubChannelId) -> Result<()> {
        let core = CoreLink::from_index(core_id)?;
        self.get_mut(core)?.close(sub)
    }

    /// Send on a link addressed by raw core id.
    pub fn send(&mut self, core_id: u8, sub: SubChannelId, payload: Payload) -> Result<u32> {
        let core = CoreLink::from_index(core_id)?;
        self.get_mut(core)?.send(sub, payload)
    }

    /// Service pending interrupts on every attached link.
    pub fn poll_all(&mut self) -> usize {
        self.links
            .iter_mut()
            .flatten()
            .map(MessageChannel::poll)
            .sum()
    }
}

impl<L: LinkDriver> Default for LinkRegistry<'_, L> {
    fn default() -> Self {
        Self::new()
    }
}
