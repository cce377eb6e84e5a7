//! corelink — cross-core mailbox message transport.
//!
//! Interrupt-driven message passing between the independent cores of a
//! multi-core wearable SoC (application CPU, BT core, system core,
//! sensor hub) over a shared-memory mailbox.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  application callbacks (trace receiver, stream client, ...)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  rpc        sequenced request/reply, circular reply queue    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  channel    sub-channel queues, send-record pool, flow ctrl  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  link       per-link interrupt capability (trait per link)   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  mailbox    shared slot arena, release/acquire publish       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Execution happens in two contexts per core: interrupt context
//! (`rx_irq`/`tx_irq`, or `poll` on cores that poll a pending
//! register) and caller context (`send`, `request_sync`, `rx_done`).
//! Types that cross the two — the reply queue, queue sinks, counters —
//! use critical sections or atomics internally; a `MessageChannel`
//! shared between an ISR and its core's main loop goes behind the
//! platform's blocking mutex in the usual way.

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod link;
pub mod mailbox;
pub mod registry;
pub mod rpc;
pub mod time;

pub use channel::{Callbacks, MessageChannel, MsgSink, Payload, SubState, TxDoneSink};
pub use error::{Error, Result};
pub use link::{CoreLink, LinkDriver, SubChannelId};
pub use mailbox::{Mailbox, Side};
pub use registry::LinkRegistry;
