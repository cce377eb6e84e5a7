//! Request/reply RPC protocol on top of the message channel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RPC Stack                            │
//! │                                                             │
//! │  requester core                       responder core        │
//! │  ┌───────────┐  request frame        ┌───────────┐          │
//! │  │ RpcClient │──────────────────────▶│  RpcPort  │          │
//! │  │           │                       │     │     │          │
//! │  │ poll loop │  reply frame          │ RequestSink          │
//! │  │     ▲     │◀──────────────────────│ send_reply│          │
//! │  └─────┼─────┘                       └───────────┘          │
//! │  ┌─────┴──────┐                                             │
//! │  │ ReplyQueue │  (interrupt producer, caller consumer)      │
//! │  └────────────┘                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Frames are fixed-shape (24 bytes): a packed header, a command word
//! and five parameter words. Sequencing uses the header's 5-bit rolling
//! transaction counter; replies echo the counter of the request they
//! answer.

mod endpoint;
mod header;
mod queue;

pub use endpoint::{send_reply, RequestSink, RpcClient, RpcPort};
pub use header::{RpcFrame, RpcHeader, FRAME_LEN, RPC_PARAM_COUNT, TRANS_CNT_MASK};
pub use queue::{ReplyQueue, REPLY_QUEUE_DEPTH};
