//! Request/reply endpoints over one message-channel sub-channel.
//!
//! [`RpcPort`] is the receive half: registered as the sub-channel's
//! [`MsgSink`], it decodes incoming frames, parks replies on the
//! [`ReplyQueue`] and hands requests to an application
//! [`RequestSink`]. [`RpcClient`] is the transmit half: it stamps
//! headers, allocates transaction counters and — for synchronous
//! calls — spins a bounded poll loop until the matching reply arrives
//! or the deadline passes.
//!
//! A synchronous wait is a cooperative poll, not a blocking primitive:
//! interrupt context cannot be relied upon to wake a blocked thread in
//! this environment, so the waiter services its own link interrupts
//! via [`MessageChannel::poll`] while it spins.
//!
//! Reply matching is first-fit on `trans_cnt`. The counter is 5 bits
//! wide, so more than 31 outstanding exchanges on one sub-channel can
//! alias; keeping at most a handful in flight is the caller's contract.

use log::warn;

use crate::channel::{MessageChannel, MsgSink, Payload};
use crate::config::RpcConfig;
use crate::diagnostics::Counters;
use crate::error::{Result, RpcError};
use crate::link::{LinkDriver, SubChannelId};
use crate::rpc::header::{RpcFrame, RpcHeader, RPC_PARAM_COUNT, TRANS_CNT_MASK};
use crate::rpc::queue::ReplyQueue;
use crate::time::TimeSource;

/// Application delegate for incoming (non-reply) frames, invoked from
/// interrupt context.
pub trait RequestSink: Sync {
    fn on_request(&self, sub: SubChannelId, frame: &RpcFrame);
}

/// Receive half of an RPC endpoint. Register as the sub-channel's rx
/// callback at `open`.
pub struct RpcPort<'a> {
    replies: &'a ReplyQueue,
    requests: Option<&'a dyn RequestSink>,
    counters: &'a Counters,
}

impl<'a> RpcPort<'a> {
    pub fn new(
        replies: &'a ReplyQueue,
        requests: Option<&'a dyn RequestSink>,
        counters: &'a Counters,
    ) -> Self {
        Self {
            replies,
            requests,
            counters,
        }
    }
}

impl MsgSink for RpcPort<'_> {
    fn on_message(&self, sub: SubChannelId, data: &[u8]) -> usize {
        let frame = match RpcFrame::decode(data) {
            Ok(frame) => frame,
            Err(_) => {
                self.counters.count_malformed();
                warn!("rpc: malformed frame ({} bytes) on sub {}", data.len(), sub);
                return 0;
            }
        };

        if frame.header.reply {
            if self.replies.enqueue(frame).is_err() {
                // The producer is an interrupt handler: report, swallow,
                // leave recovery to the sender.
                self.counters.count_reply_overflow();
                warn!("rpc: reply queue full, dropping trans {}", frame.header.trans_cnt);
                return 0;
            }
        } else if let Some(requests) = self.requests {
            requests.on_request(sub, &frame);
        } else {
            self.counters.count_unsolicited_dropped();
            warn!("rpc: no request sink, dropping cmd {:#06x}", frame.command);
            return 0;
        }
        data.len()
    }
}

/// Transmit half of an RPC endpoint.
pub struct RpcClient<'a, C: TimeSource> {
    sub: SubChannelId,
    replies: &'a ReplyQueue,
    clock: C,
    config: RpcConfig,
    trans_cnt: u8,
}

impl<'a, C: TimeSource> RpcClient<'a, C> {
    /// `config` must have passed [`RpcConfig::validate`].
    pub fn new(sub: SubChannelId, replies: &'a ReplyQueue, clock: C, config: RpcConfig) -> Self {
        Self {
            sub,
            replies,
            clock,
            config,
            trans_cnt: 0,
        }
    }

    fn next_trans(&mut self) -> u8 {
        self.trans_cnt = self.trans_cnt.wrapping_add(1) & TRANS_CNT_MASK;
        self.trans_cnt
    }

    /// Fire-and-forget request. Returns the transaction counter the
    /// eventual reply will carry.
    pub fn request<L: LinkDriver>(
        &mut self,
        chan: &mut MessageChannel<'_, L>,
        command: u16,
        params: [u32; RPC_PARAM_COUNT],
    ) -> Result<u8> {
        let trans_cnt = self.next_trans();
        let frame = RpcFrame {
            header: RpcHeader {
                id: self.config.service_id,
                reply: false,
                sync: false,
                wait_sync: false,
                trans_cnt,
            },
            command,
            params,
        };
        chan.send(self.sub, frame_payload(&frame))?;
        Ok(trans_cnt)
    }

    /// Synchronous request: sends with `wait_sync` set and polls the
    /// reply queue until the matching reply arrives or the configured
    /// deadline passes, retransmitting up to `sync_retries` times.
    ///
    /// The wait loop services this endpoint's own link interrupts, so
    /// it is safe to call from a context that has no other interrupt
    /// dispatch running.
    pub fn request_sync<L: LinkDriver>(
        &mut self,
        chan: &mut MessageChannel<'_, L>,
        command: u16,
        params: [u32; RPC_PARAM_COUNT],
    ) -> Result<RpcFrame> {
        let attempts = 1 + self.config.sync_retries as u32;
        for attempt in 0..attempts {
            let trans_cnt = self.next_trans();
            let frame = RpcFrame {
                header: RpcHeader {
                    id: self.config.service_id,
                    reply: false,
                    sync: false,
                    wait_sync: true,
                    trans_cnt,
                },
                command,
                params,
            };
            chan.send(self.sub, frame_payload(&frame))?;

            let deadline = self.clock.now_ms() + self.config.sync_timeout_ms as u64;
            loop {
                chan.poll();
                if let Some(reply) = self
                    .replies
                    .take_first(|f| f.header.reply && f.header.trans_cnt == trans_cnt)
                {
                    return Ok(reply);
                }
                if self.clock.now_ms() >= deadline {
                    break;
                }
            }
            if attempt + 1 < attempts {
                warn!(
                    "rpc: trans {} deadline missed, retrying cmd {:#06x}",
                    trans_cnt, command
                );
            }
        }
        Err(RpcError::Timeout.into())
    }

    /// Drain the next buffered reply without matching, e.g. for
    /// unsolicited status pushes.
    pub fn take_reply(&self) -> Option<RpcFrame> {
        self.replies.dequeue()
    }

    pub fn has_replies(&self) -> bool {
        !self.replies.is_empty()
    }
}

/// Responder side: answer `request` on `sub`, echoing its transaction
/// counter so the requester's matcher can claim it. `sync` is set when
/// the requester is waiting synchronously.
pub fn send_reply<L: LinkDriver>(
    chan: &mut MessageChannel<'_, L>,
    sub: SubChannelId,
    request: &RpcHeader,
    command: u16,
    params: [u32; RPC_PARAM_COUNT],
) -> Result<()> {
    let frame = RpcFrame {
        header: RpcHeader {
            id: request.id,
            reply: true,
            sync: request.wait_sync,
            wait_sync: false,
            trans_cnt: request.trans_cnt,
        },
        command,
        params,
    };
    chan.send(sub, frame_payload(&frame))?;
    Ok(())
}

fn frame_payload(frame: &RpcFrame) -> Payload {
    let mut payload = Payload::new();
    // FRAME_LEN is far below MSG_CAP.
    let _ = payload.extend_from_slice(&frame.encode());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::header::FRAME_LEN;

    #[test]
    fn port_routes_replies_to_queue() {
        let replies = ReplyQueue::new();
        let counters = Counters::new();
        let port = RpcPort::new(&replies, None, &counters);

        let frame = RpcFrame {
            header: RpcHeader {
                reply: true,
                trans_cnt: 5,
                ..RpcHeader::default()
            },
            command: 0x10,
            params: [0; RPC_PARAM_COUNT],
        };
        assert_eq!(port.on_message(0, &frame.encode()), FRAME_LEN);
        assert_eq!(replies.dequeue(), Some(frame));
    }

    #[test]
    fn port_counts_malformed_frames() {
        let replies = ReplyQueue::new();
        let counters = Counters::new();
        let port = RpcPort::new(&replies, None, &counters);

        assert_eq!(port.on_message(0, &[1, 2, 3]), 0);
        assert_eq!(counters.snapshot().malformed_frames, 1);
        assert!(replies.is_empty());
    }

    #[test]
    fn port_drops_requests_without_sink() {
        let replies = ReplyQueue::new();
        let counters = Counters::new();
        let port = RpcPort::new(&replies, None, &counters);

        let frame = RpcFrame {
            command: 0x22,
            ..RpcFrame::EMPTY
        };
        assert_eq!(port.on_message(1, &frame.encode()), 0);
        assert_eq!(counters.snapshot().unsolicited_dropped, 1);
    }

    #[test]
    fn port_reports_reply_overflow() {
        let replies = ReplyQueue::new();
        let counters = Counters::new();
        let port = RpcPort::new(&replies, None, &counters);

        let frame = RpcFrame {
            header: RpcHeader {
                reply: true,
                ..RpcHeader::default()
            },
            ..RpcFrame::EMPTY
        };
        for _ in 0..crate::rpc::queue::REPLY_QUEUE_DEPTH {
            assert_eq!(port.on_message(0, &frame.encode()), FRAME_LEN);
        }
        assert_eq!(port.on_message(0, &frame.encode()), 0);
        assert_eq!(counters.snapshot().reply_overflow, 1);
    }

    #[test]
    fn trans_counter_rolls_at_five_bits() {
        let replies = ReplyQueue::new();
        let mut client = RpcClient::new(
            0,
            &replies,
            crate::time::ManualClock::new(),
            RpcConfig::default(),
        );
        let mut seen = std::vec::Vec::new();
        for _ in 0..40 {
            seen.push(client.next_trans());
        }
        assert!(seen.iter().all(|&t| t <= TRANS_CNT_MASK));
        // 1..=31 then wraps to 0.
        assert_eq!(seen[0], 1);
        assert_eq!(seen[30], 31);
        assert_eq!(seen[31], 0);
        assert_eq!(seen[32], 1);
    }
}
