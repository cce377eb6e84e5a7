//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on the host only; the embedded targets get the deterministic
//! unit and integration suites.

use corelink::rpc::{ReplyQueue, RpcFrame, RpcHeader, FRAME_LEN, REPLY_QUEUE_DEPTH};
use proptest::prelude::*;
use std::collections::VecDeque;

// ── Frame codec ───────────────────────────────────────────────

fn arb_header() -> impl Strategy<Value = RpcHeader> {
    (any::<u8>(), any::<bool>(), any::<bool>(), any::<bool>(), 0u8..=0x1F).prop_map(
        |(id, reply, sync, wait_sync, trans_cnt)| RpcHeader {
            id,
            reply,
            sync,
            wait_sync,
            trans_cnt,
        },
    )
}

fn arb_frame() -> impl Strategy<Value = RpcFrame> {
    (arb_header(), any::<u16>(), any::<[u32; 5]>()).prop_map(|(header, command, params)| {
        RpcFrame {
            header,
            command,
            params,
        }
    })
}

proptest! {
    /// Every representable frame survives the wire untouched.
    #[test]
    fn frame_codec_roundtrip(frame in arb_frame()) {
        let bytes = frame.encode();
        prop_assert_eq!(RpcFrame::decode(&bytes), Ok(frame));
    }

    /// Arbitrary byte soup never panics the decoder, and only exact
    /// 24-byte inputs can decode.
    #[test]
    fn decoder_handles_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let decoded = RpcFrame::decode(&bytes);
        if bytes.len() == FRAME_LEN {
            prop_assert!(decoded.is_ok());
        } else {
            prop_assert!(decoded.is_err());
        }
    }

    /// Packing is a bijection on the used bits: distinct headers give
    /// distinct words.
    #[test]
    fn header_pack_is_injective(a in arb_header(), b in arb_header()) {
        if a != b {
            prop_assert_ne!(a.pack(), b.pack());
        }
    }
}

// ── Reply queue vs. model ─────────────────────────────────────

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(u16),
    Dequeue,
    TakeMatching(u16),
}

fn arb_queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        (0u16..8).prop_map(QueueOp::Enqueue),
        Just(QueueOp::Dequeue),
        (0u16..8).prop_map(QueueOp::TakeMatching),
    ]
}

fn tagged_frame(tag: u16) -> RpcFrame {
    RpcFrame {
        header: RpcHeader {
            reply: true,
            trans_cnt: (tag & 0x1F) as u8,
            ..RpcHeader::default()
        },
        command: tag,
        params: [tag as u32; 5],
    }
}

proptest! {
    /// The circular queue behaves exactly like a bounded FIFO model
    /// under arbitrary interleavings of enqueue, dequeue and matched
    /// extraction — including across many wrap-arounds.
    #[test]
    fn reply_queue_matches_model(ops in proptest::collection::vec(arb_queue_op(), 1..200)) {
        let queue = ReplyQueue::new();
        let mut model: VecDeque<u16> = VecDeque::new();

        for op in ops {
            match op {
                QueueOp::Enqueue(tag) => {
                    let result = queue.enqueue(tagged_frame(tag));
                    if model.len() < REPLY_QUEUE_DEPTH {
                        prop_assert!(result.is_ok());
                        model.push_back(tag);
                    } else {
                        prop_assert!(result.is_err(), "overflow must be rejected");
                    }
                }
                QueueOp::Dequeue => {
                    let got = queue.dequeue().map(|f| f.command);
                    prop_assert_eq!(got, model.pop_front());
                }
                QueueOp::TakeMatching(tag) => {
                    let got = queue.take_first(|f| f.command == tag).map(|f| f.command);
                    let expect = model.iter().position(|&t| t == tag).map(|at| {
                        let _ = model.remove(at);
                        tag
                    });
                    prop_assert_eq!(got, expect);
                }
            }
            prop_assert_eq!(queue.len(), model.len());
        }

        // Drain: remaining order matches the model exactly.
        while let Some(expect) = model.pop_front() {
            prop_assert_eq!(queue.dequeue().map(|f| f.command), Some(expect));
        }
        prop_assert!(queue.is_empty());
    }
}

// ── Transport invariants under arbitrary traffic ──────────────

use corelink::channel::{Callbacks, MessageChannel, MsgSink, Payload, QueueSink, MAX_SEND_RECORDS};
use corelink::diagnostics::Counters;
use corelink::link::loopback::LoopbackBus;
use corelink::mailbox::{Mailbox, Side, SLOTS_PER_DIR};

#[derive(Debug, Clone)]
enum TrafficOp {
    Send(u8),
    PumpA,
    PumpB,
}

fn arb_traffic_op() -> impl Strategy<Value = TrafficOp> {
    prop_oneof![
        (1u8..=32).prop_map(TrafficOp::Send),
        Just(TrafficOp::PumpA),
        Just(TrafficOp::PumpB),
    ]
}

proptest! {
    /// Under any interleaving of sends and one-sided interrupt
    /// servicing: at most MAX_SEND_RECORDS sends are ever in flight,
    /// delivery keeps submission order, and a final drain returns the
    /// transport to a fully free state.
    #[test]
    fn transport_traffic_invariants(ops in proptest::collection::vec(arb_traffic_op(), 1..80)) {
        let mailbox = Mailbox::new();
        let bus = LoopbackBus::new();
        let (counters_a, counters_b) = (Counters::new(), Counters::new());

        struct CountingSink;
        impl MsgSink for CountingSink {
            fn on_message(&self, _sub: u8, data: &[u8]) -> usize {
                data.len()
            }
        }
        let nop = CountingSink;
        let rx_b = QueueSink::new();

        let mut a =
            MessageChannel::new(bus.driver(Side::A), mailbox.endpoint(Side::A), &counters_a);
        let mut b =
            MessageChannel::new(bus.driver(Side::B), mailbox.endpoint(Side::B), &counters_b);
        a.open(0, false, Callbacks { rx: &nop, tx_done: None }).unwrap();
        b.open(0, false, Callbacks { rx: &rx_b, tx_done: None }).unwrap();

        let mut submitted: Vec<u8> = Vec::new();
        let mut delivered: Vec<u8> = Vec::new();
        let mut accepted = 0usize;

        for op in ops {
            match op {
                TrafficOp::Send(marker) => {
                    let mut p = Payload::new();
                    p.push(marker).unwrap();
                    match a.send(0, p) {
                        Ok(_) => {
                            submitted.push(marker);
                            accepted += 1;
                        }
                        Err(_) => {
                            // Only legal refusal is a full window.
                            let acked = counters_a.snapshot().tx_acks as usize;
                            prop_assert_eq!(accepted - acked, MAX_SEND_RECORDS);
                        }
                    }
                }
                TrafficOp::PumpA => { a.poll(); }
                TrafficOp::PumpB => { b.poll(); }
            }
            // Consume at the receiver's own pace so the sink queue
            // never saturates; a delivered batch is at most the pool.
            while let Some(msg) = rx_b.try_recv() {
                delivered.push(msg.data[0]);
            }
            let in_flight = accepted - counters_a.snapshot().tx_acks as usize;
            prop_assert!(in_flight <= MAX_SEND_RECORDS);
        }

        // Drain everything still in flight.
        loop {
            if a.poll() + b.poll() == 0 {
                break;
            }
            while let Some(msg) = rx_b.try_recv() {
                delivered.push(msg.data[0]);
            }
        }
        while let Some(msg) = rx_b.try_recv() {
            delivered.push(msg.data[0]);
        }
        prop_assert_eq!(delivered, submitted, "delivery preserves submission order");
        prop_assert_eq!(mailbox.endpoint(Side::A).free_slots(), SLOTS_PER_DIR);
        prop_assert_eq!(counters_a.snapshot().tx_acks, counters_a.snapshot().sends);
    }
}
