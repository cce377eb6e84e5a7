//! Circular reply queue.
//!
//! Buffers responses (and unsolicited pushes) arriving asynchronously
//! relative to the caller: the message channel's rx path enqueues from
//! interrupt context, the application dequeues from caller context.
//! Every access runs inside a critical section — one side of the
//! access is itself an interrupt handler, so interrupt masking, not a
//! scheduler mutex, is the correct exclusion.
//!
//! A full queue rejects the incoming reply. The producer is an
//! interrupt handler that must not block, so overflow is a reported,
//! swallowed error; recovering the lost reply is the sender's
//! responsibility.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::RpcError;
use crate::rpc::header::RpcFrame;

/// Capacity of a reply queue.
pub const REPLY_QUEUE_DEPTH: usize = 8;

struct Ring {
    frames: [RpcFrame; REPLY_QUEUE_DEPTH],
    rpos: usize,
    wpos: usize,
    len: usize,
}

impl Ring {
    const fn new() -> Self {
        Self {
            frames: [RpcFrame::EMPTY; REPLY_QUEUE_DEPTH],
            rpos: 0,
            wpos: 0,
            len: 0,
        }
    }
}

/// Bounded FIFO of [`RpcFrame`]s, shareable by reference between the
/// interrupt producer and the caller-context consumer.
pub struct ReplyQueue {
    ring: Mutex<RefCell<Ring>>,
}

impl ReplyQueue {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    /// Append a frame. Fails with `QueueFull` at capacity; the read and
    /// write positions are untouched on failure.
    pub fn enqueue(&self, frame: RpcFrame) -> Result<(), RpcError> {
        critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            if ring.len == REPLY_QUEUE_DEPTH {
                return Err(RpcError::QueueFull);
            }
            let at = ring.wpos;
            ring.frames[at] = frame;
            ring.wpos = (at + 1) % REPLY_QUEUE_DEPTH;
            ring.len += 1;
            Ok(())
        })
    }

    /// Take the oldest frame.
    pub fn dequeue(&self) -> Option<RpcFrame> {
        critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            if ring.len == 0 {
                return None;
            }
            let at = ring.rpos;
            let frame = ring.frames[at];
            ring.rpos = (at + 1) % REPLY_QUEUE_DEPTH;
            ring.len -= 1;
            Some(frame)
        })
    }

    /// Remove and return the oldest frame matching `pred`, keeping the
    /// relative order of everything else. This is what lets a
    /// synchronous waiter claim *its* reply while unrelated replies
    /// stay queued for their own consumers.
    pub fn take_first(&self, pred: impl Fn(&RpcFrame) -> bool) -> Option<RpcFrame> {
        critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            let (rpos, len) = (ring.rpos, ring.len);
            let at = (0..len).find(|&offset| {
                let idx = (rpos + offset) % REPLY_QUEUE_DEPTH;
                pred(&ring.frames[idx])
            })?;

            let taken = ring.frames[(rpos + at) % REPLY_QUEUE_DEPTH];
            // Shift the older entries up one position into the gap.
            for offset in (0..at).rev() {
                let from = (rpos + offset) % REPLY_QUEUE_DEPTH;
                let to = (rpos + offset + 1) % REPLY_QUEUE_DEPTH;
                let moved = ring.frames[from];
                ring.frames[to] = moved;
            }
            ring.rpos = (rpos + 1) % REPLY_QUEUE_DEPTH;
            ring.len = len - 1;
            Some(taken)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).len)
    }
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::header::RpcHeader;

    fn frame(command: u16, trans_cnt: u8) -> RpcFrame {
        RpcFrame {
            header: RpcHeader {
                reply: true,
                trans_cnt,
                ..RpcHeader::default()
            },
            command,
            params: [command as u32; 5],
        }
    }

    #[test]
    fn fifo_order() {
        let queue = ReplyQueue::new();
        for command in 0..3 {
            queue.enqueue(frame(command, 0)).unwrap();
        }
        for command in 0..3 {
            assert_eq!(queue.dequeue().unwrap().command, command);
        }
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn overflow_rejected_without_corruption() {
        let queue = ReplyQueue::new();
        for command in 0..REPLY_QUEUE_DEPTH as u16 {
            queue.enqueue(frame(command, 0)).unwrap();
        }
        assert_eq!(queue.enqueue(frame(99, 0)), Err(RpcError::QueueFull));
        assert_eq!(queue.enqueue(frame(100, 0)), Err(RpcError::QueueFull));

        // Everything enqueued before the overflow drains in order.
        for command in 0..REPLY_QUEUE_DEPTH as u16 {
            assert_eq!(queue.dequeue().unwrap().command, command);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn take_first_preserves_other_entries() {
        let queue = ReplyQueue::new();
        queue.enqueue(frame(10, 1)).unwrap();
        queue.enqueue(frame(20, 2)).unwrap();
        queue.enqueue(frame(30, 3)).unwrap();

        let taken = queue.take_first(|f| f.header.trans_cnt == 2).unwrap();
        assert_eq!(taken.command, 20);

        assert_eq!(queue.dequeue().unwrap().command, 10);
        assert_eq!(queue.dequeue().unwrap().command, 30);
    }

    #[test]
    fn take_first_without_match() {
        let queue = ReplyQueue::new();
        queue.enqueue(frame(10, 1)).unwrap();
        assert!(queue.take_first(|f| f.header.trans_cnt == 9).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn wraparound_stays_consistent() {
        let queue = ReplyQueue::new();
        // Cycle enough to wrap the ring several times.
        for round in 0..4 {
            for k in 0..REPLY_QUEUE_DEPTH as u16 {
                queue.enqueue(frame(round * 100 + k, 0)).unwrap();
            }
            for k in 0..REPLY_QUEUE_DEPTH as u16 {
                assert_eq!(queue.dequeue().unwrap().command, round * 100 + k);
            }
        }
        assert!(queue.is_empty());
    }
}
