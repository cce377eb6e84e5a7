//! Fuzz target: `RpcFrame::decode`
//!
//! Drives arbitrary byte sequences into the fixed-shape frame decoder
//! and asserts that it never panics, only accepts exact-length input,
//! and re-encodes accepted frames to the identical wire bytes.
//!
//! cargo fuzz run fuzz_rpc_frame

#![no_main]

use corelink::rpc::{RpcFrame, FRAME_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match RpcFrame::decode(data) {
        Ok(frame) => {
            assert_eq!(data.len(), FRAME_LEN, "only exact frames may decode");
            // The header has no dead bits the codec is allowed to lose.
            assert_eq!(&frame.encode()[..], data, "re-encode must be identical");
        }
        Err(_) => {
            assert_ne!(data.len(), FRAME_LEN, "exact-length frames always decode");
        }
    }
});
