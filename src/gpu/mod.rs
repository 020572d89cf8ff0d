//! Batch decoding of interleaved groups on a compute device.
//!
//! The lane protocol lets a device assign one lane to one hardware thread:
//! every thread advances its own state, and the only cross-lane step is an
//! exclusive prefix sum that tells each thread which word of the shared
//! digit stream it consumes. Whatever executes the kernel, the output must
//! be bit-identical to [`crate::interleaved::decode_lanes`].
//!
//! - [`BatchDecoder`] is the contract: lane states plus digit words in,
//!   one symbol array per lane out.
//! - [`CpuBatchDecoder`] is the reference implementation.
//! - [`GpuBatchDecoder`] dispatches to a [`ComputeDevice`] through an owned
//!   [`KernelCache`]. [`HostDevice`] is a software device that runs the same
//!   lock-step kernel on the host.
//!
//! Device and kernel build failures surface as
//! [`Error::BackendUnavailable`]; [`decode_group_with_fallback`] retries such
//! a group on the CPU.

pub mod batch;
pub mod cache;
pub mod host;

pub use batch::GpuBatchDecoder;
pub use cache::{ComputeDevice, KernelCache};
pub use host::HostDevice;

use tracing::warn;

use crate::bitstream::words_to_bytes;
use crate::coder::Codec;
use crate::error::{Error, Result};
use crate::interleaved::{decode_lanes, GroupPayload};

/// Program source holding the decoder kernels.
pub const ANS_PROGRAM: &str = "ans_decode";

/// Kernel that expands frequencies into the slot table on the device.
pub const BUILD_TABLE_KERNEL: &str = "ans_build_table";

/// Kernel that decodes one interleaved group.
pub const DECODE_KERNEL: &str = "ans_decode_interleaved";

/// Decodes one interleaved group into per-lane symbol arrays.
pub trait BatchDecoder {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Symbols every decoded lane holds.
    fn symbols_per_lane(&self) -> usize;

    /// Decode a group.
    ///
    /// `states` holds the final encoder state of each lane in lane order;
    /// `words` is the group's digit stream in encode order. Each returned
    /// lane lists its symbols in coding order.
    fn decode_group(&self, states: &[u32], words: &[u16]) -> Result<Vec<Vec<u8>>>;
}

/// Reference batch decoder running the sequential lane protocol.
#[derive(Debug, Clone, Copy)]
pub struct CpuBatchDecoder<'c> {
    codec: &'c Codec,
    symbols_per_lane: usize,
}

impl<'c> CpuBatchDecoder<'c> {
    /// Decoder for groups coded with `codec`.
    pub fn new(codec: &'c Codec, symbols_per_lane: usize) -> Self {
        Self {
            codec,
            symbols_per_lane,
        }
    }
}

impl BatchDecoder for CpuBatchDecoder<'_> {
    fn name(&self) -> &str {
        "cpu"
    }

    fn symbols_per_lane(&self) -> usize {
        self.symbols_per_lane
    }

    fn decode_group(&self, states: &[u32], words: &[u16]) -> Result<Vec<Vec<u8>>> {
        if states.is_empty() {
            return Err(Error::InvalidOptions("no lane states".into()));
        }
        let digits = words_to_bytes(words);
        let payload = GroupPayload {
            digits: &digits,
            states: states.to_vec(),
        };
        Ok(decode_lanes(&payload, self.symbols_per_lane, self.codec))
    }
}

/// Decode on `primary`, retrying on `fallback` if the backend is unavailable.
///
/// Any other error is returned unchanged.
pub fn decode_group_with_fallback(
    primary: &dyn BatchDecoder,
    fallback: &dyn BatchDecoder,
    states: &[u32],
    words: &[u16],
) -> Result<Vec<Vec<u8>>> {
    match primary.decode_group(states, words) {
        Err(err) if err.is_backend_unavailable() => {
            warn!(
                backend = primary.name(),
                fallback = fallback.name(),
                error = %err,
                "batch decoder unavailable, falling back"
            );
            fallback.decode_group(states, words)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoderKind, LaneLayout};
    use crate::interleaved::{encode_interleaved, split_lanes};

    struct Offline;

    impl BatchDecoder for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        fn symbols_per_lane(&self) -> usize {
            32
        }

        fn decode_group(&self, _: &[u32], _: &[u16]) -> Result<Vec<Vec<u8>>> {
            Err(Error::BackendUnavailable("no device".into()))
        }
    }

    struct Broken;

    impl BatchDecoder for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn symbols_per_lane(&self) -> usize {
            32
        }

        fn decode_group(&self, _: &[u32], _: &[u16]) -> Result<Vec<Vec<u8>>> {
            Err(Error::Malformed("bad group".into()))
        }
    }

    fn group(codec: &Codec) -> (Vec<u8>, Vec<u8>) {
        let symbols: Vec<u8> = (0..8 * 32).map(|i| (i % 5 == 0) as u8).collect();
        let bytes = encode_interleaved(&symbols, codec, 8, LaneLayout::Contiguous).unwrap();
        (symbols, bytes)
    }

    #[test]
    fn test_cpu_batch_decoder_matches_lane_split() {
        let codec = Codec::from_counts(&[4, 1], 10, CoderKind::Range).unwrap();
        let (symbols, bytes) = group(&codec);
        let payload = GroupPayload::parse(&bytes, 8).unwrap();
        let cpu = CpuBatchDecoder::new(&codec, 32);
        let lanes = cpu.decode_group(&payload.states, &payload.words()).unwrap();
        assert_eq!(lanes, split_lanes(&symbols, 8, LaneLayout::Contiguous).unwrap());
    }

    #[test]
    fn test_fallback_only_on_backend_unavailable() {
        let codec = Codec::from_counts(&[4, 1], 10, CoderKind::Table).unwrap();
        let (symbols, bytes) = group(&codec);
        let payload = GroupPayload::parse(&bytes, 8).unwrap();
        let cpu = CpuBatchDecoder::new(&codec, 32);
        let words = payload.words();

        let lanes = decode_group_with_fallback(&Offline, &cpu, &payload.states, &words).unwrap();
        assert_eq!(lanes, split_lanes(&symbols, 8, LaneLayout::Contiguous).unwrap());

        let err = decode_group_with_fallback(&Broken, &cpu, &payload.states, &words).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
