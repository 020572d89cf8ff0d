//! Software compute device running the decode kernel on the host.
//!
//! Executes the same SIMT schedule a GPU would: one thread per lane, all
//! threads advancing one step together. Thread `t` owns lane `L-1-t`, so the
//! sequential decoder's read order within a step matches thread order, and
//! an exclusive prefix sum of the per-thread read flags gives every thread
//! its word in the shared stream.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use super::cache::ComputeDevice;
use super::{ANS_PROGRAM, BUILD_TABLE_KERNEL, DECODE_KERNEL};
use crate::bitstream::DIGIT_BITS;
use crate::error::{Error, Result};
use crate::frequency::FrequencyTable;
use crate::tans::{decode_step, Step, TansTables};

/// Kernels the host device can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKernel {
    /// Expands frequencies into the slot table.
    BuildTable,
    /// Lock-step interleaved decode.
    DecodeInterleaved,
}

/// A compiled host program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProgram {
    source_id: String,
}

/// In-process [`ComputeDevice`].
#[derive(Debug)]
pub struct HostDevice {
    reason: String,
    lost: AtomicBool,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// A working device.
    pub fn new() -> Self {
        Self {
            reason: String::new(),
            lost: AtomicBool::new(false),
        }
    }

    /// A device that fails every request with `BackendUnavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            lost: AtomicBool::new(true),
        }
    }

    /// Simulate losing the device; later requests fail.
    pub fn disconnect(&self) {
        self.lost.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.lost.load(Ordering::SeqCst) {
            let reason = if self.reason.is_empty() {
                "device lost"
            } else {
                &self.reason
            };
            return Err(Error::BackendUnavailable(format!("host: {reason}")));
        }
        Ok(())
    }
}

impl ComputeDevice for HostDevice {
    type Program = HostProgram;
    type Kernel = HostKernel;
    type Table = TansTables;

    fn name(&self) -> &str {
        "host"
    }

    fn build_program(&self, source_id: &str) -> Result<HostProgram> {
        self.check()?;
        if source_id != ANS_PROGRAM {
            return Err(Error::BackendUnavailable(format!(
                "host: no program source {source_id:?}"
            )));
        }
        Ok(HostProgram {
            source_id: source_id.to_owned(),
        })
    }

    fn create_kernel(&self, program: &HostProgram, kernel_name: &str) -> Result<HostKernel> {
        self.check()?;
        match kernel_name {
            BUILD_TABLE_KERNEL => Ok(HostKernel::BuildTable),
            DECODE_KERNEL => Ok(HostKernel::DecodeInterleaved),
            _ => Err(Error::BackendUnavailable(format!(
                "host: {} has no kernel {kernel_name:?}",
                program.source_id
            ))),
        }
    }

    fn upload_table(
        &self,
        kernel: &HostKernel,
        freqs: &[u32],
        precision_bits: u32,
    ) -> Result<TansTables> {
        self.check()?;
        if *kernel != HostKernel::BuildTable {
            return Err(Error::InvalidOptions(format!(
                "{kernel:?} cannot build a table"
            )));
        }
        let table = FrequencyTable::from_frequencies(freqs, precision_bits)?;
        Ok(TansTables::new(&table))
    }

    fn dispatch_decode(
        &self,
        kernel: &HostKernel,
        table: &TansTables,
        states: &[u32],
        words: &[u16],
        symbols_per_lane: usize,
    ) -> Result<Vec<Vec<u8>>> {
        self.check()?;
        if *kernel != HostKernel::DecodeInterleaved {
            return Err(Error::InvalidOptions(format!("{kernel:?} cannot decode")));
        }

        let lanes = states.len();
        let mut state: Vec<u32> = (0..lanes).map(|t| states[lanes - 1 - t]).collect();
        let mut out = vec![vec![0u8; symbols_per_lane]; lanes];
        let mut pending = vec![0u32; lanes];
        let mut offset = vec![0usize; lanes];
        // Words not yet consumed; readers take from the end.
        let mut remaining = words.len();

        for step in (0..symbols_per_lane).rev() {
            // Transform.
            for t in 0..lanes {
                let (symbol, next) = decode_step(table, state[t]);
                out[lanes - 1 - t][step] = symbol;
                match next {
                    Step::Done(x) => {
                        state[t] = x;
                        pending[t] = 0;
                    }
                    Step::NeedDigit(x) => {
                        state[t] = x;
                        pending[t] = 1;
                    }
                }
            }

            // Exclusive scan of read flags.
            let mut total = 0usize;
            for (off, &flag) in offset.iter_mut().zip(&pending) {
                *off = total;
                total += flag as usize;
            }

            // Renormalize.
            for ((x, &flag), &off) in state.iter_mut().zip(&pending).zip(&offset) {
                if flag == 1 {
                    let word = remaining
                        .checked_sub(off + 1)
                        .and_then(|i| words.get(i))
                        .copied()
                        .unwrap_or(0);
                    *x = (*x << DIGIT_BITS) | word as u32;
                }
            }
            remaining = remaining.saturating_sub(total);
        }

        trace!(lanes, symbols_per_lane, words = words.len(), "host kernel dispatched");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::Codec;
    use crate::config::{CoderKind, LaneLayout};
    use crate::interleaved::{decode_lanes, encode_interleaved, GroupPayload};

    fn decode_on_host(codec: &Codec, bytes: &[u8], lanes: usize, per_lane: usize) -> Vec<Vec<u8>> {
        let device = HostDevice::new();
        let program = device.build_program(ANS_PROGRAM).unwrap();
        let build = device.create_kernel(&program, BUILD_TABLE_KERNEL).unwrap();
        let decode = device.create_kernel(&program, DECODE_KERNEL).unwrap();
        let table = codec.table();
        let tables = device
            .upload_table(&build, table.frequencies(), table.precision_bits())
            .unwrap();
        let payload = GroupPayload::parse(bytes, lanes).unwrap();
        device
            .dispatch_decode(&decode, &tables, &payload.states, &payload.words(), per_lane)
            .unwrap()
    }

    #[test]
    fn test_lock_step_matches_sequential() {
        let codec = Codec::from_counts(&[50, 20, 5, 1, 1], 11, CoderKind::Range).unwrap();
        let symbols: Vec<u8> = (0..16 * 64u32).map(|i| ((i * i + 3 * i) % 5) as u8).collect();
        let bytes = encode_interleaved(&symbols, &codec, 16, LaneLayout::Strided).unwrap();

        let host = decode_on_host(&codec, &bytes, 16, 64);
        let payload = GroupPayload::parse(&bytes, 16).unwrap();
        assert_eq!(host, decode_lanes(&payload, 64, &codec));
    }

    #[test]
    fn test_single_lane() {
        let codec = Codec::from_counts(&[6, 1, 1], 3, CoderKind::Table).unwrap();
        let symbols = [0, 0, 1, 0, 2, 0, 0, 0];
        let bytes = encode_interleaved(&symbols, &codec, 1, LaneLayout::Contiguous).unwrap();
        assert_eq!(decode_on_host(&codec, &bytes, 1, 8), vec![symbols.to_vec()]);
    }

    #[test]
    fn test_unknown_program_and_kernel() {
        let device = HostDevice::new();
        assert!(device.build_program("other").unwrap_err().is_backend_unavailable());
        let program = device.build_program(ANS_PROGRAM).unwrap();
        assert!(device
            .create_kernel(&program, "nope")
            .unwrap_err()
            .is_backend_unavailable());
    }

    #[test]
    fn test_disconnect() {
        let device = HostDevice::new();
        device.build_program(ANS_PROGRAM).unwrap();
        device.disconnect();
        let err = device.build_program(ANS_PROGRAM).unwrap_err();
        assert!(err.is_backend_unavailable());

        let err = HostDevice::unavailable("no driver")
            .build_program(ANS_PROGRAM)
            .unwrap_err();
        assert!(err.to_string().contains("no driver"));
    }
}
