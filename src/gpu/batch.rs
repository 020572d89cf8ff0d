//! Batch decoder dispatching to a compute device.

use tracing::debug;

use super::cache::{ComputeDevice, KernelCache};
use super::{BatchDecoder, ANS_PROGRAM, BUILD_TABLE_KERNEL, DECODE_KERNEL};
use crate::config::{GPU_SYMBOLS_PER_LANE, MAX_PRECISION_BITS};
use crate::error::{Error, Result};
use crate::frequency::{FrequencyTable, MAX_ALPHABET};

/// Decodes groups of `lanes` lanes of 256 symbols on a device.
///
/// The table is uploaded once at construction; kernels come from the
/// caller's [`KernelCache`], so many decoders can share one compilation.
pub struct GpuBatchDecoder<'c, D: ComputeDevice> {
    cache: &'c KernelCache<D>,
    kernel: D::Kernel,
    table: D::Table,
    lanes: usize,
}

impl<'c, D: ComputeDevice> GpuBatchDecoder<'c, D> {
    /// Build the device table for `table` and fetch the decode kernel.
    ///
    /// # Errors
    /// - `InvalidPrecision` / `AlphabetTooLarge` / `InvalidOptions` if the
    ///   table or lane count is outside what the kernel supports.
    /// - `BackendUnavailable` if the device cannot build the kernels.
    pub fn new(cache: &'c KernelCache<D>, table: &FrequencyTable, lanes: usize) -> Result<Self> {
        if table.precision_bits() > MAX_PRECISION_BITS {
            return Err(Error::InvalidPrecision(table.precision_bits()));
        }
        if table.alphabet_len() > MAX_ALPHABET {
            return Err(Error::AlphabetTooLarge(table.alphabet_len()));
        }
        if lanes == 0 {
            return Err(Error::InvalidOptions("batch decoder needs at least one lane".into()));
        }

        let build = cache.get_kernel(ANS_PROGRAM, BUILD_TABLE_KERNEL)?;
        let device_table =
            cache
                .device()
                .upload_table(&build, table.frequencies(), table.precision_bits())?;
        let kernel = cache.get_kernel(ANS_PROGRAM, DECODE_KERNEL)?;

        debug!(
            device = cache.device().name(),
            lanes,
            precision_bits = table.precision_bits(),
            "batch decoder ready"
        );
        Ok(Self {
            cache,
            kernel,
            table: device_table,
            lanes,
        })
    }

    /// Lanes per group.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Decode one group.
    pub fn decode(&self, states: &[u32], words: &[u16]) -> Result<Vec<Vec<u8>>> {
        if states.len() != self.lanes {
            return Err(Error::InvalidOptions(format!(
                "{} lane states for a {}-lane decoder",
                states.len(),
                self.lanes
            )));
        }
        self.cache.device().dispatch_decode(
            &self.kernel,
            &self.table,
            states,
            words,
            GPU_SYMBOLS_PER_LANE,
        )
    }
}

impl<D: ComputeDevice> std::fmt::Debug for GpuBatchDecoder<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBatchDecoder")
            .field("device", &self.cache.device().name())
            .field("lanes", &self.lanes)
            .finish_non_exhaustive()
    }
}

impl<D: ComputeDevice> BatchDecoder for GpuBatchDecoder<'_, D> {
    fn name(&self) -> &str {
        self.cache.device().name()
    }

    fn symbols_per_lane(&self) -> usize {
        GPU_SYMBOLS_PER_LANE
    }

    fn decode_group(&self, states: &[u32], words: &[u16]) -> Result<Vec<Vec<u8>>> {
        self.decode(states, words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::Codec;
    use crate::config::{CoderKind, LaneLayout, Options, GPU_LANES};
    use crate::container::{ByteContainer, ByteEncoder};
    use crate::gpu::{decode_group_with_fallback, CpuBatchDecoder, HostDevice};

    fn residual_bytes(len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| match (i * 7919) % 23 {
                0..=11 => 0,
                12..=16 => 1,
                17..=19 => 255,
                20 | 21 => 2,
                _ => 200,
            })
            .collect()
    }

    #[test]
    fn test_host_device_matches_cpu() {
        let cache = KernelCache::new(HostDevice::new());
        for coder in [CoderKind::Range, CoderKind::Table] {
            for layout in [LaneLayout::Contiguous, LaneLayout::Strided] {
                let options = Options::gpu().with_coder(coder).with_layout(layout);
                let symbols = residual_bytes(3 * options.symbols_per_group());
                let bytes = ByteEncoder::new(options).unwrap().encode(&symbols).unwrap();
                let container = ByteContainer::parse(&bytes).unwrap();

                let gpu = GpuBatchDecoder::new(&cache, container.table(), GPU_LANES).unwrap();
                assert_eq!(container.decode_with(&gpu).unwrap(), symbols);
                assert_eq!(container.decode().unwrap(), symbols);
            }
        }
        // One program, two kernels, however many decoders were built.
        assert_eq!(cache.program_count(), 1);
        assert_eq!(cache.kernel_count(), 2);
    }

    #[test]
    fn test_unavailable_device() {
        let cache = KernelCache::new(HostDevice::unavailable("no OpenCL platform"));
        let table = FrequencyTable::normalize(&[3, 1], 12).unwrap();
        let err = GpuBatchDecoder::new(&cache, &table, GPU_LANES).unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(cache.program_count(), 0);
    }

    #[test]
    fn test_device_loss_falls_back_to_cpu() {
        let options = Options::gpu();
        let symbols = residual_bytes(options.symbols_per_group());
        let bytes = ByteEncoder::new(options).unwrap().encode(&symbols).unwrap();
        let container = ByteContainer::parse(&bytes).unwrap();
        let codec = Codec::new(container.table().clone(), options.coder);

        let cache = KernelCache::new(HostDevice::new());
        let gpu = GpuBatchDecoder::new(&cache, container.table(), GPU_LANES).unwrap();
        let cpu = CpuBatchDecoder::new(&codec, options.symbols_per_lane);
        cache.device().disconnect();

        let payloads = container.group_payloads().unwrap();
        let payload = &payloads[0];
        let words = payload.words();
        assert!(gpu.decode(&payload.states, &words).unwrap_err().is_backend_unavailable());
        let lanes = decode_group_with_fallback(&gpu, &cpu, &payload.states, &words).unwrap();
        assert_eq!(lanes, cpu.decode_group(&payload.states, &words).unwrap());
    }

    #[test]
    fn test_lane_count_checked() {
        let cache = KernelCache::new(HostDevice::new());
        let table = FrequencyTable::normalize(&[3, 1], 12).unwrap();
        assert!(GpuBatchDecoder::new(&cache, &table, 0).unwrap_err().is_config());

        let gpu = GpuBatchDecoder::new(&cache, &table, 4).unwrap();
        assert!(matches!(
            gpu.decode(&[4096; 3], &[]),
            Err(Error::InvalidOptions(_))
        ));
    }
}
