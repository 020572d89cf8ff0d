//! Profiling loop: byte-container encode plus CPU and host-device decode.
//!
//! Run under a profiler (e.g. `cargo flamegraph --bin lane_flame`).

use lane_ans::gpu::GpuBatchDecoder;
use lane_ans::{ByteContainer, ByteEncoder, HostDevice, KernelCache, Options};

fn main() -> lane_ans::Result<()> {
    let options = Options::gpu();
    let input: Vec<u8> = (0..64 * options.symbols_per_group())
        .map(|i| match i % 10 {
            0..=5 => 0,
            6 | 7 => 1,
            8 => 2,
            _ => (i % 251) as u8,
        })
        .collect();

    let encoder = ByteEncoder::new(options)?;
    let cache = KernelCache::new(HostDevice::new());

    for _ in 0..50 {
        let bytes = encoder.encode(&input)?;
        let container = ByteContainer::parse(&bytes)?;
        let cpu = container.decode()?;

        let gpu = GpuBatchDecoder::new(&cache, container.table(), options.lanes)?;
        let host = container.decode_with(&gpu)?;
        assert_eq!(cpu, host);
    }
    Ok(())
}
