#![no_main]
use lane_ans::{ByteContainer, ShortContainer};
use libfuzzer_sys::fuzz_target;

// Headers may declare far more symbols than the input could hold.
const MAX_SYMBOLS: usize = 1 << 22;

// Arbitrary bytes must be rejected or decoded, never panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(c) = ShortContainer::parse(data) {
        if c.offsets().len() * c.options().symbols_per_group() <= MAX_SYMBOLS {
            let _ = c.decode();
        }
    }
    if let Ok(c) = ByteContainer::parse(data) {
        if c.offsets().len() * c.options().symbols_per_group() <= MAX_SYMBOLS {
            let _ = c.decode();
        }
    }
});
