#![no_main]
use lane_ans::config::LaneLayout;
use lane_ans::{count_symbols, decode_interleaved, encode_interleaved, Codec, CoderKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<u8>, u8, u8, bool)| {
    let (input, precision, lanes, strided) = data;
    let precision_bits = u32::from(precision % 8) + 8; // 8 to 15 bits
    let lanes = usize::from(lanes % 16) + 1;

    // Trim to a whole number of lanes.
    let len = input.len() - input.len() % lanes;
    let input = &input[..len];
    if input.is_empty() {
        return;
    }
    let layout = if strided {
        LaneLayout::Strided
    } else {
        LaneLayout::Contiguous
    };

    let counts = count_symbols(input);
    let Ok(range) = Codec::from_counts(&counts, precision_bits, CoderKind::Range) else {
        // More distinct symbols than slots.
        return;
    };
    let table = Codec::new(range.table().clone(), CoderKind::Table);

    let a = encode_interleaved(input, &range, lanes, layout).unwrap();
    let b = encode_interleaved(input, &table, lanes, layout).unwrap();
    assert_eq!(a, b);

    let output = decode_interleaved(&a, input.len(), &table, lanes, layout).unwrap();
    assert_eq!(input, &output[..]);
});
