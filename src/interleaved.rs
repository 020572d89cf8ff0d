//! Interleaved lane protocol.
//!
//! A group of `L` lanes shares one digit stream. Lane `j` owns `n` symbols of
//! the group (which ones is decided by the [`LaneLayout`]) and runs its own
//! coder state, starting at `M`.
//!
//! ```text
//! encode order:  step 0: lane 0, lane 1, .. lane L-1
//!                step 1: lane 0, lane 1, .. lane L-1
//!                ...
//! group bytes:   [digits as LE u16 words ...][state 0: u32 LE] .. [state L-1: u32 LE]
//! ```
//!
//! Each coding step emits or consumes at most one digit, so decoding walks
//! the exact reverse order (step `n-1` down to 0, lane `L-1` down to 0) over
//! the word-reversed digit stream.

use crate::bitstream::{bytes_to_words, reverse_words, BitReader, BitWriter};
use crate::coder::{Codec, Decoder};
use crate::config::LaneLayout;
use crate::error::{Error, Result};

/// Bytes of one persisted lane state.
pub const STATE_BYTES: usize = 4;

/// Encode one group of `lanes` lanes.
///
/// # Errors
/// - `LaneMismatch` if `symbols` does not split evenly into `lanes`.
/// - `UnencodableSymbol` if a symbol has zero frequency.
pub fn encode_interleaved(
    symbols: &[u8],
    codec: &Codec,
    lanes: usize,
    layout: LaneLayout,
) -> Result<Vec<u8>> {
    let per_lane = symbols_per_lane(symbols.len(), lanes)?;
    let mut encoders: Vec<_> = (0..lanes).map(|_| codec.encoder()).collect();

    let mut out = Vec::with_capacity(symbols.len() / 2 + lanes * STATE_BYTES);
    let mut writer = BitWriter::new(&mut out);
    for step in 0..per_lane {
        for (lane, encoder) in encoders.iter_mut().enumerate() {
            let symbol = symbols[layout.index(lane, step, lanes, per_lane)];
            encoder.encode(symbol, &mut writer)?;
        }
    }
    writer.finish();

    for encoder in &encoders {
        out.extend_from_slice(&encoder.state().to_le_bytes());
    }
    Ok(out)
}

/// Decode a group produced by [`encode_interleaved`].
///
/// # Errors
/// - `LaneMismatch` if `symbol_count` does not split evenly into `lanes`.
/// - `Truncated` / `Malformed` if `bytes` cannot hold the lane states.
pub fn decode_interleaved(
    bytes: &[u8],
    symbol_count: usize,
    codec: &Codec,
    lanes: usize,
    layout: LaneLayout,
) -> Result<Vec<u8>> {
    let per_lane = symbols_per_lane(symbol_count, lanes)?;
    let payload = GroupPayload::parse(bytes, lanes)?;
    let decoded = decode_lanes(&payload, per_lane, codec);
    Ok(gather_lanes(&decoded, layout))
}

/// Decode every lane of a parsed group into its own symbol array.
///
/// Each returned lane lists its symbols in coding order `0..per_lane`.
pub fn decode_lanes(
    payload: &GroupPayload<'_>,
    per_lane: usize,
    codec: &Codec,
) -> Vec<Vec<u8>> {
    let reversed = reverse_words(payload.digits);
    let mut input = BitReader::new(&reversed);
    let mut decoders: Vec<Decoder<'_>> =
        payload.states.iter().map(|&s| codec.decoder(s)).collect();
    let mut out = vec![vec![0u8; per_lane]; decoders.len()];

    for step in (0..per_lane).rev() {
        for (decoder, lane_out) in decoders.iter_mut().zip(out.iter_mut()).rev() {
            lane_out[step] = decoder.decode(&mut input);
        }
    }
    out
}

/// One group split into its digit stream and trailing lane states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPayload<'a> {
    /// Digit stream in encode order, possibly preceded by padding.
    pub digits: &'a [u8],
    /// Final encoder state of each lane, in lane order.
    pub states: Vec<u32>,
}

impl<'a> GroupPayload<'a> {
    /// Split `bytes` into digits and `lanes` trailing states.
    pub fn parse(bytes: &'a [u8], lanes: usize) -> Result<Self> {
        let state_bytes = lanes * STATE_BYTES;
        if bytes.len() < state_bytes {
            return Err(Error::Truncated {
                needed: state_bytes,
                available: bytes.len(),
            });
        }
        let (digits, tail) = bytes.split_at(bytes.len() - state_bytes);
        if digits.len() % 2 != 0 {
            return Err(Error::Malformed(format!(
                "digit stream of {} bytes is not whole words",
                digits.len()
            )));
        }
        let states = tail
            .chunks_exact(STATE_BYTES)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { digits, states })
    }

    /// The digit stream as little-endian words.
    pub fn words(&self) -> Vec<u16> {
        bytes_to_words(self.digits)
    }
}

/// Split a group into per-lane symbol arrays.
pub fn split_lanes(group: &[u8], lanes: usize, layout: LaneLayout) -> Result<Vec<Vec<u8>>> {
    let per_lane = symbols_per_lane(group.len(), lanes)?;
    Ok((0..lanes)
        .map(|lane| {
            (0..per_lane)
                .map(|step| group[layout.index(lane, step, lanes, per_lane)])
                .collect()
        })
        .collect())
}

/// Inverse of [`split_lanes`]. Lanes must all have the same length.
pub fn gather_lanes(lanes: &[Vec<u8>], layout: LaneLayout) -> Vec<u8> {
    let count = lanes.len();
    let per_lane = lanes.first().map_or(0, Vec::len);
    let mut group = vec![0u8; count * per_lane];
    for (lane, symbols) in lanes.iter().enumerate() {
        for (step, &s) in symbols.iter().enumerate() {
            group[layout.index(lane, step, count, per_lane)] = s;
        }
    }
    group
}

fn symbols_per_lane(len: usize, lanes: usize) -> Result<usize> {
    if lanes == 0 || len % lanes != 0 {
        return Err(Error::LaneMismatch {
            symbols: len,
            lanes,
            symbols_per_lane: if lanes == 0 { 0 } else { len / lanes },
        });
    }
    Ok(len / lanes)
}
