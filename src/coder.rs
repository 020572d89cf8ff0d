//! Coder session: one frequency table plus the strategy chosen for it.

use crate::bitstream::{reverse_words, BitReader, BitWriter};
use crate::config::CoderKind;
use crate::error::Result;
use crate::frequency::FrequencyTable;
use crate::rans::{RansDecoder, RansEncoder};
use crate::tans::{TansDecoder, TansEncoder, TansTables};

#[derive(Debug, Clone)]
enum Strategy {
    Range,
    Table(TansTables),
}

/// A finalized frequency table bound to one coder strategy.
///
/// `Codec` is immutable; any number of lanes (and threads) borrow it.
#[derive(Debug, Clone)]
pub struct Codec {
    table: FrequencyTable,
    strategy: Strategy,
}

impl Codec {
    /// Bind `table` to the `kind` strategy, building its tables if needed.
    pub fn new(table: FrequencyTable, kind: CoderKind) -> Self {
        let strategy = match kind {
            CoderKind::Range => Strategy::Range,
            CoderKind::Table => Strategy::Table(TansTables::new(&table)),
        };
        Self { table, strategy }
    }

    /// Normalize `counts` to `2^precision_bits` and bind the result.
    pub fn from_counts(counts: &[u32], precision_bits: u32, kind: CoderKind) -> Result<Self> {
        Ok(Self::new(
            FrequencyTable::normalize(counts, precision_bits)?,
            kind,
        ))
    }

    /// Strategy in use.
    pub fn kind(&self) -> CoderKind {
        match self.strategy {
            Strategy::Range => CoderKind::Range,
            Strategy::Table(_) => CoderKind::Table,
        }
    }

    /// The shared frequency table.
    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    /// Division-free tables, present for the table strategy.
    pub fn tans_tables(&self) -> Option<&TansTables> {
        match &self.strategy {
            Strategy::Range => None,
            Strategy::Table(tables) => Some(tables),
        }
    }

    /// State every encoder starts in, and every fully decoded lane ends in.
    pub fn initial_state(&self) -> u32 {
        self.table.precision()
    }

    /// Fresh encoder in the initial state.
    pub fn encoder(&self) -> Encoder<'_> {
        match &self.strategy {
            Strategy::Range => Encoder::Range(RansEncoder::new(&self.table)),
            Strategy::Table(tables) => Encoder::Table(TansEncoder::new(tables)),
        }
    }

    /// Decoder resuming from a persisted final state.
    pub fn decoder(&self, state: u32) -> Decoder<'_> {
        match &self.strategy {
            Strategy::Range => Decoder::Range(RansDecoder::new(&self.table, state)),
            Strategy::Table(tables) => Decoder::Table(TansDecoder::new(tables, state)),
        }
    }

    /// Encode a single lane. Returns the final state and the digit bytes.
    pub fn encode_lane(&self, symbols: &[u8]) -> Result<(u32, Vec<u8>)> {
        let mut bytes = Vec::new();
        let mut out = BitWriter::new(&mut bytes);
        let mut encoder = self.encoder();
        for &s in symbols {
            encoder.encode(s, &mut out)?;
        }
        out.finish();
        Ok((encoder.state(), bytes))
    }

    /// Decode `count` symbols of a lane produced by [`Codec::encode_lane`].
    pub fn decode_lane(&self, state: u32, bytes: &[u8], count: usize) -> Vec<u8> {
        let reversed = reverse_words(bytes);
        let mut input = BitReader::new(&reversed);
        let mut decoder = self.decoder(state);
        let mut out = vec![0u8; count];
        for slot in out.iter_mut().rev() {
            *slot = decoder.decode(&mut input);
        }
        out
    }
}

/// Encoder of either strategy.
#[derive(Debug, Clone)]
pub enum Encoder<'c> {
    /// Range variant.
    Range(RansEncoder<'c>),
    /// Table variant.
    Table(TansEncoder<'c>),
}

impl Encoder<'_> {
    /// Encode one symbol.
    #[inline]
    pub fn encode(&mut self, symbol: u8, out: &mut BitWriter<'_>) -> Result<()> {
        match self {
            Encoder::Range(e) => e.encode(symbol, out),
            Encoder::Table(e) => e.encode(symbol, out),
        }
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        match self {
            Encoder::Range(e) => e.state(),
            Encoder::Table(e) => e.state(),
        }
    }
}

/// Decoder of either strategy.
#[derive(Debug, Clone)]
pub enum Decoder<'c> {
    /// Range variant.
    Range(RansDecoder<'c>),
    /// Table variant.
    Table(TansDecoder<'c>),
}

impl Decoder<'_> {
    /// Decode one symbol.
    #[inline]
    pub fn decode(&mut self, input: &mut BitReader<'_>) -> u8 {
        match self {
            Decoder::Range(d) => d.decode(input),
            Decoder::Table(d) => d.decode(input),
        }
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        match self {
            Decoder::Range(d) => d.state(),
            Decoder::Table(d) => d.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::strategy::Strategy;

    const A: u8 = 0;
    const B: u8 = 1;
    const C: u8 = 2;

    #[test]
    fn test_three_symbol_scenario_both_strategies() {
        let input = [A, A, B, A, C, A, A, A];
        for kind in [CoderKind::Range, CoderKind::Table] {
            let codec = Codec::from_counts(&[6, 1, 1], 3, kind).unwrap();
            assert_eq!(codec.kind(), kind);
            assert_eq!(codec.table().frequencies(), &[6, 1, 1]);
            assert_eq!(codec.table().cumulative()[..3], [0, 6, 7]);

            let (state, bytes) = codec.encode_lane(&input).unwrap();
            let (state_again, bytes_again) = codec.encode_lane(&input).unwrap();
            assert_eq!(state, state_again);
            assert_eq!(bytes, bytes_again);

            assert_eq!(codec.decode_lane(state, &bytes, input.len()), input);
        }
    }

    #[test]
    fn test_strategies_agree_on_state() {
        let input: Vec<u8> = (0..500u32).map(|i| (i * 7 % 5) as u8).collect();
        let range = Codec::from_counts(&[10, 3, 1, 50, 2], 10, CoderKind::Range).unwrap();
        let table = Codec::new(range.table().clone(), CoderKind::Table);
        assert!(range.tans_tables().is_none());
        assert!(table.tans_tables().is_some());
        assert_eq!(
            range.encode_lane(&input).unwrap(),
            table.encode_lane(&input).unwrap()
        );
    }

    #[test]
    fn test_decoder_returns_to_initial_state() {
        let codec = Codec::from_counts(&[1, 1, 1, 1000], 12, CoderKind::Table).unwrap();
        let input = vec![0u8, 1, 2, 3, 3, 3, 3, 0, 0, 0];
        let (state, bytes) = codec.encode_lane(&input).unwrap();
        let reversed = reverse_words(&bytes);
        let mut r = BitReader::new(&reversed);
        let mut dec = codec.decoder(state);
        for _ in 0..input.len() {
            dec.decode(&mut r);
        }
        assert_eq!(dec.state(), codec.initial_state());
    }

    fn kind_strategy() -> impl Strategy<Value = CoderKind> {
        prop_oneof![Just(CoderKind::Range), Just(CoderKind::Table)]
    }

    /// Runs of the dominant symbol, runs of the rare one, or the two alternating.
    fn skewed_pattern(len: usize) -> impl Strategy<Value = Vec<u8>> {
        prop_oneof![
            Just(vec![0u8; len]),
            Just(vec![1u8; len]),
            Just((0..len).map(|i| (i % 2) as u8).collect::<Vec<u8>>()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_state_bounds_at_extreme_skew(
            kind in kind_strategy(),
            bits in prop_oneof![Just(1u32), Just(15u32)],
            input in (1usize..600).prop_flat_map(skewed_pattern),
        ) {
            // F = {M - 1, 1}: the widest and narrowest symbol intervals.
            let m = 1u32 << bits;
            let codec = Codec::from_counts(&[m - 1, 1], bits, kind).unwrap();
            prop_assert_eq!(codec.table().frequencies(), &[m - 1, 1]);
            let interval = u64::from(m)..u64::from(m) << 16;

            let mut bytes = Vec::new();
            let mut w = BitWriter::new(&mut bytes);
            let mut enc = codec.encoder();
            prop_assert_eq!(enc.state(), codec.initial_state());
            for &s in &input {
                enc.encode(s, &mut w).unwrap();
                prop_assert!(interval.contains(&u64::from(enc.state())));
            }
            w.finish();

            let reversed = reverse_words(&bytes);
            let mut r = BitReader::new(&reversed);
            let mut dec = codec.decoder(enc.state());
            let mut output = Vec::with_capacity(input.len());
            for _ in 0..input.len() {
                output.push(dec.decode(&mut r));
                prop_assert!(interval.contains(&u64::from(dec.state())));
            }
            output.reverse();
            prop_assert_eq!(output, input);
            prop_assert_eq!(dec.state(), m);
        }
    }
}
