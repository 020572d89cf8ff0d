//! Range Asymmetric Numeral Systems (rANS).
//!
//! The range variant updates the state with a division by `F[s]` on encode
//! and locates the decoded symbol with a search of the cumulative table.
//!
//! The state lives in `[M, M * b)` with `b = 2^16`. Before coding symbol `s`
//! the encoder emits the low digit while the state is at least `F[s] * b`,
//! which keeps the transformed state inside the interval. The decoder undoes
//! the transform and pulls a digit back in while the state is below `M`.

use crate::bitstream::{BitReader, BitWriter, DIGIT_BITS};
use crate::error::{Error, Result};
use crate::frequency::FrequencyTable;

/// Exclusive upper bound on the pre-transform state for a symbol of
/// frequency `freq`. Above it the encoder must emit a digit first.
#[inline]
pub(crate) fn encode_bound(freq: u32) -> u64 {
    (freq as u64) << DIGIT_BITS
}

/// rANS encoder.
#[derive(Debug, Clone)]
pub struct RansEncoder<'t> {
    state: u32,
    table: &'t FrequencyTable,
}

impl<'t> RansEncoder<'t> {
    /// Create an encoder in the initial state `M`.
    pub fn new(table: &'t FrequencyTable) -> Self {
        Self {
            state: table.precision(),
            table,
        }
    }

    /// Encode `symbol`, emitting at most one digit to `out`.
    ///
    /// # Errors
    /// Returns `Error::UnencodableSymbol` if `F[symbol]` is 0.
    pub fn encode(&mut self, symbol: u8, out: &mut BitWriter<'_>) -> Result<()> {
        let freq = self.table.freq(symbol);
        if freq == 0 {
            return Err(Error::UnencodableSymbol(symbol));
        }
        let cum = self.table.cum(symbol);

        // state < M * b <= F * b^2, so a single digit always suffices.
        let mut x = self.state;
        if x as u64 >= encode_bound(freq) {
            out.write_digit(x as u16);
            x >>= DIGIT_BITS;
        }

        // x' = C[s] + M * floor(x / F[s]) + (x mod F[s])
        self.state = ((x / freq) << self.table.precision_bits()) + (x % freq) + cum;
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        self.state
    }
}

/// rANS decoder.
#[derive(Debug, Clone)]
pub struct RansDecoder<'t> {
    state: u32,
    table: &'t FrequencyTable,
}

impl<'t> RansDecoder<'t> {
    /// Create a decoder from a persisted final encoder state.
    pub fn new(table: &'t FrequencyTable, state: u32) -> Self {
        Self { state, table }
    }

    /// Decode one symbol, consuming at most one digit from `input`.
    pub fn decode(&mut self, input: &mut BitReader<'_>) -> u8 {
        let bits = self.table.precision_bits();
        let slot = self.state & (self.table.precision() - 1);
        let symbol = self.table.symbol_for_slot(slot);
        let freq = self.table.freq(symbol);
        let cum = self.table.cum(symbol);

        // x' = F[s] * floor(x / M) + (x mod M) - C[s]; wraps only on a
        // corrupt state.
        let mut x = freq
            .wrapping_mul(self.state >> bits)
            .wrapping_add(slot - cum);

        // x' >= 1 here and b >= M, so one digit restores x' >= M.
        if x < self.table.precision() {
            x = (x << DIGIT_BITS) | input.read_digit() as u32;
        }
        self.state = x;
        symbol
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        self.state
    }
}
