//! Table-driven ANS.
//!
//! The table variant computes the same state transform as [`crate::rans`]
//! but replaces every runtime division with precomputed tables:
//!
//! - the encoder divides by `F[s]` with a per-symbol reciprocal and a single
//!   correction step;
//! - the decoder indexes an `M`-entry slot table by `x mod M`, which yields
//!   the symbol, its frequency and the slot's offset inside the symbol's
//!   interval in one load.
//!
//! The tables are built once per [`FrequencyTable`] and are what the GPU
//! batch decoder uploads. Streams are bit-identical to the range variant.

use crate::bitstream::{BitReader, BitWriter, DIGIT_BITS};
use crate::error::{Error, Result};
use crate::frequency::{FrequencyTable, MAX_ALPHABET};
use crate::rans::encode_bound;

/// Per-symbol encoder entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeEntry {
    /// `F[s]`
    pub freq: u32,
    /// `C[s]`
    pub cum: u32,
    /// `floor(2^32 / F[s])`, unused for frequencies below 2.
    pub rcp: u32,
}

/// Decoder entry for one slot `r` in `[0, M)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotEntry {
    /// Symbol whose interval contains the slot.
    pub symbol: u8,
    /// `F[s]`
    pub freq: u16,
    /// `r - C[s]`
    pub bias: u16,
}

/// Encode and decode tables for one frequency table.
#[derive(Debug, Clone)]
pub struct TansTables {
    encode: Vec<EncodeEntry>,
    slots: Vec<SlotEntry>,
    precision_bits: u32,
}

impl TansTables {
    /// Build both tables from `table`.
    pub fn new(table: &FrequencyTable) -> Self {
        let mut encode = vec![EncodeEntry::default(); MAX_ALPHABET];
        let mut slots = Vec::with_capacity(table.precision() as usize);

        for (s, &freq) in table.frequencies().iter().enumerate() {
            let cum = table.cum(s as u8);
            let rcp = if freq > 1 {
                ((1u64 << 32) / freq as u64) as u32
            } else {
                0
            };
            encode[s] = EncodeEntry { freq, cum, rcp };
            for bias in 0..freq {
                slots.push(SlotEntry {
                    symbol: s as u8,
                    freq: freq as u16,
                    bias: bias as u16,
                });
            }
        }
        debug_assert_eq!(slots.len(), table.precision() as usize);

        Self {
            encode,
            slots,
            precision_bits: table.precision_bits(),
        }
    }

    /// `log2(M)`.
    pub fn precision_bits(&self) -> u32 {
        self.precision_bits
    }

    /// The `M`-entry decode table, indexed by `x mod M`.
    pub fn slots(&self) -> &[SlotEntry] {
        &self.slots
    }

    /// The 256-entry encode table.
    pub fn encode_entries(&self) -> &[EncodeEntry] {
        &self.encode
    }
}

/// `(x / freq, x % freq)` through a reciprocal.
///
/// `rcp = floor(2^32 / freq)` underestimates the quotient by at most one.
#[inline]
fn div_rcp(x: u32, freq: u32, rcp: u32) -> (u32, u32) {
    if freq == 1 {
        return (x, 0);
    }
    let q = ((x as u64 * rcp as u64) >> 32) as u32;
    let r = x - q * freq;
    if r >= freq {
        (q + 1, r - freq)
    } else {
        (q, r)
    }
}

/// Table-driven encoder.
#[derive(Debug, Clone)]
pub struct TansEncoder<'t> {
    state: u32,
    tables: &'t TansTables,
}

impl<'t> TansEncoder<'t> {
    /// Create an encoder in the initial state `M`.
    pub fn new(tables: &'t TansTables) -> Self {
        Self {
            state: 1 << tables.precision_bits,
            tables,
        }
    }

    /// Encode `symbol`, emitting at most one digit to `out`.
    ///
    /// # Errors
    /// Returns `Error::UnencodableSymbol` if `F[symbol]` is 0.
    pub fn encode(&mut self, symbol: u8, out: &mut BitWriter<'_>) -> Result<()> {
        let entry = self.tables.encode[symbol as usize];
        if entry.freq == 0 {
            return Err(Error::UnencodableSymbol(symbol));
        }

        let mut x = self.state;
        if x as u64 >= encode_bound(entry.freq) {
            out.write_digit(x as u16);
            x >>= DIGIT_BITS;
        }

        let (q, r) = div_rcp(x, entry.freq, entry.rcp);
        self.state = (q << self.tables.precision_bits) + r + entry.cum;
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        self.state
    }
}

/// Table-driven decoder.
#[derive(Debug, Clone)]
pub struct TansDecoder<'t> {
    state: u32,
    tables: &'t TansTables,
}

impl<'t> TansDecoder<'t> {
    /// Create a decoder from a persisted final encoder state.
    pub fn new(tables: &'t TansTables, state: u32) -> Self {
        Self { state, tables }
    }

    /// Decode one symbol, consuming at most one digit from `input`.
    pub fn decode(&mut self, input: &mut BitReader<'_>) -> u8 {
        let (symbol, next) = decode_step(self.tables, self.state);
        self.state = match next {
            Step::Done(x) => x,
            Step::NeedDigit(x) => (x << DIGIT_BITS) | input.read_digit() as u32,
        };
        symbol
    }

    /// Current state.
    pub fn state(&self) -> u32 {
        self.state
    }
}

/// Outcome of a decode transform before renormalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The state is already inside `[M, M * b)`.
    Done(u32),
    /// The state is below `M` and must absorb one digit.
    NeedDigit(u32),
}

/// Division-free decode transform shared by the CPU decoder and the host
/// device's lock-step kernel.
#[inline]
pub(crate) fn decode_step(tables: &TansTables, state: u32) -> (u8, Step) {
    let bits = tables.precision_bits;
    let mask = (1u32 << bits) - 1;
    let entry = tables.slots[(state & mask) as usize];
    let x = (entry.freq as u32)
        .wrapping_mul(state >> bits)
        .wrapping_add(entry.bias as u32);
    let step = if x < 1 << bits {
        Step::NeedDigit(x)
    } else {
        Step::Done(x)
    };
    (entry.symbol, step)
}
