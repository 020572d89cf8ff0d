//! Static symbol model: normalized frequencies and their cumulative table.
//!
//! A [`FrequencyTable`] is finalized before the first symbol is coded and
//! never changes afterwards. Encoders and decoders of every lane borrow the
//! same table.

use crate::config::MAX_PRECISION_BITS;
use crate::error::{Error, Result};

/// Largest alphabet a table can describe.
pub const MAX_ALPHABET: usize = 256;

/// Count occurrences of every byte value.
pub fn count_symbols(symbols: &[u8]) -> [u32; MAX_ALPHABET] {
    let mut counts = [0u32; MAX_ALPHABET];
    for &s in symbols {
        counts[s as usize] += 1;
    }
    counts
}

/// Normalized frequencies `F[s]` summing to `M = 2^precision_bits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    freqs: Vec<u32>,
    /// `cumulative[s] = sum(F[t] for t < s)`, with a trailing entry equal to `M`.
    cumulative: Vec<u32>,
    precision_bits: u32,
}

impl FrequencyTable {
    /// Rescale a raw histogram so the frequencies sum to exactly `M`.
    ///
    /// Every symbol with a nonzero count keeps a frequency of at least one.
    /// Symbols that would round down to zero borrow a slot from the currently
    /// largest frequency. The result depends only on `counts` and
    /// `precision_bits`.
    ///
    /// # Errors
    /// - `EmptyHistogram` if every count is zero.
    /// - `TooManySymbols` if more than `M` symbols occur.
    /// - `AlphabetTooLarge` if `counts` has more than 256 entries.
    pub fn normalize(counts: &[u32], precision_bits: u32) -> Result<Self> {
        check_precision(precision_bits)?;
        if counts.len() > MAX_ALPHABET {
            return Err(Error::AlphabetTooLarge(counts.len()));
        }
        let precision = 1u64 << precision_bits;
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return Err(Error::EmptyHistogram);
        }
        let distinct = counts.iter().filter(|&&c| c > 0).count();
        if distinct as u64 > precision {
            return Err(Error::TooManySymbols {
                distinct,
                precision: precision as u32,
            });
        }

        let n = counts.len();
        let mut cum = vec![0u64; n + 1];
        for (i, &c) in counts.iter().enumerate() {
            cum[i + 1] = cum[i] + c as u64;
        }
        for c in cum.iter_mut().skip(1) {
            *c = *c * precision / total;
        }

        for i in 0..n {
            if counts[i] == 0 || cum[i + 1] != cum[i] {
                continue;
            }
            let mut best = None;
            let mut best_freq = 1;
            for j in 0..n {
                let f = cum[j + 1] - cum[j];
                if f > best_freq {
                    best_freq = f;
                    best = Some(j);
                }
            }
            // A donor always exists: `distinct <= M` and symbol `i` holds nothing.
            let Some(best) = best else {
                return Err(Error::TooManySymbols {
                    distinct,
                    precision: precision as u32,
                });
            };
            if best < i {
                for c in &mut cum[best + 1..=i] {
                    *c -= 1;
                }
            } else {
                for c in &mut cum[i + 1..=best] {
                    *c += 1;
                }
            }
        }

        let freqs = cum.windows(2).map(|w| (w[1] - w[0]) as u32).collect();
        let cumulative = cum.iter().map(|&c| c as u32).collect();
        Ok(Self {
            freqs,
            cumulative,
            precision_bits,
        })
    }

    /// Adopt already-normalized frequencies, e.g. read back from a container.
    ///
    /// # Errors
    /// `Malformed` if the frequencies do not sum to `M`.
    pub fn from_frequencies(freqs: &[u32], precision_bits: u32) -> Result<Self> {
        check_precision(precision_bits)?;
        if freqs.len() > MAX_ALPHABET {
            return Err(Error::AlphabetTooLarge(freqs.len()));
        }
        let mut cumulative = Vec::with_capacity(freqs.len() + 1);
        let mut acc = 0u64;
        cumulative.push(0);
        for &f in freqs {
            acc += f as u64;
            cumulative.push(acc.min(u32::MAX as u64) as u32);
        }
        if acc != 1u64 << precision_bits {
            return Err(Error::Malformed(format!(
                "frequencies sum to {acc}, expected {}",
                1u64 << precision_bits
            )));
        }
        Ok(Self {
            freqs: freqs.to_vec(),
            cumulative,
            precision_bits,
        })
    }

    /// `log2(M)`.
    #[inline]
    pub fn precision_bits(&self) -> u32 {
        self.precision_bits
    }

    /// The precision denominator `M`.
    #[inline]
    pub fn precision(&self) -> u32 {
        1 << self.precision_bits
    }

    /// Number of symbol slots described (zero-frequency symbols included).
    pub fn alphabet_len(&self) -> usize {
        self.freqs.len()
    }

    /// Number of symbols with a nonzero frequency.
    pub fn distinct(&self) -> usize {
        self.freqs.iter().filter(|&&f| f > 0).count()
    }

    /// `F[s]`, zero for symbols outside the alphabet.
    #[inline]
    pub fn freq(&self, symbol: u8) -> u32 {
        self.freqs.get(symbol as usize).copied().unwrap_or(0)
    }

    /// `C[s]`.
    #[inline]
    pub fn cum(&self, symbol: u8) -> u32 {
        self.cumulative
            .get(symbol as usize)
            .copied()
            .unwrap_or_else(|| self.precision())
    }

    /// All frequencies.
    pub fn frequencies(&self) -> &[u32] {
        &self.freqs
    }

    /// Cumulative frequencies, one entry per symbol followed by `M`.
    pub fn cumulative(&self) -> &[u32] {
        &self.cumulative
    }

    /// Frequencies widened to the full 256-slot table.
    pub fn padded_frequencies(&self) -> [u32; MAX_ALPHABET] {
        let mut out = [0u32; MAX_ALPHABET];
        out[..self.freqs.len()].copy_from_slice(&self.freqs);
        out
    }

    /// Symbol whose interval `[C[s], C[s] + F[s])` contains `slot`.
    ///
    /// `slot` must be below `M`.
    #[inline]
    pub fn symbol_for_slot(&self, slot: u32) -> u8 {
        // First cumulative entry strictly above `slot`, minus one.
        let upper = self.cumulative[1..].partition_point(|&c| c <= slot);
        upper.min(self.freqs.len().saturating_sub(1)) as u8
    }
}

fn check_precision(bits: u32) -> Result<()> {
    if bits == 0 || bits > MAX_PRECISION_BITS {
        return Err(Error::InvalidPrecision(bits));
    }
    Ok(())
}
