//! # Interleaved rANS for lock-step decoding
//!
//! *Entropy coding laid out so hundreds of threads can decode it at once.*
//!
//! ## Intuition First
//!
//! An ANS coder keeps its whole history in one integer state. Encoding a
//! frequent symbol grows the state a little, a rare symbol grows it a lot,
//! and whenever the state gets too large its low 16 bits are shipped out.
//! Decoding runs the same machine backwards.
//!
//! One state is inherently sequential. Give every thread its own state (a
//! *lane*) and let all lanes share one stream of 16-bit digits, written in a
//! fixed step-by-lane order, and a GPU can decode a whole group in lock-step:
//! each thread only needs to know how many of the threads before it also
//! wanted a digit this step.
//!
//! ## Mathematical Formulation
//!
//! With precision $M = 2^k$ ($k \le 15$), normalized frequencies $F_s$
//! summing to $M$ and cumulative $C_s = \sum_{t<s} F_t$, the state stays in
//! $[M, M \cdot 2^{16})$ between steps:
//!
//! ```text
//! encode:  if x >= F_s * 2^16 { emit(x mod 2^16); x = x / 2^16 }
//!          x = (x / F_s) * M + (x mod F_s) + C_s
//! decode:  s = symbol(x mod M)
//!          x = F_s * (x / M) + (x mod M) - C_s
//!          if x < M { x = x * 2^16 + read() }
//! ```
//!
//! Every step emits or consumes at most one digit, which is what makes the
//! lane interleaving well defined.
//!
//! ## Crate layout
//!
//! - [`frequency`]: histogram normalization to $M$.
//! - [`bitstream`]: LSB-first bit writer and reader.
//! - [`rans`], [`tans`]: the division-based and table-driven coders. Both
//!   produce bit-identical streams.
//! - [`coder`]: a [`Codec`] binds one table to one coder strategy.
//! - [`interleaved`]: the lane protocol for one group.
//! - [`escape`]: sentinel plus side table for values outside the alphabet.
//! - [`container`]: self-describing short (`i16`) and byte (`u8`) framings.
//! - [`gpu`]: batch decoding through a compute device, with a kernel cache.
//!
//! ## Failure Modes
//!
//! 1. **Corrupt payloads**: headers and slice bounds are checked, the
//!    bitstream itself is not. Garbage in decodes to garbage out.
//! 2. **Precision**: a histogram with more distinct symbols than $M$ cannot
//!    be normalized.
//!
//! ## References
//!
//! - Duda, J. (2013). "Asymmetric numeral systems: entropy coding combining
//!   speed of Huffman coding with compression rate of arithmetic coding."
//! - Giesen, F. (2014). "Interleaved entropy coders."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod coder;
pub mod config;
pub mod container;
pub mod error;
pub mod escape;
pub mod frequency;
pub mod gpu;
pub mod interleaved;
pub mod rans;
pub mod tans;

pub use coder::Codec;
pub use config::{CoderKind, LaneLayout, Options};
pub use container::{ByteContainer, ByteEncoder, ShortContainer, ShortEncoder};
pub use error::{Error, Result};
pub use frequency::{count_symbols, FrequencyTable};
pub use gpu::{BatchDecoder, CpuBatchDecoder, GpuBatchDecoder, HostDevice, KernelCache};
pub use interleaved::{decode_interleaved, encode_interleaved};
pub use rans::{RansDecoder, RansEncoder};
pub use tans::{TansDecoder, TansEncoder, TansTables};
