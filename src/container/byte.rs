//! Byte framing: 8-bit symbols laid out for GPU consumption.
//!
//! ```text
//! [preamble: 8 bytes]
//! [normalized frequencies: 256 x u16]
//! [group count: u32]
//! [zero padding to a 512-byte boundary]
//! [group end offsets: count x u32]
//! [group payloads ...]
//! [zero padding to a 4-byte boundary]
//! ```
//!
//! Every group payload is a multiple of 4 bytes. Digit streams are whole
//! 16-bit words, so a payload is padded by at most one zero word, placed at
//! the front of the group where a back-to-front decoder never reaches it.
//!
//! The byte alphabet is the full native range, so this framing never
//! produces escape symbols.

use tracing::debug;

use super::{
    check_field, decode_groups, encode_groups, read_preamble, slice_groups, write_preamble,
    Cursor, TABLE_SLOTS,
};
use crate::coder::Codec;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::frequency::{count_symbols, FrequencyTable};
use crate::gpu::BatchDecoder;
use crate::interleaved::{gather_lanes, GroupPayload};

/// Alignment of the offset table.
pub const HEADER_ALIGN: usize = 512;

/// Alignment of every group payload and of the container end.
pub const GROUP_ALIGN: usize = 4;

/// Encodes bytes into the byte framing.
#[derive(Debug, Clone)]
pub struct ByteEncoder {
    options: Options,
}

impl ByteEncoder {
    /// Create an encoder for `options`.
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Session options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Encode `symbols`; the length must be a whole number of groups.
    pub fn encode(&self, symbols: &[u8]) -> Result<Vec<u8>> {
        let options = &self.options;
        let group_count = options.group_count(symbols.len())?;
        check_field("group count", group_count, u32::MAX as usize)?;

        let counts = count_symbols(symbols);
        let codec = Codec::from_counts(&counts, options.precision_bits, options.coder)?;
        let mut groups = encode_groups(symbols, &codec, options)?;

        let mut offsets = Vec::with_capacity(groups.len());
        let mut end = 0usize;
        for group in &mut groups {
            if group.len() % GROUP_ALIGN != 0 {
                debug_assert_eq!(group.len() % 2, 0);
                let mut padded = vec![0u8; 2];
                padded.extend_from_slice(group);
                *group = padded;
            }
            end += group.len();
            check_field("group offset", end, u32::MAX as usize)?;
            offsets.push(end as u32);
        }

        let mut out = Vec::with_capacity(HEADER_ALIGN + 4 * offsets.len() + end + GROUP_ALIGN);
        write_preamble(&mut out, options);
        for &f in &codec.table().padded_frequencies() {
            out.extend_from_slice(&(f as u16).to_le_bytes());
        }
        out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
        out.resize(out.len().next_multiple_of(HEADER_ALIGN), 0);
        for &o in &offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        for group in &groups {
            out.extend_from_slice(group);
        }
        out.resize(out.len().next_multiple_of(GROUP_ALIGN), 0);

        debug!(
            symbols = symbols.len(),
            groups = group_count,
            bytes = out.len(),
            "byte container encoded"
        );
        Ok(out)
    }
}

/// A parsed byte-framing container.
#[derive(Debug, Clone)]
pub struct ByteContainer<'a> {
    options: Options,
    table: FrequencyTable,
    offsets: Vec<usize>,
    payload: &'a [u8],
}

impl<'a> ByteContainer<'a> {
    /// Parse the header of `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let options = read_preamble(&mut cursor)?;

        let freqs = (0..TABLE_SLOTS)
            .map(|_| cursor.read_u16().map(u32::from))
            .collect::<Result<Vec<_>>>()?;
        let table = FrequencyTable::from_frequencies(&freqs, options.precision_bits)?;

        let group_count = cursor.read_u32()? as usize;
        cursor.align_to(HEADER_ALIGN)?;
        let offset_bytes = cursor.take(group_count.saturating_mul(4))?;
        let offsets = offset_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .collect();

        Ok(Self {
            options,
            table,
            offsets,
            payload: cursor.rest(),
        })
    }

    /// Session options from the preamble.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The normalized frequency table.
    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    /// Cumulative group end offsets, relative to the payload start.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Group payloads, in order.
    pub fn groups(&self) -> Result<Vec<&'a [u8]>> {
        slice_groups(self.payload, &self.offsets)
    }

    /// Each group split into its digit stream and lane states.
    pub fn group_payloads(&self) -> Result<Vec<GroupPayload<'a>>> {
        self.groups()?
            .into_iter()
            .map(|g| GroupPayload::parse(g, self.options.lanes))
            .collect()
    }

    /// Decode on the CPU.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let codec = Codec::new(self.table.clone(), self.options.coder);
        let symbols = decode_groups(&self.groups()?, &codec, &self.options)?;
        debug!(
            symbols = symbols.len(),
            groups = self.offsets.len(),
            "byte container decoded"
        );
        Ok(symbols)
    }

    /// Decode every group through a batch decoder.
    ///
    /// # Errors
    /// `InvalidOptions` if the backend decodes lanes of a different length
    /// than the container holds.
    pub fn decode_with(&self, backend: &dyn BatchDecoder) -> Result<Vec<u8>> {
        if backend.symbols_per_lane() != self.options.symbols_per_lane {
            return Err(Error::InvalidOptions(format!(
                "{} decodes {} symbols per lane, container has {}",
                backend.name(),
                backend.symbols_per_lane(),
                self.options.symbols_per_lane
            )));
        }
        let mut symbols = Vec::with_capacity(self.offsets.len() * self.options.symbols_per_group());
        for payload in self.group_payloads()? {
            let lanes = backend.decode_group(&payload.states, &payload.words())?;
            if lanes.len() != self.options.lanes
                || lanes.iter().any(|l| l.len() != self.options.symbols_per_lane)
            {
                return Err(Error::Malformed(format!(
                    "{} returned a group of the wrong shape",
                    backend.name()
                )));
            }
            symbols.extend(gather_lanes(&lanes, self.options.layout));
        }
        Ok(symbols)
    }
}

/// Decode a byte-framing container on the CPU.
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>> {
    ByteContainer::parse(bytes)?.decode()
}
