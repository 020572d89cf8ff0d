//! Short framing: signed 16-bit residuals, compact 16-bit header fields.
//!
//! ```text
//! [preamble: 8 bytes]
//! [raw symbol counts: 256 x u16]
//! [escape count: u16][escaped values: count x u16 (two's complement)]
//! [group count: u16][group end offsets: count x u16]
//! [group payloads ...]
//! ```
//!
//! Counts are stored raw; the decoder re-derives the frequency table with
//! the same deterministic normalization the encoder used.

use tracing::debug;

use super::{
    check_field, decode_groups, encode_groups, read_preamble, slice_groups, write_preamble,
    Cursor, TABLE_SLOTS,
};
use crate::coder::Codec;
use crate::config::Options;
use crate::error::Result;
use crate::escape::{merge_escapes, split_escapes};
use crate::frequency::count_symbols;

const FIELD_MAX: usize = u16::MAX as usize;

/// Encodes `i16` values into the short framing.
#[derive(Debug, Clone)]
pub struct ShortEncoder {
    options: Options,
}

impl ShortEncoder {
    /// Create an encoder for `options`.
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Session options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Encode `values`; the length must be a whole number of groups.
    ///
    /// # Errors
    /// Configuration errors (group size, histogram, field widths) are
    /// reported before any group is encoded.
    pub fn encode(&self, values: &[i16]) -> Result<Vec<u8>> {
        let options = &self.options;
        let group_count = options.group_count(values.len())?;
        check_field("group count", group_count, FIELD_MAX)?;

        let escaped = split_escapes(values);
        check_field("escape count", escaped.escapes.len(), FIELD_MAX)?;

        let counts = count_symbols(&escaped.symbols);
        let widest = counts.iter().copied().max().unwrap_or(0) as usize;
        check_field("symbol count", widest, FIELD_MAX)?;

        let codec = Codec::from_counts(&counts, options.precision_bits, options.coder)?;
        let groups = encode_groups(&escaped.symbols, &codec, options)?;

        let mut offsets = Vec::with_capacity(groups.len());
        let mut end = 0usize;
        for group in &groups {
            end += group.len();
            check_field("group offset", end, FIELD_MAX)?;
            offsets.push(end as u16);
        }

        let header_len =
            super::PREAMBLE_LEN + 2 * (TABLE_SLOTS + 2 + escaped.escapes.len() + offsets.len());
        let mut out = Vec::with_capacity(header_len + end);
        write_preamble(&mut out, options);
        for &c in &counts {
            out.extend_from_slice(&(c as u16).to_le_bytes());
        }
        out.extend_from_slice(&(escaped.escapes.len() as u16).to_le_bytes());
        for &v in &escaped.escapes {
            out.extend_from_slice(&(v as u16).to_le_bytes());
        }
        out.extend_from_slice(&(offsets.len() as u16).to_le_bytes());
        for &o in &offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        for group in &groups {
            out.extend_from_slice(group);
        }

        debug!(
            values = values.len(),
            groups = group_count,
            escapes = escaped.escapes.len(),
            bytes = out.len(),
            "short container encoded"
        );
        Ok(out)
    }
}

/// A parsed short-framing container.
#[derive(Debug, Clone)]
pub struct ShortContainer<'a> {
    options: Options,
    counts: Vec<u32>,
    escapes: Vec<i16>,
    offsets: Vec<usize>,
    payload: &'a [u8],
}

impl<'a> ShortContainer<'a> {
    /// Parse the header of `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let options = read_preamble(&mut cursor)?;

        let counts = (0..TABLE_SLOTS)
            .map(|_| cursor.read_u16().map(u32::from))
            .collect::<Result<Vec<_>>>()?;

        let escape_count = cursor.read_u16()? as usize;
        let escapes = (0..escape_count)
            .map(|_| cursor.read_u16().map(|v| v as i16))
            .collect::<Result<Vec<_>>>()?;

        let group_count = cursor.read_u16()? as usize;
        let offsets = (0..group_count)
            .map(|_| cursor.read_u16().map(usize::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            options,
            counts,
            escapes,
            offsets,
            payload: cursor.rest(),
        })
    }

    /// Session options from the preamble.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Raw symbol counts.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Escaped values in first-seen order.
    pub fn escapes(&self) -> &[i16] {
        &self.escapes
    }

    /// Cumulative group end offsets, relative to the payload start.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Group payloads, in order.
    pub fn groups(&self) -> Result<Vec<&'a [u8]>> {
        slice_groups(self.payload, &self.offsets)
    }

    /// Rebuild the codec the encoder used.
    pub fn codec(&self) -> Result<Codec> {
        Codec::from_counts(&self.counts, self.options.precision_bits, self.options.coder)
    }

    /// Decode the byte symbols, escapes still unresolved.
    pub fn decode_symbols(&self) -> Result<Vec<u8>> {
        let codec = self.codec()?;
        decode_groups(&self.groups()?, &codec, &self.options)
    }

    /// Decode the original values.
    pub fn decode(&self) -> Result<Vec<i16>> {
        let symbols = self.decode_symbols()?;
        let values = merge_escapes(&symbols, &self.escapes)?;
        debug!(
            values = values.len(),
            groups = self.offsets.len(),
            "short container decoded"
        );
        Ok(values)
    }
}

/// Decode a short-framing container.
pub fn decode(bytes: &[u8]) -> Result<Vec<i16>> {
    ShortContainer::parse(bytes)?.decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoderKind, LaneLayout};
    use crate::error::Error;
    use crate::escape::ESCAPE_SYMBOL;

    fn residuals(len: usize) -> Vec<i16> {
        (0..len as i32)
            .map(|i| match i % 37 {
                0 => 400,
                1 => -1000,
                k => ((k * 7) % 11 - 5) as i16,
            })
            .collect()
    }

    #[test]
    fn test_short_roundtrip_both_coders() {
        for coder in [CoderKind::Range, CoderKind::Table] {
            let options = Options::default()
                .with_coder(coder)
                .with_lanes(16)
                .with_symbols_per_lane(16);
            let values = residuals(3 * 256);
            let bytes = ShortEncoder::new(options).unwrap().encode(&values).unwrap();
            assert_eq!(decode(&bytes).unwrap(), values);
        }
    }

    #[test]
    fn test_escape_values_roundtrip() {
        let options = Options::default().with_lanes(1).with_symbols_per_lane(4);
        let values = [5i16, 200, -40, 5];
        let bytes = ShortEncoder::new(options).unwrap().encode(&values).unwrap();
        let container = ShortContainer::parse(&bytes).unwrap();
        assert_eq!(container.escapes(), &[200]);
        assert_eq!(container.counts()[ESCAPE_SYMBOL as usize], 1);
        assert_eq!(container.decode().unwrap(), values);
    }

    #[test]
    fn test_offsets_are_cumulative_group_lengths() {
        let options = Options::default()
            .with_lanes(16)
            .with_symbols_per_lane(16)
            .with_layout(LaneLayout::Strided);
        let values = residuals(2 * 16 * 16);
        let bytes = ShortEncoder::new(options).unwrap().encode(&values).unwrap();
        let container = ShortContainer::parse(&bytes).unwrap();

        let symbols = split_escapes(&values).symbols;
        let codec =
            Codec::from_counts(&count_symbols(&symbols), options.precision_bits, options.coder)
                .unwrap();
        let lens: Vec<usize> = symbols
            .chunks(options.symbols_per_group())
            .map(|chunk| {
                crate::interleaved::encode_interleaved(chunk, &codec, 16, LaneLayout::Strided)
                    .unwrap()
                    .len()
            })
            .collect();
        assert_eq!(container.offsets(), &[lens[0], lens[0] + lens[1]]);
        let header = bytes.len() - container.offsets()[1];
        assert_eq!(header, 8 + 2 * (256 + 1 + container.escapes().len() + 1 + 2));
    }

    #[test]
    fn test_configuration_errors_before_encoding() {
        let encoder = ShortEncoder::new(Options::default()).unwrap();
        let err = encoder.encode(&residuals(100)).unwrap_err();
        assert!(matches!(err, Error::LaneMismatch { symbols: 100, .. }));

        let err = encoder.encode(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyHistogram));

        // One symbol repeated past the u16 count field.
        let options = Options::default()
            .with_lanes(1)
            .with_symbols_per_lane(70_000 / 2);
        let encoder = ShortEncoder::new(options).unwrap();
        let err = encoder.encode(&vec![3i16; 70_000]).unwrap_err();
        assert!(matches!(err, Error::FieldOverflow { field: "symbol count", .. }));
    }

    #[test]
    fn test_truncated_header() {
        let options = Options::default().with_lanes(2).with_symbols_per_lane(2);
        let bytes = ShortEncoder::new(options).unwrap().encode(&[1, 2, 3, 4]).unwrap();
        assert!(matches!(
            decode(&bytes[..100]),
            Err(Error::Truncated { .. })
        ));
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
