//! Container framing around interleaved groups.
//!
//! Both framings begin with the same preamble recording the session
//! [`Options`]:
//!
//! ```text
//! [version u8][coder u8][layout u8][precision_bits u8][lanes u16 LE][symbols_per_lane u16 LE]
//! ```
//!
//! followed by a framing-specific header (symbol counts, escape side table,
//! group offset table) and the concatenated group payloads. Offsets are
//! cumulative group end positions measured from the start of the payload, so
//! any group can be sliced out without scanning the others.

pub mod byte;
pub mod short;

pub use byte::{ByteContainer, ByteEncoder};
pub use short::{ShortContainer, ShortEncoder};

use tracing::trace;

use crate::coder::Codec;
use crate::config::{CoderKind, LaneLayout, Options};
use crate::error::{Error, Result};
use crate::interleaved::{decode_interleaved, encode_interleaved};

/// Current preamble version.
pub const FORMAT_VERSION: u8 = 1;

/// Bytes in the preamble.
pub const PREAMBLE_LEN: usize = 8;

/// Symbol slots in every count table.
pub const TABLE_SLOTS: usize = 256;

pub(crate) fn write_preamble(out: &mut Vec<u8>, options: &Options) {
    out.push(FORMAT_VERSION);
    out.push(options.coder.tag());
    out.push(options.layout.tag());
    out.push(options.precision_bits as u8);
    out.extend_from_slice(&(options.lanes as u16).to_le_bytes());
    out.extend_from_slice(&(options.symbols_per_lane as u16).to_le_bytes());
}

pub(crate) fn read_preamble(cursor: &mut Cursor<'_>) -> Result<Options> {
    let version = cursor.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(Error::Malformed(format!("unsupported version {version}")));
    }
    let options = Options {
        coder: CoderKind::from_tag(cursor.read_u8()?)?,
        layout: LaneLayout::from_tag(cursor.read_u8()?)?,
        precision_bits: cursor.read_u8()? as u32,
        lanes: cursor.read_u16()? as usize,
        symbols_per_lane: cursor.read_u16()? as usize,
    };
    options
        .validate()
        .map_err(|e| Error::Malformed(format!("preamble: {e}")))?;
    Ok(options)
}

/// Fail with `FieldOverflow` unless `value <= max`.
pub(crate) fn check_field(field: &'static str, value: usize, max: usize) -> Result<()> {
    if value > max {
        return Err(Error::FieldOverflow { field, value, max });
    }
    Ok(())
}

/// Bounds-checked little-endian reader over a header.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(Error::Truncated {
                needed: self.pos.saturating_add(n),
                available: self.data.len(),
            });
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Skip forward to the next multiple of `align`.
    pub(crate) fn align_to(&mut self, align: usize) -> Result<()> {
        let pad = self.pos.next_multiple_of(align) - self.pos;
        self.take(pad).map(|_| ())
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Slice `payload` into groups using cumulative end offsets.
pub(crate) fn slice_groups<'a>(payload: &'a [u8], offsets: &[usize]) -> Result<Vec<&'a [u8]>> {
    let mut groups = Vec::with_capacity(offsets.len());
    let mut start = 0;
    for &end in offsets {
        if end < start || end > payload.len() {
            return Err(Error::Malformed(format!(
                "group offset {end} outside {start}..={}",
                payload.len()
            )));
        }
        groups.push(&payload[start..end]);
        start = end;
    }
    Ok(groups)
}

/// Encode every group of `symbols`; groups are independent.
pub(crate) fn encode_groups(
    symbols: &[u8],
    codec: &Codec,
    options: &Options,
) -> Result<Vec<Vec<u8>>> {
    let per_group = options.symbols_per_group();
    let encode = |group: &[u8]| encode_interleaved(group, codec, options.lanes, options.layout);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        symbols.par_chunks(per_group).map(encode).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        symbols.chunks(per_group).map(encode).collect()
    }
}

/// Decode every group and concatenate the symbols in group order.
pub(crate) fn decode_groups(groups: &[&[u8]], codec: &Codec, options: &Options) -> Result<Vec<u8>> {
    let per_group = options.symbols_per_group();
    let decode = |group: &&[u8]| {
        trace!(bytes = group.len(), "decoding group");
        decode_interleaved(group, per_group, codec, options.lanes, options.layout)
    };

    #[cfg(feature = "parallel")]
    let decoded: Vec<Vec<u8>> = {
        use rayon::prelude::*;
        groups.par_iter().map(decode).collect::<Result<_>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let decoded: Vec<Vec<u8>> = groups.iter().map(decode).collect::<Result<_>>()?;

    Ok(decoded.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_roundtrip() {
        let options = Options::default()
            .with_coder(CoderKind::Table)
            .with_layout(LaneLayout::Strided)
            .with_lanes(300)
            .with_symbols_per_lane(7);
        let mut out = Vec::new();
        write_preamble(&mut out, &options);
        assert_eq!(out.len(), PREAMBLE_LEN);
        assert_eq!(read_preamble(&mut Cursor::new(&out)).unwrap(), options);
    }

    #[test]
    fn test_preamble_rejects_bad_version() {
        let mut out = Vec::new();
        write_preamble(&mut out, &Options::default());
        out[0] = 9;
        assert!(matches!(
            read_preamble(&mut Cursor::new(&out)),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_cursor_bounds() {
        let mut c = Cursor::new(&[1, 2, 3]);
        assert_eq!(c.read_u16().unwrap(), 0x0201);
        assert!(matches!(
            c.read_u16(),
            Err(Error::Truncated {
                needed: 4,
                available: 3
            })
        ));
        let mut c = Cursor::new(&[0; 10]);
        c.read_u8().unwrap();
        c.align_to(4).unwrap();
        assert_eq!(c.rest().len(), 6);
        assert!(c.align_to(16).is_err());
    }

    #[test]
    fn test_slice_groups() {
        let payload = [0u8, 1, 2, 3, 4, 5];
        let groups = slice_groups(&payload, &[2, 6]).unwrap();
        assert_eq!(groups, vec![&payload[..2], &payload[2..]]);
        assert!(slice_groups(&payload, &[4, 2]).is_err());
        assert!(slice_groups(&payload, &[7]).is_err());
    }
}
