//! Escape mechanism for values outside a codec's native symbol range.
//!
//! A value inside `[-127, 127]` becomes its two's-complement byte. Anything
//! else becomes the sentinel symbol `0x80` (which no native value maps to)
//! and the value itself is appended to an out-of-band side table. Decoding
//! consumes the side table in the order sentinels appear.

use crate::error::{Error, Result};

/// Sentinel symbol marking an escaped value.
pub const ESCAPE_SYMBOL: u8 = 0x80;

/// Largest magnitude coded natively.
pub const NATIVE_LIMIT: i16 = 127;

/// Symbols plus the values that did not fit the native range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Escaped {
    /// One symbol per input value.
    pub symbols: Vec<u8>,
    /// Escaped values in first-seen order.
    pub escapes: Vec<i16>,
}

/// Map `values` to byte symbols, escaping out-of-range values.
pub fn split_escapes(values: &[i16]) -> Escaped {
    let mut out = Escaped {
        symbols: Vec::with_capacity(values.len()),
        escapes: Vec::new(),
    };
    for &v in values {
        if (-NATIVE_LIMIT..=NATIVE_LIMIT).contains(&v) {
            out.symbols.push(v as i8 as u8);
        } else {
            out.symbols.push(ESCAPE_SYMBOL);
            out.escapes.push(v);
        }
    }
    out
}

/// Inverse of [`split_escapes`].
///
/// # Errors
/// `Malformed` if the sentinels outnumber the side table or leave part of it
/// unused.
pub fn merge_escapes(symbols: &[u8], escapes: &[i16]) -> Result<Vec<i16>> {
    let mut side = escapes.iter();
    let mut out = Vec::with_capacity(symbols.len());
    for &s in symbols {
        if s == ESCAPE_SYMBOL {
            let v = side.next().ok_or_else(|| {
                Error::Malformed(format!("more than {} escape symbols", escapes.len()))
            })?;
            out.push(*v);
        } else {
            out.push(s as i8 as i16);
        }
    }
    if side.next().is_some() {
        return Err(Error::Malformed(format!(
            "{} escape values left unused",
            side.count() + 1
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_values_escape() {
        let values = [5, 200, -40, 5, -300, 127, -127];
        let escaped = split_escapes(&values);
        assert_eq!(escaped.escapes, vec![200, -300]);
        assert_eq!(
            escaped.symbols,
            vec![5, ESCAPE_SYMBOL, (-40i8) as u8, 5, ESCAPE_SYMBOL, 127, 0x81]
        );
        assert_eq!(
            merge_escapes(&escaped.symbols, &escaped.escapes).unwrap(),
            values
        );
    }

    #[test]
    fn test_minus_128_is_escaped() {
        let escaped = split_escapes(&[-128, i16::MIN, i16::MAX]);
        assert_eq!(escaped.symbols, vec![ESCAPE_SYMBOL; 3]);
        assert_eq!(escaped.escapes, vec![-128, i16::MIN, i16::MAX]);
    }

    #[test]
    fn test_side_table_mismatch() {
        assert!(merge_escapes(&[ESCAPE_SYMBOL, ESCAPE_SYMBOL], &[300]).is_err());
        assert!(merge_escapes(&[1, 2], &[300]).is_err());
    }
}
