//! Error types for the lane ANS codec.

use thiserror::Error;

/// Error variants for encoding, decoding and backend dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// The histogram has no occurring symbol.
    #[error("histogram is empty")]
    EmptyHistogram,

    /// More distinct symbols than the precision denominator can hold.
    #[error("{distinct} distinct symbols do not fit a precision of {precision}")]
    TooManySymbols {
        /// Number of symbols with a nonzero count.
        distinct: usize,
        /// The precision denominator `M`.
        precision: u32,
    },

    /// The alphabet is wider than a single byte.
    #[error("alphabet of {0} symbols exceeds 256")]
    AlphabetTooLarge(usize),

    /// Precision bits outside the supported range.
    #[error("invalid precision: 2^{0}")]
    InvalidPrecision(u32),

    /// The symbol has no probability mass in the table.
    #[error("symbol {0} has zero frequency")]
    UnencodableSymbol(u8),

    /// Symbol run length does not split evenly into lanes.
    #[error("{symbols} symbols do not split into {lanes} lanes of {symbols_per_lane}")]
    LaneMismatch {
        /// Length of the symbol run.
        symbols: usize,
        /// Lane count.
        lanes: usize,
        /// Symbols owned by each lane.
        symbols_per_lane: usize,
    },

    /// Options rejected by validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A value does not fit its fixed-width header field.
    #[error("{field} = {value} exceeds the field maximum {max}")]
    FieldOverflow {
        /// Header field name.
        field: &'static str,
        /// Offending value.
        value: usize,
        /// Largest representable value.
        max: usize,
    },

    /// Container ended before a field or group could be read.
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// Structurally invalid container.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// Compute device, kernel build or dispatch failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl Error {
    /// Whether the error was raised before any symbol was coded.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::EmptyHistogram
                | Error::TooManySymbols { .. }
                | Error::AlphabetTooLarge(_)
                | Error::InvalidPrecision(_)
                | Error::UnencodableSymbol(_)
                | Error::LaneMismatch { .. }
                | Error::InvalidOptions(_)
                | Error::FieldOverflow { .. }
        )
    }

    /// Whether a caller may retry the operation on the CPU.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
