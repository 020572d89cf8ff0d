//! Session options shared by encoder and decoder.
//!
//! Every field here is recorded in the container preamble, so a decoder
//! reconstructs the exact session from the bytes alone.

use crate::error::{Error, Result};

/// Largest supported precision: `M = 2^15`, keeping `M < 2^16`.
pub const MAX_PRECISION_BITS: u32 = 15;

/// Default precision bits (`M = 4096`).
pub const DEFAULT_PRECISION_BITS: u32 = 12;

/// Lanes per group used by the GPU batch decoder.
pub const GPU_LANES: usize = 16;

/// Symbols per lane used by the GPU batch decoder.
pub const GPU_SYMBOLS_PER_LANE: usize = 256;

/// Arithmetic strategy of the ANS coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoderKind {
    /// Division-based rANS transform with a cumulative-table search on decode.
    #[default]
    Range,
    /// Division-free transform driven by precomputed tables.
    Table,
}

impl CoderKind {
    /// Wire tag stored in the preamble.
    pub fn tag(self) -> u8 {
        match self {
            CoderKind::Range => 0,
            CoderKind::Table => 1,
        }
    }

    /// Inverse of [`CoderKind::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CoderKind::Range),
            1 => Ok(CoderKind::Table),
            other => Err(Error::Malformed(format!("unknown coder tag {other}"))),
        }
    }
}

/// Assignment of a group's symbols to its lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneLayout {
    /// Lane `j` owns the run `[j * n, (j + 1) * n)`.
    #[default]
    Contiguous,
    /// Lane `j` owns `j, j + L, j + 2L, ...`.
    Strided,
}

impl LaneLayout {
    /// Position within the group of the `step`-th symbol of `lane`.
    #[inline]
    pub fn index(self, lane: usize, step: usize, lanes: usize, symbols_per_lane: usize) -> usize {
        match self {
            LaneLayout::Contiguous => lane * symbols_per_lane + step,
            LaneLayout::Strided => step * lanes + lane,
        }
    }

    /// Wire tag stored in the preamble.
    pub fn tag(self) -> u8 {
        match self {
            LaneLayout::Contiguous => 0,
            LaneLayout::Strided => 1,
        }
    }

    /// Inverse of [`LaneLayout::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(LaneLayout::Contiguous),
            1 => Ok(LaneLayout::Strided),
            other => Err(Error::Malformed(format!("unknown lane layout {other}"))),
        }
    }
}

/// Encode/decode session options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
    /// Coder strategy.
    pub coder: CoderKind,
    /// `log2(M)`.
    pub precision_bits: u32,
    /// Lanes per group.
    pub lanes: usize,
    /// Symbols coded by each lane of a group.
    pub symbols_per_lane: usize,
    /// Symbol-to-lane assignment.
    pub layout: LaneLayout,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            coder: CoderKind::Range,
            precision_bits: DEFAULT_PRECISION_BITS,
            lanes: GPU_LANES,
            symbols_per_lane: GPU_SYMBOLS_PER_LANE,
            layout: LaneLayout::Contiguous,
        }
    }
}

impl Options {
    /// Options matching the GPU batch decoder constraints.
    pub fn gpu() -> Self {
        Self {
            coder: CoderKind::Table,
            ..Self::default()
        }
    }

    /// Set the coder strategy.
    pub fn with_coder(mut self, coder: CoderKind) -> Self {
        self.coder = coder;
        self
    }

    /// Set `log2(M)`.
    pub fn with_precision_bits(mut self, bits: u32) -> Self {
        self.precision_bits = bits;
        self
    }

    /// Set lanes per group.
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    /// Set symbols per lane.
    pub fn with_symbols_per_lane(mut self, n: usize) -> Self {
        self.symbols_per_lane = n;
        self
    }

    /// Set the lane layout.
    pub fn with_layout(mut self, layout: LaneLayout) -> Self {
        self.layout = layout;
        self
    }

    /// The precision denominator `M`.
    pub fn precision(&self) -> u32 {
        1 << self.precision_bits
    }

    /// Symbols per group (`L * n`).
    pub fn symbols_per_group(&self) -> usize {
        self.lanes * self.symbols_per_lane
    }

    /// Check every field against the format limits.
    pub fn validate(&self) -> Result<()> {
        if self.precision_bits == 0 || self.precision_bits > MAX_PRECISION_BITS {
            return Err(Error::InvalidPrecision(self.precision_bits));
        }
        if self.lanes == 0 || self.lanes > u16::MAX as usize {
            return Err(Error::InvalidOptions(format!(
                "lane count {} outside 1..=65535",
                self.lanes
            )));
        }
        if self.symbols_per_lane == 0 || self.symbols_per_lane > u16::MAX as usize {
            return Err(Error::InvalidOptions(format!(
                "symbols per lane {} outside 1..=65535",
                self.symbols_per_lane
            )));
        }
        Ok(())
    }

    /// Number of groups in a run of `len` symbols.
    ///
    /// # Errors
    /// `LaneMismatch` when `len` is not a whole number of groups.
    pub fn group_count(&self, len: usize) -> Result<usize> {
        let per_group = self.symbols_per_group();
        if per_group == 0 || len % per_group != 0 {
            return Err(Error::LaneMismatch {
                symbols: len,
                lanes: self.lanes,
                symbols_per_lane: self.symbols_per_lane,
            });
        }
        Ok(len / per_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Options::default().validate().unwrap();
        let gpu = Options::gpu();
        gpu.validate().unwrap();
        assert_eq!(gpu.coder, CoderKind::Table);
        assert_eq!(gpu.symbols_per_group(), 4096);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert!(matches!(
            Options::default().with_precision_bits(16).validate(),
            Err(Error::InvalidPrecision(16))
        ));
        assert!(Options::default().with_lanes(0).validate().is_err());
        assert!(Options::default()
            .with_symbols_per_lane(70_000)
            .validate()
            .is_err());
    }

    #[test]
    fn test_layout_index() {
        // 4 lanes of 3 symbols.
        assert_eq!(LaneLayout::Contiguous.index(2, 1, 4, 3), 7);
        assert_eq!(LaneLayout::Strided.index(2, 1, 4, 3), 6);
    }

    #[test]
    fn test_group_count() {
        let opts = Options::default().with_lanes(4).with_symbols_per_lane(2);
        assert_eq!(opts.group_count(16).unwrap(), 2);
        assert!(matches!(
            opts.group_count(12),
            Err(Error::LaneMismatch { symbols: 12, .. })
        ));
    }

    #[test]
    fn test_tags_roundtrip() {
        for kind in [CoderKind::Range, CoderKind::Table] {
            assert_eq!(CoderKind::from_tag(kind.tag()).unwrap(), kind);
        }
        for layout in [LaneLayout::Contiguous, LaneLayout::Strided] {
            assert_eq!(LaneLayout::from_tag(layout.tag()).unwrap(), layout);
        }
        assert!(CoderKind::from_tag(9).is_err());
    }
}
