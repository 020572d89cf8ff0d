//! Bit-granular writer and reader over byte buffers.
//!
//! Bits are packed LSB-first into bytes, so a 16-bit renormalization digit
//! written at a byte boundary lands as one little-endian `u16`.
//!
//! ANS is last-in first-out: digits written while encoding symbols
//! `0, 1, 2, ...` must be read back newest-first. Encoders write forward; a
//! decoder reverses the digit words with [`reverse_words`] and reads forward.

/// Width of one renormalization digit.
pub const DIGIT_BITS: u32 = 16;

/// Appends bits to a byte buffer.
///
/// Pending bits are flushed (zero-padded to a byte) when the writer is
/// finished or dropped.
pub struct BitWriter<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
    acc: u64,
    nbits: u32,
}

impl<'a> BitWriter<'a> {
    /// Writer appending at the current end of `buf`.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        Self {
            buf,
            start,
            acc: 0,
            nbits: 0,
        }
    }

    /// Writer starting at byte `pos`; anything past `pos` is discarded and
    /// a shorter buffer is zero-extended.
    pub fn at(buf: &'a mut Vec<u8>, pos: usize) -> Self {
        buf.resize(pos, 0);
        Self::new(buf)
    }

    /// Append the low `n` bits of `value`, `n <= 32`.
    #[inline]
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        if n == 0 {
            return;
        }
        let mask = if n == 32 { u32::MAX } else { (1u32 << n) - 1 };
        self.acc |= ((value & mask) as u64) << self.nbits;
        self.nbits += n;
        while self.nbits >= 8 {
            self.buf.push(self.acc as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    /// Append one renormalization digit.
    #[inline]
    pub fn write_digit(&mut self, digit: u16) {
        self.write_bits(digit as u32, DIGIT_BITS);
    }

    /// Bytes produced so far, counting a partially filled byte.
    pub fn bytes_written(&self) -> usize {
        self.buf.len() - self.start + usize::from(self.nbits > 0)
    }

    /// Flush pending bits and return the number of bytes written.
    pub fn finish(mut self) -> usize {
        self.flush();
        self.buf.len() - self.start
    }

    fn flush(&mut self) {
        if self.nbits > 0 {
            self.buf.push(self.acc as u8);
            self.acc = 0;
            self.nbits = 0;
        }
    }
}

impl Drop for BitWriter<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Reads bits from a byte slice in the order [`BitWriter`] wrote them.
///
/// Reading past the end yields zero bits; a short stream is not an error.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    start: usize,
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Reader positioned at the first byte.
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Reader positioned at byte `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            start: pos * 8,
            pos: pos * 8,
        }
    }

    /// Read an `n`-bit literal, `n <= 32`.
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        let mut out = 0u32;
        let mut got = 0;
        while got < n {
            let offset = (self.pos % 8) as u32;
            let take = (8 - offset).min(n - got);
            let byte = self.data.get(self.pos / 8).copied().unwrap_or(0) as u32;
            let bits = (byte >> offset) & ((1u32 << take) - 1);
            out |= bits << got;
            got += take;
            self.pos += take as usize;
        }
        out
    }

    /// Read one renormalization digit.
    #[inline]
    pub fn read_digit(&mut self) -> u16 {
        self.read_bits(DIGIT_BITS) as u16
    }

    /// Bytes consumed so far, counting a partially consumed byte.
    pub fn bytes_read(&self) -> usize {
        (self.pos - self.start).div_ceil(8)
    }

    /// Bits left before the end of the slice.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }
}

/// Reverse the order of the little-endian 16-bit words in `bytes`.
///
/// A trailing odd byte is dropped; digit streams are always whole words.
pub fn reverse_words(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() & !1);
    for word in bytes.chunks_exact(2).rev() {
        out.extend_from_slice(word);
    }
    out
}

/// Interpret `bytes` as little-endian `u16` words.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect()
}

/// Serialize `u16` words little-endian.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
