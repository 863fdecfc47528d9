//! Bit-level writer producing the same LSB-first layout the reader consumes.

use crate::error::{BitError, BitResult};

/// A bit-level writer for building packed payloads.
///
/// Writes are accumulated in an internal buffer. Call [`finish`](Self::finish)
/// to get the final byte buffer; a trailing partial byte is zero-padded in its
/// high bits.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_pos: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub const fn bits_written(&self) -> usize {
        self.bit_pos
    }

    /// Writes a single bit.
    pub fn write_bit(&mut self, value: bool) {
        let offset = self.bit_pos % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if value {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << offset;
            }
        }
        self.bit_pos += 1;
    }

    /// Writes the low `bits` bits of `value`, least significant first.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 64`.
    /// Returns [`BitError::ValueOutOfRange`] if `value` doesn't fit in `bits`.
    pub fn write_bits(&mut self, value: u64, bits: u8) -> BitResult<()> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        if bits < 64 && value >> bits != 0 {
            return Err(BitError::ValueOutOfRange {
                value,
                bits: bits as usize,
            });
        }
        for i in 0..bits {
            self.write_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Writes eight bits.
    pub fn write_byte(&mut self, value: u8) {
        for i in 0..8 {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Writes every byte of `bytes`.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }

    /// Writes the raw bits of an IEEE-754 float.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32_bits(value.to_bits(), 32);
    }

    /// Writes a 7-bits-per-group varint `u32`.
    pub fn write_varu32(&mut self, value: u32) {
        self.write_varu64(u64::from(value));
    }

    /// Writes a 7-bits-per-group varint `u64`.
    pub fn write_varu64(&mut self, mut value: u64) {
        loop {
            let group = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.write_byte(group);
                return;
            }
            self.write_byte(group | 0x80);
        }
    }

    /// Writes a signed varint using the complement scheme read by
    /// [`BitReader::read_vars32`](crate::BitReader::read_vars32).
    pub fn write_vars32(&mut self, value: i32) {
        let raw = if value < 0 {
            ((!value as u32) << 1) | 1
        } else {
            (value as u32) << 1
        };
        self.write_varu32(raw);
    }

    /// Writes a `UBitVar` using the narrowest extension class.
    pub fn write_ubitvar(&mut self, value: u32) {
        let low = value & 0x0F;
        let high = value >> 4;
        if high == 0 {
            self.write_u32_bits(low, 6);
        } else if high < 1 << 4 {
            self.write_u32_bits(low | 0x10, 6);
            self.write_u32_bits(high, 4);
        } else if high < 1 << 8 {
            self.write_u32_bits(low | 0x20, 6);
            self.write_u32_bits(high, 8);
        } else {
            self.write_u32_bits(low | 0x30, 6);
            self.write_u32_bits(high, 28);
        }
    }

    /// Writes the field-path `UBitVar` variant using the narrowest width.
    pub fn write_ubitvar_fp(&mut self, value: u32) {
        for width in [2u8, 4, 10, 17] {
            if u64::from(value) < 1u64 << width {
                self.write_bit(true);
                self.write_u32_bits(value, width);
                return;
            }
            self.write_bit(false);
        }
        self.write_u32_bits(value, 31);
    }

    /// Writes a string followed by a zero terminator.
    pub fn write_cstring(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_byte(0);
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    fn write_u32_bits(&mut self, value: u32, bits: u8) {
        for i in 0..bits {
            self.write_bit((value >> i) & 1 == 1);
        }
    }
}
