//! Bit-level reader with bounded operations.
//!
//! Bits are consumed least-significant-bit first within each byte, and
//! multi-bit values are assembled with the first consumed bit as bit 0.

use crate::error::{BitError, BitResult};

/// Extension widths selected by the top two bits of a six-bit header.
const UBV_EXTENSION_BITS: [u8; 4] = [0, 4, 8, 28];

/// Number of bits in a packed normal magnitude.
const NORMAL_FRACTION_BITS: u8 = 11;
const NORMAL_DENOMINATOR: f64 = ((1u32 << NORMAL_FRACTION_BITS) - 1) as f64;

const COORD_INTEGER_BITS: u8 = 14;
const COORD_FRACTION_BITS: u8 = 5;
const COORD_RESOLUTION: f64 = 1.0 / (1u32 << COORD_FRACTION_BITS) as f64;

/// A bit-level reader for decoding packed binary data.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a new `BitReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Returns the number of bits remaining to read.
    #[must_use]
    pub const fn bits_remaining(&self) -> usize {
        self.data
            .len()
            .saturating_mul(8)
            .saturating_sub(self.bit_pos)
    }

    /// Returns `true` if there are no more bits to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }

    /// Returns the current bit position.
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Returns the total length of the underlying buffer in bits.
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.data.len().saturating_mul(8)
    }

    /// Skips `bits` bits.
    pub fn skip_bits(&mut self, bits: usize) -> BitResult<()> {
        self.ensure_bits(bits)?;
        self.bit_pos += bits;
        Ok(())
    }

    /// Reads a single bit as a boolean.
    pub fn read_bit(&mut self) -> BitResult<bool> {
        self.ensure_bits(1)?;
        let byte = self.data[self.bit_pos / 8];
        let bit = (byte >> (self.bit_pos % 8)) & 1;
        self.bit_pos += 1;
        Ok(bit == 1)
    }

    /// Reads up to 64 bits as an unsigned integer.
    pub fn read_bits(&mut self, bits: u8) -> BitResult<u64> {
        if bits > 64 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 64,
            });
        }
        if bits == 0 {
            return Ok(0);
        }
        self.ensure_bits(bits as usize)?;

        let bits = bits as usize;
        let mut value = 0u64;
        let mut filled = 0usize;
        while filled < bits {
            let offset = self.bit_pos % 8;
            let take = (8 - offset).min(bits - filled);
            let mask = (1u16 << take) - 1;
            let chunk = (u16::from(self.data[self.bit_pos / 8] >> offset) & mask) as u64;
            value |= chunk << filled;
            filled += take;
            self.bit_pos += take;
        }
        Ok(value)
    }

    /// Reads up to 32 bits as a `u32`.
    pub fn read_ubits(&mut self, bits: u8) -> BitResult<u32> {
        if bits > 32 {
            return Err(BitError::InvalidBitCount {
                bits: bits as usize,
                max_bits: 32,
            });
        }
        Ok(self.read_bits(bits)? as u32)
    }

    /// Reads eight bits as a byte (no alignment required).
    pub fn read_byte(&mut self) -> BitResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Reads 32 raw bits and reinterprets them as an IEEE-754 float.
    pub fn read_f32(&mut self) -> BitResult<f32> {
        Ok(f32::from_bits(self.read_ubits(32)?))
    }

    /// Reads a 7-bits-per-group varint `u32`.
    ///
    /// Decoding stops after five groups even if the continuation bit of the
    /// fifth group is set; excess high bits are discarded.
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let mut result = 0u32;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            result |= u32::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 || shift == 35 {
                return Ok(result);
            }
        }
    }

    /// Reads a 7-bits-per-group varint `u64`.
    pub fn read_varu64(&mut self) -> BitResult<u64> {
        let start = self.bit_pos;
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            if shift > 63 {
                return Err(BitError::InvalidVarint { bit_position: start });
            }
            let byte = self.read_byte()?;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Reads a signed varint.
    ///
    /// The low bit of the unsigned varint selects a bitwise complement of the
    /// remaining bits: raw `3` decodes to `!1 == -2`, raw `4` to `2`.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let raw = self.read_varu32()?;
        let value = (raw >> 1) as i32;
        if raw & 1 == 0 {
            Ok(value)
        } else {
            Ok(!value)
        }
    }

    /// Reads a `UBitVar`: six bits whose bits 4-5 select 0, 4, 8 or 28
    /// extension bits placed above the low nibble.
    pub fn read_ubitvar(&mut self) -> BitResult<u32> {
        let head = self.read_ubits(6)?;
        let value = match head & 0x30 {
            0x10 => (head & 0x0F) | (self.read_ubits(4)? << 4),
            0x20 => (head & 0x0F) | (self.read_ubits(8)? << 4),
            0x30 => (head & 0x0F) | (self.read_ubits(28)? << 4),
            _ => head,
        };
        Ok(value)
    }

    /// Reads the field-path `UBitVar` variant: a unary prefix selects a
    /// payload width of 2, 4, 10, 17 or 31 bits.
    pub fn read_ubitvar_fp(&mut self) -> BitResult<u32> {
        for width in [2u8, 4, 10, 17] {
            if self.read_bit()? {
                return self.read_ubits(width);
            }
        }
        self.read_ubits(31)
    }

    /// Reads an embedded-message header integer.
    pub fn read_embedded_int(&mut self) -> BitResult<u32> {
        let head = self.read_ubits(6)?;
        let class = (head >> 4) as usize;
        if class == 0 {
            return Ok(head);
        }
        let extension = self.read_ubits(UBV_EXTENSION_BITS[class])?;
        Ok((head & 0x0F) | (extension << 4))
    }

    /// Reads a fixed-point world coordinate.
    pub fn read_coord(&mut self) -> BitResult<f32> {
        let has_integer = self.read_bit()?;
        let has_fraction = self.read_bit()?;
        if !has_integer && !has_fraction {
            return Ok(0.0);
        }

        let negative = self.read_bit()?;
        let integer = if has_integer {
            self.read_ubits(COORD_INTEGER_BITS)? + 1
        } else {
            0
        };
        let fraction = if has_fraction {
            self.read_ubits(COORD_FRACTION_BITS)?
        } else {
            0
        };

        let value = (f64::from(integer) + f64::from(fraction) * COORD_RESOLUTION) as f32;
        Ok(if negative { -value } else { value })
    }

    /// Reads an `bits`-wide angle scaled to degrees.
    pub fn read_angle(&mut self, bits: u8) -> BitResult<f32> {
        let value = self.read_ubits(bits)?;
        Ok(value as f32 * 360.0 / (1u64 << bits) as f32)
    }

    /// Reads a signed unit-interval component of a packed normal.
    pub fn read_normal(&mut self) -> BitResult<f32> {
        let negative = self.read_bit()?;
        let magnitude = self.read_ubits(NORMAL_FRACTION_BITS)?;
        let value = (f64::from(magnitude) / NORMAL_DENOMINATOR) as f32;
        Ok(if negative { -value } else { value })
    }

    /// Reads a packed unit vector: optional x and y components, z
    /// reconstructed from the unit length with its own sign bit.
    pub fn read_normal_vec3(&mut self) -> BitResult<[f32; 3]> {
        let mut out = [0.0f32; 3];
        let has_x = self.read_bit()?;
        let has_y = self.read_bit()?;
        if has_x {
            out[0] = self.read_normal()?;
        }
        if has_y {
            out[1] = self.read_normal()?;
        }
        let negative_z = self.read_bit()?;
        let planar = out[0] * out[0] + out[1] * out[1];
        if planar < 1.0 {
            out[2] = (1.0 - planar).sqrt();
        }
        if negative_z {
            out[2] = -out[2];
        }
        Ok(out)
    }

    /// Reads a null-terminated string; the terminator is consumed but not
    /// returned. Invalid UTF-8 is replaced rather than rejected.
    pub fn read_cstring(&mut self) -> BitResult<String> {
        let bytes = self.read_cstring_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a NUL-terminated byte string without the terminator.
    pub fn read_cstring_bytes(&mut self) -> BitResult<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read_byte()?;
            if byte == 0 {
                return Ok(bytes);
            }
            bytes.push(byte);
        }
    }

    /// Fills `out` with the next `out.len() * 8` bits.
    ///
    /// Reads 64-bit chunks first and finishes with single bytes.
    pub fn read_bytes_into(&mut self, out: &mut [u8]) -> BitResult<()> {
        self.ensure_bits(out.len() * 8)?;
        if self.bit_pos % 8 == 0 {
            let start = self.bit_pos / 8;
            out.copy_from_slice(&self.data[start..start + out.len()]);
            self.bit_pos += out.len() * 8;
            return Ok(());
        }

        let mut chunks = out.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.read_bits(64)?.to_le_bytes());
        }
        for byte in chunks.into_remainder() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Reads `bits` bits into a byte buffer rounded up to whole bytes; the
    /// trailing partial byte holds the remaining bits in its low end.
    pub fn read_bits_as_bytes(&mut self, bits: usize) -> BitResult<Vec<u8>> {
        self.ensure_bits(bits)?;
        let mut out = vec![0u8; bits.div_ceil(8)];
        let whole = bits / 8;
        self.read_bytes_into(&mut out[..whole])?;
        let tail = (bits % 8) as u8;
        if tail > 0 {
            out[whole] = self.read_bits(tail)? as u8;
        }
        Ok(out)
    }

    fn ensure_bits(&self, bits: usize) -> BitResult<()> {
        let available = self.bits_remaining();
        if bits > available {
            return Err(BitError::UnexpectedEof {
                requested: bits,
                available,
            });
        }
        Ok(())
    }
}
