//! Range-limited float quantization.
//!
//! A quantized float is described by a bit count, an inclusive `[low, high]`
//! range and a set of flags. Flags are normalized once at construction; the
//! decoder then consults them in a fixed order before reading the raw steps.

use bitflags::bitflags;
use bitstream::{BitReader, BitResult};

use crate::error::{SchemaError, SchemaResult};

bitflags! {
    /// Quantization behaviour flags as declared by the schema.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct QuantizeFlags: u32 {
        const ROUND_DOWN = 1 << 0;
        const ROUND_UP = 1 << 1;
        const ENCODE_ZERO = 1 << 2;
        const ENCODE_INTEGERS = 1 << 3;
    }
}

/// Damping factors tried in order when the ideal multiplier overflows.
const MULTIPLIER_DAMPING: [f32; 5] = [0.9999, 0.99, 0.9, 0.8, 0.7];

/// A resolved quantized float decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedFloat {
    low: f32,
    high: f32,
    bit_count: u32,
    flags: QuantizeFlags,
    no_scale: bool,
    high_low_mul: f32,
    dec_mul: f32,
    offset: f32,
}

impl QuantizedFloat {
    /// Builds a decoder from schema parameters.
    ///
    /// A missing, zero or >= 32 bit count degenerates to a raw 32-bit float.
    /// Missing bounds default to `[0, 1]`.
    pub fn new(
        bit_count: Option<i32>,
        flags: Option<i32>,
        low: Option<f32>,
        high: Option<f32>,
    ) -> SchemaResult<Self> {
        let bit_count = match bit_count {
            Some(bits) if bits > 0 && bits < 32 => bits as u32,
            _ => return Ok(Self::raw()),
        };

        let mut qf = Self {
            low: low.unwrap_or(0.0),
            high: high.unwrap_or(1.0),
            bit_count,
            flags: QuantizeFlags::from_bits_truncate(flags.unwrap_or(0) as u32),
            no_scale: false,
            high_low_mul: 0.0,
            dec_mul: 0.0,
            offset: 0.0,
        };
        qf.validate_flags()?;

        let mut steps = 1u64 << qf.bit_count;

        if qf.flags.contains(QuantizeFlags::ROUND_DOWN) {
            qf.offset = (qf.high - qf.low) / steps as f32;
            qf.high -= qf.offset;
        } else if qf.flags.contains(QuantizeFlags::ROUND_UP) {
            qf.offset = (qf.high - qf.low) / steps as f32;
            qf.low += qf.offset;
        }

        if qf.flags.contains(QuantizeFlags::ENCODE_INTEGERS) {
            let delta = (qf.high - qf.low).max(1.0);
            let delta_log2 = f64::from(delta).log2().ceil() as u32;
            if delta_log2 >= 32 {
                return Err(qf.range_error());
            }
            let range = 1u64 << delta_log2;

            let mut bits = qf.bit_count;
            while 1u64.checked_shl(bits).is_some_and(|step| step <= range) {
                bits += 1;
            }
            if bits > 32 {
                return Err(qf.range_error());
            }
            if bits > qf.bit_count {
                qf.bit_count = bits;
                steps = 1u64 << qf.bit_count;
            }

            qf.offset = range as f32 / steps as f32;
            qf.high = qf.low + range as f32 - qf.offset;
        }

        qf.assign_multipliers(steps)?;

        if qf.flags.contains(QuantizeFlags::ROUND_DOWN) && qf.quantize(qf.low) == qf.low {
            qf.flags.remove(QuantizeFlags::ROUND_DOWN);
        }
        if qf.flags.contains(QuantizeFlags::ROUND_UP) && qf.quantize(qf.high) == qf.high {
            qf.flags.remove(QuantizeFlags::ROUND_UP);
        }
        if qf.flags.contains(QuantizeFlags::ENCODE_ZERO) && qf.quantize(0.0) == 0.0 {
            qf.flags.remove(QuantizeFlags::ENCODE_ZERO);
        }

        Ok(qf)
    }

    /// A decoder reading raw IEEE-754 floats.
    #[must_use]
    pub const fn raw() -> Self {
        Self {
            low: 0.0,
            high: 0.0,
            bit_count: 32,
            flags: QuantizeFlags::empty(),
            no_scale: true,
            high_low_mul: 0.0,
            dec_mul: 0.0,
            offset: 0.0,
        }
    }

    #[must_use]
    pub const fn bit_count(&self) -> u32 {
        self.bit_count
    }

    #[must_use]
    pub const fn low(&self) -> f32 {
        self.low
    }

    #[must_use]
    pub const fn high(&self) -> f32 {
        self.high
    }

    /// Flags after normalization.
    #[must_use]
    pub const fn flags(&self) -> QuantizeFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.no_scale
    }

    /// Decodes one value.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> BitResult<f32> {
        if self.no_scale {
            return reader.read_f32();
        }
        if self.flags.contains(QuantizeFlags::ROUND_DOWN) && reader.read_bit()? {
            return Ok(self.low);
        }
        if self.flags.contains(QuantizeFlags::ROUND_UP) && reader.read_bit()? {
            return Ok(self.high);
        }
        if self.flags.contains(QuantizeFlags::ENCODE_ZERO) && reader.read_bit()? {
            return Ok(0.0);
        }
        let raw = reader.read_bits(self.bit_count as u8)?;
        Ok(self.from_steps(raw))
    }

    /// Maps a raw step count to its value.
    #[must_use]
    pub fn from_steps(&self, raw: u64) -> f32 {
        self.low + (self.high - self.low) * raw as f32 * self.dec_mul
    }

    fn validate_flags(&mut self) -> SchemaResult<()> {
        if self.flags.is_empty() {
            return Ok(());
        }

        let flags = &mut self.flags;
        if (self.low == 0.0 && flags.contains(QuantizeFlags::ROUND_DOWN))
            || (self.high == 0.0 && flags.contains(QuantizeFlags::ROUND_UP))
        {
            flags.remove(QuantizeFlags::ENCODE_ZERO);
        }
        if self.low == 0.0 && flags.contains(QuantizeFlags::ENCODE_ZERO) {
            flags.insert(QuantizeFlags::ROUND_DOWN);
            flags.remove(QuantizeFlags::ENCODE_ZERO);
        }
        if self.high == 0.0 && flags.contains(QuantizeFlags::ENCODE_ZERO) {
            flags.insert(QuantizeFlags::ROUND_UP);
            flags.remove(QuantizeFlags::ENCODE_ZERO);
        }
        if self.low > 0.0 || self.high < 0.0 {
            flags.remove(QuantizeFlags::ENCODE_ZERO);
        }
        if flags.contains(QuantizeFlags::ENCODE_INTEGERS) {
            flags.remove(
                QuantizeFlags::ROUND_UP | QuantizeFlags::ROUND_DOWN | QuantizeFlags::ENCODE_ZERO,
            );
        }
        if flags.contains(QuantizeFlags::ROUND_DOWN | QuantizeFlags::ROUND_UP) {
            return Err(SchemaError::InvalidQuantizationFlags {
                flags: flags.bits(),
            });
        }
        Ok(())
    }

    fn assign_multipliers(&mut self, steps: u64) -> SchemaResult<()> {
        let range = self.high - self.low;
        let high = if self.bit_count == 32 {
            0xFFFF_FFFEu32 as f32
        } else {
            ((1u64 << self.bit_count) - 1) as f32
        };

        let mut high_mul = if range.abs() <= 0.0 { high } else { high / range };

        if high_mul * range > high {
            for damping in MULTIPLIER_DAMPING {
                high_mul = (high / range) * damping;
                if high_mul * range <= high {
                    break;
                }
            }
        }

        self.high_low_mul = high_mul;
        self.dec_mul = 1.0 / (steps - 1) as f32;

        if self.high_low_mul == 0.0 || !self.high_low_mul.is_finite() {
            return Err(self.range_error());
        }
        Ok(())
    }

    fn quantize(&self, value: f32) -> f32 {
        if value < self.low {
            return self.low;
        }
        if value > self.high {
            return self.high;
        }
        let steps = ((value - self.low) * self.high_low_mul) as u32;
        self.low + (self.high - self.low) * (steps as f32 * self.dec_mul)
    }

    const fn range_error(&self) -> SchemaError {
        SchemaError::InvalidQuantizationRange {
            bit_count: self.bit_count,
            low: self.low,
            high: self.high,
        }
    }
}
