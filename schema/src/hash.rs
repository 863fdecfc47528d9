//! Deterministic serializer layout hashing.

use blake3::Hasher;

use crate::decoder::{FieldDecoder, FloatDecoder};
use crate::field::{Field, FieldLayout};
use crate::Serializer;

/// Computes a deterministic hash of a serializer's wire layout.
///
/// Two serializers hash equal when they decode the same bits the same way:
/// field order, models, decoders and nested layouts all contribute.
#[must_use]
pub fn serializer_hash(serializer: &Serializer) -> u64 {
    let mut hasher = Hasher::new();
    write_serializer(&mut hasher, serializer);
    let hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

fn write_serializer(hasher: &mut Hasher, serializer: &Serializer) {
    write_str(hasher, serializer.name());
    write_i32(hasher, serializer.version());
    write_u32(hasher, serializer.fields().len() as u32);
    for field in serializer.fields() {
        write_field(hasher, field);
    }
}

fn write_field(hasher: &mut Hasher, field: &Field) {
    write_str(hasher, &field.var_name);
    write_str(hasher, &field.var_type);
    match field.layout() {
        FieldLayout::Simple { decoder } => {
            write_u8(hasher, 0);
            write_decoder(hasher, decoder);
        }
        FieldLayout::FixedArray { decoder } => {
            write_u8(hasher, 1);
            write_decoder(hasher, decoder);
        }
        FieldLayout::FixedTable { serializer } => {
            write_u8(hasher, 2);
            write_serializer(hasher, serializer);
        }
        FieldLayout::VariableArray { element } => {
            write_u8(hasher, 3);
            write_decoder(hasher, element);
        }
        FieldLayout::VariableTable { serializer } => {
            write_u8(hasher, 4);
            write_serializer(hasher, serializer);
        }
    }
}

fn write_decoder(hasher: &mut Hasher, decoder: &FieldDecoder) {
    match decoder {
        FieldDecoder::Bool => write_u8(hasher, 0),
        FieldDecoder::Unsigned32 => write_u8(hasher, 1),
        FieldDecoder::Unsigned64 => write_u8(hasher, 2),
        FieldDecoder::Fixed64 => write_u8(hasher, 3),
        FieldDecoder::Signed32 => write_u8(hasher, 4),
        FieldDecoder::String => write_u8(hasher, 5),
        FieldDecoder::Float(f) => {
            write_u8(hasher, 6);
            write_float(hasher, f);
        }
        FieldDecoder::Vector2(f) => {
            write_u8(hasher, 7);
            write_float(hasher, f);
        }
        FieldDecoder::Vector3(f) => {
            write_u8(hasher, 8);
            write_float(hasher, f);
        }
        FieldDecoder::Vector4(f) => {
            write_u8(hasher, 9);
            write_float(hasher, f);
        }
        FieldDecoder::Normal => write_u8(hasher, 10),
        FieldDecoder::AnglePitchYaw { bits } => {
            write_u8(hasher, 11);
            write_u8(hasher, *bits);
        }
        FieldDecoder::AnglePrecise => write_u8(hasher, 12),
        FieldDecoder::AngleCoord => write_u8(hasher, 13),
        FieldDecoder::AngleRaw32 => write_u8(hasher, 14),
        FieldDecoder::AngleBits { bits } => {
            write_u8(hasher, 15);
            write_u8(hasher, *bits);
        }
    }
}

fn write_float(hasher: &mut Hasher, decoder: &FloatDecoder) {
    match decoder {
        FloatDecoder::Raw => write_u8(hasher, 0),
        FloatDecoder::Coord => write_u8(hasher, 1),
        FloatDecoder::SimulationTime => write_u8(hasher, 2),
        FloatDecoder::RuneTime => write_u8(hasher, 3),
        FloatDecoder::Quantized(qf) => {
            write_u8(hasher, 4);
            write_u32(hasher, qf.bit_count());
            write_u32(hasher, qf.flags().bits());
            write_u32(hasher, qf.low().to_bits());
            write_u32(hasher, qf.high().to_bits());
        }
    }
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

fn write_i32(hasher: &mut Hasher, value: i32) {
    hasher.update(&value.to_le_bytes());
}
