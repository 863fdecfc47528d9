//! Field value decoders and the lookup tables that select them.
//!
//! Decoders are plain data: resolving a field produces a [`FieldDecoder`]
//! once at schema-build time, and decoding a value is a `match` on it. The
//! selection tables are built on first use and never change afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use bitstream::{BitReader, BitResult};

use crate::error::SchemaResult;
use crate::field::Field;
use crate::quantized::QuantizedFloat;
use crate::value::FieldValue;

/// Bits per component of the `qangle_precise` encoding.
const PRECISE_ANGLE_BITS: u8 = 20;

/// Decoder for a single float component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatDecoder {
    /// Raw IEEE-754 bits.
    Raw,
    Coord,
    /// Simulation ticks as an unsigned varint.
    SimulationTime,
    /// Four raw bits reinterpreted as a float.
    RuneTime,
    Quantized(QuantizedFloat),
}

impl FloatDecoder {
    pub fn decode(&self, reader: &mut BitReader<'_>) -> BitResult<f32> {
        match self {
            Self::Raw => reader.read_f32(),
            Self::Coord => reader.read_coord(),
            Self::SimulationTime => Ok(reader.read_varu32()? as f32),
            Self::RuneTime => Ok(f32::from_bits(reader.read_ubits(4)?)),
            Self::Quantized(qf) => qf.decode(reader),
        }
    }
}

/// A resolved value decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDecoder {
    Bool,
    Unsigned32,
    Unsigned64,
    /// Raw 64 bits.
    Fixed64,
    Signed32,
    String,
    Float(FloatDecoder),
    Vector2(FloatDecoder),
    Vector3(FloatDecoder),
    Vector4(FloatDecoder),
    /// Packed unit vector.
    Normal,
    /// Two angles of `bits` bits each; roll is zero.
    AnglePitchYaw { bits: u8 },
    /// Three optional 20-bit angles.
    AnglePrecise,
    /// Three optional coordinates.
    AngleCoord,
    /// Three raw 32-bit integers converted to float.
    AngleRaw32,
    /// Three angles of `bits` bits each.
    AngleBits { bits: u8 },
}

/// Decoder for table presence flags.
pub static PRESENCE_DECODER: FieldDecoder = FieldDecoder::Bool;

/// Decoder for variable container lengths.
pub static LENGTH_DECODER: FieldDecoder = FieldDecoder::Unsigned32;

impl FieldDecoder {
    /// Decodes one value.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> BitResult<FieldValue> {
        let value = match self {
            Self::Bool => FieldValue::Bool(reader.read_bit()?),
            Self::Unsigned32 => FieldValue::Unsigned(u64::from(reader.read_varu32()?)),
            Self::Unsigned64 => FieldValue::Unsigned(reader.read_varu64()?),
            Self::Fixed64 => FieldValue::Unsigned(reader.read_bits(64)?),
            Self::Signed32 => FieldValue::Signed(reader.read_vars32()?),
            Self::String => FieldValue::String(reader.read_cstring()?),
            Self::Float(FloatDecoder::SimulationTime) => {
                FieldValue::Unsigned(u64::from(reader.read_varu32()?))
            }
            Self::Float(f) => FieldValue::Float(f.decode(reader)?),
            Self::Vector2(f) => FieldValue::Vector2([f.decode(reader)?, f.decode(reader)?]),
            Self::Vector3(f) => FieldValue::Vector3(read_components(reader, f)?),
            Self::Vector4(f) => FieldValue::Vector4([
                f.decode(reader)?,
                f.decode(reader)?,
                f.decode(reader)?,
                f.decode(reader)?,
            ]),
            Self::Normal => FieldValue::Vector3(reader.read_normal_vec3()?),
            Self::AnglePitchYaw { bits } => {
                FieldValue::Vector3([reader.read_angle(*bits)?, reader.read_angle(*bits)?, 0.0])
            }
            Self::AnglePrecise => FieldValue::Vector3(read_optional_components(reader, |r| {
                r.read_angle(PRECISE_ANGLE_BITS)
            })?),
            Self::AngleCoord => {
                FieldValue::Vector3(read_optional_components(reader, |r| r.read_coord())?)
            }
            Self::AngleRaw32 => FieldValue::Vector3([
                reader.read_ubits(32)? as f32,
                reader.read_ubits(32)? as f32,
                reader.read_ubits(32)? as f32,
            ]),
            Self::AngleBits { bits } => FieldValue::Vector3([
                reader.read_angle(*bits)?,
                reader.read_angle(*bits)?,
                reader.read_angle(*bits)?,
            ]),
        };
        Ok(value)
    }
}

fn read_components(reader: &mut BitReader<'_>, f: &FloatDecoder) -> BitResult<[f32; 3]> {
    Ok([f.decode(reader)?, f.decode(reader)?, f.decode(reader)?])
}

fn read_optional_components(
    reader: &mut BitReader<'_>,
    mut read: impl FnMut(&mut BitReader<'_>) -> BitResult<f32>,
) -> BitResult<[f32; 3]> {
    let present = [reader.read_bit()?, reader.read_bit()?, reader.read_bit()?];
    let mut out = [0.0f32; 3];
    for (slot, present) in out.iter_mut().zip(present) {
        if present {
            *slot = read(reader)?;
        }
    }
    Ok(out)
}

/// Builds a decoder from a field's encoding parameters.
pub type FieldFactory = fn(&Field) -> SchemaResult<FieldDecoder>;

fn type_factories() -> &'static HashMap<&'static str, FieldFactory> {
    static FACTORIES: OnceLock<HashMap<&'static str, FieldFactory>> = OnceLock::new();
    FACTORIES.get_or_init(|| {
        let mut m: HashMap<&'static str, FieldFactory> = HashMap::new();
        m.insert("uint64", unsigned64_factory);
        m.insert("float32", float_factory);
        m.insert("CNetworkedQuantizedFloat", float_factory);
        m.insert("QAngle", qangle_factory);
        m.insert("Vector", vector3_factory);
        m.insert("Vector2D", vector2_factory);
        m.insert("Vector4D", vector4_factory);
        m.insert("Quaternion", vector4_factory);
        m
    })
}

fn type_decoders() -> &'static HashMap<&'static str, FieldDecoder> {
    static DECODERS: OnceLock<HashMap<&'static str, FieldDecoder>> = OnceLock::new();
    DECODERS.get_or_init(|| {
        use FieldDecoder as D;
        HashMap::from([
            ("bool", D::Bool),
            ("uint8", D::Unsigned32),
            ("uint16", D::Unsigned32),
            ("uint32", D::Unsigned32),
            ("uint64", D::Unsigned64),
            ("int8", D::Signed32),
            ("int16", D::Signed32),
            ("int32", D::Signed32),
            ("int64", D::Signed32),
            ("char", D::String),
            ("CUtlSymbolLarge", D::String),
            ("CUtlString", D::String),
            ("CUtlStringToken", D::Unsigned32),
            ("CHandle", D::Unsigned32),
            ("CEntityHandle", D::Unsigned32),
            ("CGameSceneNodeHandle", D::Unsigned32),
            ("CBaseVRHandAttachmentHandle", D::Unsigned32),
            ("CStrongHandle", D::Unsigned64),
            ("Color", D::Unsigned32),
            ("color32", D::Unsigned32),
            ("BloodType", D::Unsigned32),
            ("GameTime_t", D::Float(FloatDecoder::Raw)),
            ("HeroFacetKey_t", D::Unsigned64),
            ("HeroID_t", D::Signed32),
            ("QAngle", D::AngleCoord),
            ("float32", D::Float(FloatDecoder::Raw)),
            ("Vector2D", D::Vector2(FloatDecoder::Raw)),
            ("Vector", D::Vector3(FloatDecoder::Raw)),
            ("Vector4D", D::Vector4(FloatDecoder::Raw)),
            ("Quaternion", D::Vector4(FloatDecoder::Raw)),
        ])
    })
}

/// Resolves the value decoder for a simple or fixed-array field.
///
/// Order: type factory, decoder keyed by variable name, decoder keyed by base
/// type, then the unsigned varint fallback. Variable names share the type
/// table, so a field named like a known type decodes as that type.
pub fn find_decoder(field: &Field) -> SchemaResult<FieldDecoder> {
    let base = field.field_type.base.as_str();
    if let Some(factory) = type_factories().get(base) {
        return factory(field);
    }
    if let Some(decoder) = type_decoders().get(field.var_name.as_str()) {
        return Ok(decoder.clone());
    }
    if let Some(decoder) = type_decoders().get(base) {
        return Ok(decoder.clone());
    }
    tracing::debug!(
        field = %field.var_name,
        var_type = %field.var_type,
        "no decoder for field, using unsigned varint"
    );
    Ok(FieldDecoder::Unsigned32)
}

/// Resolves the decoder for a container element by its base type.
pub fn find_decoder_by_base_type(base: &str) -> FieldDecoder {
    if let Some(decoder) = type_decoders().get(base) {
        return decoder.clone();
    }
    tracing::debug!(base_type = base, "no decoder for element type, using unsigned varint");
    FieldDecoder::Unsigned32
}

fn unsigned64_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    if field.encoder == "fixed64" {
        Ok(FieldDecoder::Fixed64)
    } else {
        Ok(FieldDecoder::Unsigned64)
    }
}

fn float_decoder(field: &Field) -> SchemaResult<FloatDecoder> {
    match field.encoder.as_str() {
        "coord" => return Ok(FloatDecoder::Coord),
        "simtime" => return Ok(FloatDecoder::SimulationTime),
        "runetime" => return Ok(FloatDecoder::RuneTime),
        _ => {}
    }
    match field.bit_count {
        Some(bits) if bits > 0 && bits < 32 => Ok(FloatDecoder::Quantized(QuantizedFloat::new(
            field.bit_count,
            field.encode_flags,
            field.low_value,
            field.high_value,
        )?)),
        _ => Ok(FloatDecoder::Raw),
    }
}

fn float_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    Ok(FieldDecoder::Float(float_decoder(field)?))
}

fn vector2_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    Ok(FieldDecoder::Vector2(float_decoder(field)?))
}

fn vector3_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    if field.encoder == "normal" {
        return Ok(FieldDecoder::Normal);
    }
    Ok(FieldDecoder::Vector3(float_decoder(field)?))
}

fn vector4_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    Ok(FieldDecoder::Vector4(float_decoder(field)?))
}

fn qangle_factory(field: &Field) -> SchemaResult<FieldDecoder> {
    let decoder = match (field.encoder.as_str(), field.bit_count) {
        ("qangle_pitch_yaw", bits) => FieldDecoder::AnglePitchYaw {
            bits: angle_bits(bits),
        },
        ("qangle_precise", _) => FieldDecoder::AnglePrecise,
        (_, Some(0)) => FieldDecoder::AngleCoord,
        (_, Some(32)) => FieldDecoder::AngleRaw32,
        (_, Some(bits)) if bits > 0 && bits < 32 => FieldDecoder::AngleBits { bits: bits as u8 },
        _ => FieldDecoder::AngleCoord,
    };
    Ok(decoder)
}

fn angle_bits(bits: Option<i32>) -> u8 {
    bits.map_or(0, |b| b.clamp(0, 32) as u8)
}
