//! Schema construction and resolution errors.

use std::fmt;

use bitstream::BitError;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when building a schema or resolving a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Reading a field value ran into a bitstream failure.
    Bitstream(BitError),

    /// No decoder could be resolved for a field.
    MissingDecoder {
        field: String,
        type_name: String,
    },

    /// A variable array type carries no element type.
    MissingElementType { field: String, type_name: String },

    /// A field path index does not address a field of the serializer.
    PathOutOfRange {
        serializer: String,
        index: i32,
        fields: usize,
    },

    /// A type string could not be parsed.
    InvalidTypeName { type_name: String },

    /// Quantization flags request both round-down and round-up.
    InvalidQuantizationFlags { flags: u32 },

    /// Quantization parameters produce no usable multiplier.
    InvalidQuantizationRange {
        bit_count: u32,
        low: f32,
        high: f32,
    },

    /// A symbol id points outside the symbol table.
    UnknownSymbol { symbol: i32, symbols: usize },

    /// A serializer references a field index outside the field table.
    UnknownField { serializer: String, field_index: i32 },
}

impl SchemaError {
    /// Returns `true` if the error came from running out of payload bits.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Bitstream(e) if e.is_truncated())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(e) => write!(f, "bitstream error: {e}"),
            Self::MissingDecoder { field, type_name } => {
                write!(f, "no decoder for field {field} of type {type_name}")
            }
            Self::MissingElementType { field, type_name } => {
                write!(f, "variable array {field} of type {type_name} has no element type")
            }
            Self::PathOutOfRange {
                serializer,
                index,
                fields,
            } => {
                write!(
                    f,
                    "serializer {serializer} has no field {index} ({fields} fields)"
                )
            }
            Self::InvalidTypeName { type_name } => {
                write!(f, "unparseable field type {type_name:?}")
            }
            Self::InvalidQuantizationFlags { flags } => {
                write!(
                    f,
                    "quantization flags 0x{flags:X} combine round-down and round-up"
                )
            }
            Self::InvalidQuantizationRange {
                bit_count,
                low,
                high,
            } => {
                write!(
                    f,
                    "quantization range [{low}, {high}] with {bit_count} bits has no multiplier"
                )
            }
            Self::UnknownSymbol { symbol, symbols } => {
                write!(f, "symbol {symbol} out of range ({symbols} symbols)")
            }
            Self::UnknownField {
                serializer,
                field_index,
            } => {
                write!(f, "serializer {serializer} references unknown field {field_index}")
            }
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BitError> for SchemaError {
    fn from(err: BitError) -> Self {
        Self::Bitstream(err)
    }
}
