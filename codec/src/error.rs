//! Error types for entity and string-table decoding.

use std::fmt;

use bitstream::BitError;
use schema::SchemaError;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding session records.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Bitstream error.
    Bitstream(BitError),

    /// Schema construction or field resolution error.
    Schema(SchemaError),

    /// An update or leave named an index with no live entity.
    UnknownEntity { index: u32 },

    /// A leave named an entity that is already inactive.
    InactiveEntity { index: u32 },

    /// A create named a class id with no class info.
    UnknownClass { class_id: u32 },

    /// A create named a class with no instance baseline.
    UnknownBaseline { class_id: u32 },

    /// Class info names a network class with no registered serializer.
    MissingSerializer { class_id: u32, name: String },

    /// An instance baseline key is not a decimal class id.
    InvalidBaselineKey { key: String },

    /// A compressed string-table payload failed to decompress.
    CorruptCompressedEntry {
        table: String,
        index: i32,
        reason: String,
    },

    /// An update named a string table that was never created.
    UnknownStringTable { table_id: u32 },

    /// A field-path opcode moved the cursor outside the path.
    FieldPathOverflow { depth: usize },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// A field value failed to resolve or decode.
    FieldDecode {
        entity: u32,
        class: String,
        path: String,
        bit_position: usize,
        source: Box<CodecError>,
    },
}

/// How far the damage of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Corrupt or truncated data; abandon the parse.
    Stream,
    /// Record-level inconsistency; the caller may skip the record.
    Protocol,
    /// The current entity update cannot be applied.
    Schema,
    /// One string-table entry or baseline is unusable.
    Payload,
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Entities,
    StringTableEntries,
    DecompressedEntryBytes,
    FieldPaths,
    FieldIndex,
    Classes,
}

impl CodecError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bitstream(_) | Self::FieldPathOverflow { .. } | Self::LimitsExceeded { .. } => {
                ErrorKind::Stream
            }
            Self::Schema(e) if e.is_truncated() => ErrorKind::Stream,
            Self::Schema(_) => ErrorKind::Schema,
            Self::UnknownEntity { .. }
            | Self::InactiveEntity { .. }
            | Self::UnknownClass { .. }
            | Self::UnknownBaseline { .. }
            | Self::MissingSerializer { .. }
            | Self::UnknownStringTable { .. } => ErrorKind::Protocol,
            Self::InvalidBaselineKey { .. } | Self::CorruptCompressedEntry { .. } => {
                ErrorKind::Payload
            }
            Self::FieldDecode { source, .. } => match source.kind() {
                ErrorKind::Stream => ErrorKind::Stream,
                _ => ErrorKind::Schema,
            },
        }
    }

    /// Returns `true` if the error came from running out of payload bits.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Bitstream(e) => e.is_truncated(),
            Self::Schema(e) => e.is_truncated(),
            Self::FieldDecode { source, .. } => source.is_truncated(),
            _ => false,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(e) => write!(f, "bitstream error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::UnknownEntity { index } => write!(f, "entity {index} not found"),
            Self::InactiveEntity { index } => write!(f, "entity {index} is not active"),
            Self::UnknownClass { class_id } => write!(f, "class {class_id} not found"),
            Self::UnknownBaseline { class_id } => {
                write!(f, "no instance baseline for class {class_id}")
            }
            Self::MissingSerializer { class_id, name } => {
                write!(f, "class {class_id} ({name}) has no serializer")
            }
            Self::InvalidBaselineKey { key } => {
                write!(f, "instance baseline key {key:?} is not a class id")
            }
            Self::CorruptCompressedEntry {
                table,
                index,
                reason,
            } => {
                write!(
                    f,
                    "compressed entry {index} of table {table} is corrupt: {reason}"
                )
            }
            Self::UnknownStringTable { table_id } => {
                write!(f, "string table {table_id} not found")
            }
            Self::FieldPathOverflow { depth } => {
                write!(f, "field path moved outside depth {depth}")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::FieldDecode {
                entity,
                class,
                path,
                bit_position,
                source,
            } => {
                write!(
                    f,
                    "entity {entity} ({class}) field {path} at bit {bit_position}: {source}"
                )
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entities => "entities",
            Self::StringTableEntries => "string table entries",
            Self::DecompressedEntryBytes => "decompressed entry bytes",
            Self::FieldPaths => "field paths",
            Self::FieldIndex => "field index",
            Self::Classes => "classes",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(e) => Some(e),
            Self::Schema(e) => Some(e),
            Self::FieldDecode { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<BitError> for CodecError {
    fn from(err: BitError) -> Self {
        Self::Bitstream(err)
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}
