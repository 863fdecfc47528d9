//! Serializer schema and field value decoders for replay entity streams.
//!
//! This crate turns flattened send-table records into a graph of named
//! serializers and resolves, for any field path, the decoder that reads the
//! value at that path:
//! - Declared type parsing and field model classification
//! - Value decoders, including quantized floats, angles and packed normals
//! - Build-gated field encoding patches
//! - A serializer registry with deterministic layout hashing
//!
//! # Design Principles
//!
//! - **Resolve once** - decoders are chosen when a serializer is built, never
//!   per value.
//! - **Shared structure** - fields and nested serializers are reference
//!   counted and shared between every serializer that names them.
//! - **No panics on input** - malformed records surface as [`SchemaError`].

mod decoder;
mod error;
mod field;
mod field_type;
mod hash;
mod patch;
mod quantized;
mod registry;
mod serializer;
mod value;

pub use decoder::{
    find_decoder, find_decoder_by_base_type, FieldDecoder, FloatDecoder, LENGTH_DECODER,
    PRESENCE_DECODER,
};
pub use error::{SchemaError, SchemaResult};
pub use field::{Field, FieldLayout, FieldModel};
pub use field_type::{FieldType, UNRESOLVED_ARRAY_COUNT};
pub use hash::serializer_hash;
pub use patch::{patches_for_build, FieldPatch, PatchRule, Rewrite, FIELD_PATCHES};
pub use quantized::{QuantizeFlags, QuantizedFloat};
pub use registry::{
    FieldRecord, FlattenedSerializers, IngestSummary, SerializerRecord, SerializerRegistry,
};
pub use serializer::Serializer;
pub use value::FieldValue;
