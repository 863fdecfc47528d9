//! Entity and string-table delta decoding for replay entity streams.
//!
//! This is the main codec crate that ties together bitstream and schema to
//! rebuild entity state from a replay's session records.
//!
//! # Features
//!
//! - Huffman-coded field-path opcodes and pooled field paths
//! - Sparse nested field state per entity
//! - Entity create/update/leave/delete with instance baselines
//! - String tables with key history and snappy-compressed entries
//! - A parse session that delivers one batch per record to observers
//!
//! # Design Principles
//!
//! - **Bit-exact** - Every read matches the engine's wire layout.
//! - **Apply, then notify** - Observers see a record only after all of it
//!   has been applied.
//! - **Classified failures** - [`CodecError::kind`] tells a corrupt stream
//!   apart from a skippable record.

mod baseline;
mod class;
mod entity;
mod error;
mod field_path;
mod field_reader;
mod field_state;
mod huffman;
mod limits;
mod packet_entities;
mod scratch;
mod session;
mod string_table;
mod types;

pub use baseline::InstanceBaselines;
pub use class::{class_id_bits, ClassEntry, ClassInfo, ClassInfoRecord, ClassTable};
pub use entity::{Entity, EntityOp};
pub use error::{CodecError, CodecResult, ErrorKind, LimitKind};
pub use field_path::{
    FieldPath, FieldPathLease, FieldPathOp, FieldPathOpFn, FieldPathPool, FIELD_PATH_OPS,
    FINISH_OP, MAX_DEPTH,
};
pub use field_reader::{decode_fields, read_field_paths};
pub use field_state::FieldState;
pub use huffman::{field_path_tree, HuffmanTree};
pub use limits::CodecLimits;
pub use packet_entities::{DecodeContext, EntityBatch, EntityChange, EntityMap, PacketEntities};
pub use scratch::DecodeScratch;
pub use session::{EntityObserver, ParseSession, SessionConfig};
pub use string_table::{
    CreateStringTable, StringTable, StringTableEntry, StringTables, UpdateStringTable,
    INSTANCE_BASELINE_TABLE,
};
pub use types::{ClassId, EntityIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = EntityIndex::new(0);
        let _ = ClassId::new(0);
        let _ = CodecLimits::default();
        let _ = FieldState::new();
        let _ = ParseSession::new(SessionConfig::default());
        let _: CodecResult<()> = Ok(());
    }

    #[test]
    fn opcode_table_matches_tree() {
        assert_eq!(FIELD_PATH_OPS.len(), FINISH_OP + 1);
        assert_eq!(field_path_tree().codes().len(), FIELD_PATH_OPS.len());
    }
}
