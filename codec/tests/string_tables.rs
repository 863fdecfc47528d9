use bitstream::BitWriter;
use codec::{
    CodecError, CodecLimits, CreateStringTable, ErrorKind, LimitKind, StringTables,
    UpdateStringTable,
};

fn plain_key(w: &mut BitWriter, key: &str) {
    w.write_bit(true);
    w.write_bit(false);
    w.write_cstring(key);
}

fn history_key(w: &mut BitWriter, slot: u64, shared: u64, suffix: &str) {
    w.write_bit(true);
    w.write_bit(true);
    w.write_bits(slot, 5).unwrap();
    w.write_bits(shared, 5).unwrap();
    w.write_cstring(suffix);
}

fn modifiers() -> CreateStringTable {
    let mut w = BitWriter::new();
    w.write_bit(true);
    plain_key(&mut w, "modifier_item_blink");
    w.write_bit(false);

    w.write_bit(true);
    plain_key(&mut w, "modifier_rune_haste");
    w.write_bit(false);

    w.write_bit(true);
    history_key(&mut w, 0, 2, "_generic");
    w.write_bit(false);

    CreateStringTable {
        name: "ActiveModifiers".to_string(),
        num_entries: 3,
        string_data: w.finish(),
        ..CreateStringTable::default()
    }
}

#[test]
fn create_splices_history_prefix() {
    let mut tables = StringTables::new();
    let table = tables
        .create(&modifiers(), &CodecLimits::for_testing())
        .unwrap();
    let keys: Vec<_> = table.iter().map(|(i, e)| (i, e.key.clone())).collect();
    assert_eq!(
        keys,
        vec![
            (0, "modifier_item_blink".to_string()),
            (1, "modifier_rune_haste".to_string()),
            (2, "mo_generic".to_string()),
        ]
    );
}

#[test]
fn history_is_per_record() {
    let mut tables = StringTables::new();
    tables
        .create(&modifiers(), &CodecLimits::for_testing())
        .unwrap();

    // A fresh record starts with an empty history, so slot 0 is out of range.
    let mut w = BitWriter::new();
    w.write_bit(false);
    w.write_varu32(9);
    history_key(&mut w, 0, 4, "standalone");
    w.write_bit(false);
    tables
        .update(
            &UpdateStringTable {
                table_id: 0,
                num_changed_entries: 1,
                string_data: w.finish(),
            },
            &CodecLimits::for_testing(),
        )
        .unwrap();
    let table = tables.get_by_name("ActiveModifiers").unwrap();
    assert_eq!(table.get(10).unwrap().key, "standalone");
    assert_eq!(table.len(), 4);
}

#[test]
fn shared_length_past_prefix_uses_whole_key() {
    let mut w = BitWriter::new();
    w.write_bit(true);
    plain_key(&mut w, "abc");
    w.write_bit(false);
    w.write_bit(true);
    history_key(&mut w, 0, 20, "def");
    w.write_bit(false);

    let mut tables = StringTables::new();
    let table = tables
        .create(
            &CreateStringTable {
                name: "EconItems".to_string(),
                num_entries: 2,
                string_data: w.finish(),
                ..CreateStringTable::default()
            },
            &CodecLimits::for_testing(),
        )
        .unwrap();
    assert_eq!(table.get(1).unwrap().key, "abcdef");
}

#[test]
fn fixed_size_values() {
    let mut w = BitWriter::new();
    w.write_bit(true);
    plain_key(&mut w, "lighting");
    w.write_bit(true);
    w.write_bits(0b1_0110, 5).unwrap();

    let mut tables = StringTables::new();
    let table = tables
        .create(
            &CreateStringTable {
                name: "lightstyles".to_string(),
                num_entries: 1,
                user_data_fixed_size: true,
                user_data_size: 1,
                user_data_size_bits: 5,
                string_data: w.finish(),
                ..CreateStringTable::default()
            },
            &CodecLimits::for_testing(),
        )
        .unwrap();
    assert_eq!(table.get(0).unwrap().value, vec![0b1_0110]);
}

#[test]
fn corrupt_table_payload() {
    let mut tables = StringTables::new();
    let err = tables
        .create(
            &CreateStringTable {
                name: "userinfo".to_string(),
                num_entries: 1,
                string_data: vec![0xFF, 0xFF, 0xFF],
                data_compressed: true,
                ..CreateStringTable::default()
            },
            &CodecLimits::for_testing(),
        )
        .unwrap_err();
    assert!(matches!(err, CodecError::CorruptCompressedEntry { .. }));
    assert_eq!(err.kind(), ErrorKind::Payload);
    assert!(tables.is_empty());
}

#[test]
fn oversized_table_payload_hits_limit() {
    let limits = CodecLimits::for_testing();
    let payload = vec![0u8; limits.max_decompressed_entry_bytes + 1];
    let compressed = snap::raw::Encoder::new().compress_vec(&payload).unwrap();

    let mut tables = StringTables::new();
    let err = tables
        .create(
            &CreateStringTable {
                name: "userinfo".to_string(),
                num_entries: 1,
                string_data: compressed,
                data_compressed: true,
                ..CreateStringTable::default()
            },
            &limits,
        )
        .unwrap_err();
    assert_eq!(
        err,
        CodecError::LimitsExceeded {
            kind: LimitKind::DecompressedEntryBytes,
            limit: limits.max_decompressed_entry_bytes,
            actual: limits.max_decompressed_entry_bytes + 1,
        }
    );
    assert_eq!(err.kind(), ErrorKind::Stream);
    assert!(tables.is_empty());
}
