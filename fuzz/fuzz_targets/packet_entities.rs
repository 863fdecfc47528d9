#![no_main]

use std::sync::OnceLock;

use bitstream::BitWriter;
use codec::{
    ClassEntry, ClassInfoRecord, CodecLimits, CreateStringTable, PacketEntities, ParseSession,
    SessionConfig, INSTANCE_BASELINE_TABLE,
};
use libfuzzer_sys::fuzz_target;
use schema::{FieldRecord, FlattenedSerializers, SerializerRecord};

/// One class with a uint32, a quantized float and a variable array.
fn send_tables() -> &'static FlattenedSerializers {
    static TABLES: OnceLock<FlattenedSerializers> = OnceLock::new();
    TABLES.get_or_init(|| FlattenedSerializers {
        symbols: vec![
            "m_iHealth".to_string(),
            "uint32".to_string(),
            "m_flCycle".to_string(),
            "CNetworkedQuantizedFloat".to_string(),
            "m_vecItems".to_string(),
            "CNetworkUtlVectorBase< uint32 >".to_string(),
            "CFuzzUnit".to_string(),
        ],
        serializers: vec![SerializerRecord {
            name_sym: 6,
            version: 0,
            field_indices: vec![0, 1, 2],
        }],
        fields: vec![
            FieldRecord {
                var_name_sym: Some(0),
                var_type_sym: Some(1),
                ..FieldRecord::default()
            },
            FieldRecord {
                var_name_sym: Some(2),
                var_type_sym: Some(3),
                bit_count: Some(12),
                low_value: Some(0.0),
                high_value: Some(1.0),
                ..FieldRecord::default()
            },
            FieldRecord {
                var_name_sym: Some(4),
                var_type_sym: Some(5),
                ..FieldRecord::default()
            },
        ],
    })
}

fn session() -> Option<ParseSession> {
    let mut session =
        ParseSession::new(SessionConfig::new(0).with_limits(CodecLimits::for_testing()));
    session.on_send_tables(send_tables()).ok()?;
    session
        .on_class_info(&ClassInfoRecord {
            classes: vec![ClassEntry {
                class_id: 0,
                network_name: "CFuzzUnit".to_string(),
            }],
        })
        .ok()?;

    // Empty baseline: a lone finish opcode.
    let mut w = BitWriter::new();
    for bit in [true, false] {
        w.write_bit(bit);
    }
    let baseline = w.finish();
    let mut w = BitWriter::new();
    w.write_bit(true);
    w.write_bit(true);
    w.write_bit(false);
    w.write_cstring("0");
    w.write_bit(true);
    w.write_bits(baseline.len() as u64, 17).ok()?;
    w.write_bytes(&baseline);
    session
        .on_create_string_table(&CreateStringTable {
            name: INSTANCE_BASELINE_TABLE.to_string(),
            num_entries: 1,
            string_data: w.finish(),
            ..CreateStringTable::default()
        })
        .ok()?;
    Some(session)
}

fuzz_target!(|data: &[u8]| {
    let Some(mut session) = session() else {
        return;
    };
    let mut idx = 0usize;
    while idx < data.len() && idx < 4096 {
        let updates = i32::from(data[idx] % 16);
        idx += 1;
        let len = data.get(idx).map_or(0, |&b| b as usize % 200);
        idx += 1;
        let end = (idx + len).min(data.len());
        let record = PacketEntities {
            is_delta: true,
            updated_entries: updates,
            entity_data: data[idx.min(end)..end].to_vec(),
        };
        idx = end;
        // Errors are expected; the session must stay usable afterwards.
        let _ = session.on_packet_entities(&record);
    }
    for entity in session.entities().iter() {
        let _ = entity.get_by_name("m_iHealth");
    }
});
