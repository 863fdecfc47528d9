use std::cell::RefCell;
use std::rc::Rc;

use bitstream::BitWriter;
use codec::{
    field_path_tree, ClassEntry, ClassInfoRecord, CodecError, CodecLimits, CreateStringTable,
    EntityBatch, EntityIndex, EntityMap, EntityOp, ErrorKind, PacketEntities, ParseSession,
    SessionConfig, UpdateStringTable, FIELD_PATH_OPS, FINISH_OP, INSTANCE_BASELINE_TABLE,
};
use schema::{FieldRecord, FieldValue, FlattenedSerializers, SerializerRecord};

const HERO: &str = "CDOTA_Unit_Hero_Axe";

fn symbol(symbols: &mut Vec<String>, name: &str) -> i32 {
    if let Some(i) = symbols.iter().position(|s| s == name) {
        return i as i32;
    }
    symbols.push(name.to_string());
    (symbols.len() - 1) as i32
}

fn field(symbols: &mut Vec<String>, name: &str, ty: &str) -> FieldRecord {
    FieldRecord {
        var_name_sym: Some(symbol(symbols, name)),
        var_type_sym: Some(symbol(symbols, ty)),
        send_node_sym: Some(symbol(symbols, "(root)")),
        ..FieldRecord::default()
    }
}

/// `CBodyComponent { m_cellX: uint16 }` and
/// `CDOTA_Unit_Hero_Axe { m_iHealth: uint32, m_flCycle: quantized(10, -1..1),
/// CBodyComponent }`.
fn send_tables() -> FlattenedSerializers {
    let mut symbols = Vec::new();
    let cell = field(&mut symbols, "m_cellX", "uint16");
    let health = field(&mut symbols, "m_iHealth", "uint32");
    let cycle = FieldRecord {
        bit_count: Some(10),
        low_value: Some(-1.0),
        high_value: Some(1.0),
        encode_flags: Some(0),
        ..field(&mut symbols, "m_flCycle", "CNetworkedQuantizedFloat")
    };
    let body = FieldRecord {
        field_serializer_name_sym: Some(symbol(&mut symbols, "CBodyComponent")),
        field_serializer_version: Some(0),
        ..field(&mut symbols, "CBodyComponent", "CBodyComponent")
    };
    let serializers = vec![
        SerializerRecord {
            name_sym: symbol(&mut symbols, "CBodyComponent"),
            version: 0,
            field_indices: vec![0],
        },
        SerializerRecord {
            name_sym: symbol(&mut symbols, HERO),
            version: 0,
            field_indices: vec![1, 2, 3],
        },
    ];
    FlattenedSerializers {
        symbols,
        serializers,
        fields: vec![cell, health, cycle, body],
    }
}

fn op(name: &str) -> usize {
    FIELD_PATH_OPS
        .iter()
        .position(|op| op.name == name)
        .unwrap()
}

fn write_op(w: &mut BitWriter, symbol: usize) {
    for &bit in &field_path_tree().codes()[symbol] {
        w.write_bit(bit);
    }
}

fn baseline_bytes() -> Vec<u8> {
    let mut w = BitWriter::new();
    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, FINISH_OP);
    w.write_varu32(100);
    w.finish()
}

fn baseline_table() -> CreateStringTable {
    let baseline = baseline_bytes();
    let mut w = BitWriter::new();
    w.write_bit(true);
    w.write_bit(true);
    w.write_bit(false);
    w.write_cstring("0");
    w.write_bit(true);
    w.write_bits(baseline.len() as u64, 17).unwrap();
    w.write_bytes(&baseline);
    CreateStringTable {
        name: INSTANCE_BASELINE_TABLE.to_string(),
        num_entries: 1,
        string_data: w.finish(),
        ..CreateStringTable::default()
    }
}

fn create_record() -> PacketEntities {
    let mut w = BitWriter::new();
    w.write_ubitvar(5);
    w.write_bits(2, 2).unwrap();
    w.write_bits(0, 1).unwrap();
    w.write_bits(1234, 17).unwrap();
    w.write_varu32(0);

    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, op("PushOneLeftDeltaZeroRightZero"));
    write_op(&mut w, FINISH_OP);
    w.write_varu32(42);
    w.write_bits(512, 10).unwrap();
    w.write_bit(true);
    w.write_varu32(130);

    PacketEntities {
        is_delta: false,
        updated_entries: 1,
        entity_data: w.finish(),
    }
}

fn update_record() -> PacketEntities {
    let mut w = BitWriter::new();
    w.write_ubitvar(5);
    w.write_bits(0, 2).unwrap();
    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, FINISH_OP);
    w.write_varu32(7);
    PacketEntities {
        is_delta: true,
        updated_entries: 1,
        entity_data: w.finish(),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session() -> ParseSession {
    init_tracing();
    let mut session =
        ParseSession::new(SessionConfig::new(9000).with_limits(CodecLimits::for_testing()));
    session.on_send_tables(&send_tables()).unwrap();
    session
        .on_class_info(&ClassInfoRecord {
            classes: vec![ClassEntry {
                class_id: 0,
                network_name: HERO.to_string(),
            }],
        })
        .unwrap();
    session.on_create_string_table(&baseline_table()).unwrap();
    session
}

#[test]
fn create_then_update() {
    let batches: Rc<RefCell<Vec<Vec<EntityOp>>>> = Rc::default();
    let mut session = session();
    let seen = Rc::clone(&batches);
    session.add_observer(Box::new(move |batch: &EntityBatch, entities: &EntityMap| {
        assert_eq!(entities.len(), 1);
        seen.borrow_mut()
            .push(batch.iter().map(|c| c.op).collect());
    }));

    assert_eq!(session.classes().class_id_bits(), 1);
    assert_eq!(session.baselines().len(), 1);

    let batch = session.on_packet_entities(&create_record()).unwrap();
    assert_eq!(batch.len(), 1);
    let entity = session.entities().get(EntityIndex::new(5)).unwrap();
    assert_eq!(entity.serial(), 1234);
    assert_eq!(entity.class().name(), HERO);
    assert_eq!(entity.get(&[0]), Some(&FieldValue::Unsigned(42)));

    let Some(FieldValue::Float(cycle)) = entity.get_by_name("m_flCycle") else {
        panic!("m_flCycle missing");
    };
    let expected = -1.0 + 2.0 * 512.0 / 1023.0;
    assert!((f64::from(*cycle) - expected).abs() < 1e-5, "{cycle} vs {expected}");

    assert_eq!(entity.get(&[2]), Some(&FieldValue::Bool(true)));
    assert_eq!(
        entity.get_by_name("CBodyComponent.m_cellX"),
        Some(&FieldValue::Unsigned(130))
    );

    session.on_packet_entities(&update_record()).unwrap();
    let entity = session.entities().get(EntityIndex::new(5)).unwrap();
    assert_eq!(entity.get_by_name("m_iHealth"), Some(&FieldValue::Unsigned(7)));
    assert_eq!(
        entity.get_by_name("CBodyComponent.m_cellX"),
        Some(&FieldValue::Unsigned(130))
    );

    assert_eq!(
        *batches.borrow(),
        vec![
            vec![EntityOp::CREATED | EntityOp::ENTERED],
            vec![EntityOp::UPDATED],
        ]
    );
}

#[test]
fn baseline_values_survive_create() {
    let mut session = session();
    let mut w = BitWriter::new();
    w.write_ubitvar(0);
    w.write_bits(2, 2).unwrap();
    w.write_bits(0, 1).unwrap();
    w.write_bits(1, 17).unwrap();
    w.write_varu32(0);
    write_op(&mut w, FINISH_OP);
    let record = PacketEntities {
        is_delta: true,
        updated_entries: 1,
        entity_data: w.finish(),
    };
    session.on_packet_entities(&record).unwrap();
    let entity = session.entities().get(EntityIndex::new(0)).unwrap();
    assert_eq!(entity.get_by_name("m_iHealth"), Some(&FieldValue::Unsigned(100)));
    assert_eq!(entity.get_by_name("m_flCycle"), None);
}

#[test]
fn baseline_update_replaces_defaults() {
    let mut session = session();
    let mut baseline = BitWriter::new();
    write_op(&mut baseline, op("PlusOne"));
    write_op(&mut baseline, FINISH_OP);
    baseline.write_varu32(555);
    let baseline = baseline.finish();

    let mut w = BitWriter::new();
    w.write_bit(true);
    w.write_bit(false);
    w.write_bit(true);
    w.write_bits(baseline.len() as u64, 17).unwrap();
    w.write_bytes(&baseline);
    session
        .on_update_string_table(&UpdateStringTable {
            table_id: 0,
            num_changed_entries: 1,
            string_data: w.finish(),
        })
        .unwrap();

    let mut w = BitWriter::new();
    w.write_ubitvar(0);
    w.write_bits(2, 2).unwrap();
    w.write_bits(0, 1).unwrap();
    w.write_bits(1, 17).unwrap();
    w.write_varu32(0);
    write_op(&mut w, FINISH_OP);
    session
        .on_packet_entities(&PacketEntities {
            is_delta: true,
            updated_entries: 1,
            entity_data: w.finish(),
        })
        .unwrap();
    let entity = session.entities().get(EntityIndex::new(0)).unwrap();
    assert_eq!(entity.get_by_name("m_iHealth"), Some(&FieldValue::Unsigned(555)));
}

#[test]
fn truncated_payload_is_a_stream_error() {
    let mut session = session();
    let mut record = create_record();
    record.entity_data.truncate(3);
    let err = session.on_packet_entities(&record).unwrap_err();
    assert!(err.is_truncated(), "{err}");
    assert_eq!(err.kind(), ErrorKind::Stream);

    let err = session.on_packet_entities(&update_record()).unwrap_err();
    assert_eq!(err, CodecError::UnknownEntity { index: 5 });
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn unknown_class_is_a_protocol_error() {
    let mut session =
        ParseSession::new(SessionConfig::new(9000).with_limits(CodecLimits::for_testing()));
    session.on_send_tables(&send_tables()).unwrap();
    session
        .on_class_info(&ClassInfoRecord {
            classes: vec![
                ClassEntry {
                    class_id: 0,
                    network_name: HERO.to_string(),
                },
                ClassEntry {
                    class_id: 1,
                    network_name: "CBodyComponent".to_string(),
                },
            ],
        })
        .unwrap();
    session.on_create_string_table(&baseline_table()).unwrap();
    assert_eq!(session.classes().class_id_bits(), 2);

    let mut w = BitWriter::new();
    w.write_ubitvar(0);
    w.write_bits(2, 2).unwrap();
    w.write_bits(3, 2).unwrap();
    w.write_bits(1, 17).unwrap();
    w.write_varu32(0);
    let record = PacketEntities {
        is_delta: true,
        updated_entries: 1,
        entity_data: w.finish(),
    };
    assert_eq!(
        session.on_packet_entities(&record).unwrap_err(),
        CodecError::UnknownClass { class_id: 3 }
    );

    let mut w = BitWriter::new();
    w.write_ubitvar(0);
    w.write_bits(2, 2).unwrap();
    w.write_bits(1, 2).unwrap();
    w.write_bits(1, 17).unwrap();
    w.write_varu32(0);
    let record = PacketEntities {
        is_delta: true,
        updated_entries: 1,
        entity_data: w.finish(),
    };
    assert_eq!(
        session.on_packet_entities(&record).unwrap_err(),
        CodecError::UnknownBaseline { class_id: 1 }
    );
}

#[test]
fn failed_record_keeps_changes_without_notifying() {
    let notified = Rc::new(RefCell::new(0usize));
    let mut session = session();
    let count = Rc::clone(&notified);
    session.add_observer(Box::new(move |_: &EntityBatch, _: &EntityMap| {
        *count.borrow_mut() += 1;
    }));
    session.on_packet_entities(&create_record()).unwrap();

    let mut w = BitWriter::new();
    w.write_ubitvar(5);
    w.write_bits(0, 2).unwrap();
    write_op(&mut w, op("PlusOne"));
    write_op(&mut w, FINISH_OP);
    w.write_varu32(7);
    w.write_ubitvar(0);
    w.write_bits(0, 2).unwrap();
    let record = PacketEntities {
        is_delta: true,
        updated_entries: 2,
        entity_data: w.finish(),
    };
    assert_eq!(
        session.on_packet_entities(&record).unwrap_err(),
        CodecError::UnknownEntity { index: 6 }
    );

    let entity = session.entities().get(EntityIndex::new(5)).unwrap();
    assert_eq!(entity.get_by_name("m_iHealth"), Some(&FieldValue::Unsigned(7)));
    assert_eq!(*notified.borrow(), 1);
}
