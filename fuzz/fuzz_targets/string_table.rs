#![no_main]

use codec::{CodecLimits, CreateStringTable, StringTables, UpdateStringTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&config, payload)) = data.split_first() else {
        return;
    };
    let limits = CodecLimits::for_testing();
    let mut tables = StringTables::new();
    let record = CreateStringTable {
        name: "fuzz".to_string(),
        num_entries: i32::from(config >> 4),
        user_data_fixed_size: config & 0x1 != 0,
        user_data_size: 4,
        user_data_size_bits: 32,
        flags: i32::from((config >> 1) & 0x1),
        string_data: payload.to_vec(),
        data_compressed: config & 0x4 != 0,
        using_varint_bitcounts: config & 0x8 != 0,
    };
    if tables.create(&record, &limits).is_ok() {
        let _ = tables.update(
            &UpdateStringTable {
                table_id: 0,
                num_changed_entries: i32::from(config),
                string_data: payload.to_vec(),
            },
            &limits,
        );
    }
});
