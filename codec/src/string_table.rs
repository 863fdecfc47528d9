//! String tables and their delta-encoded entry updates.

use std::collections::{BTreeMap, HashMap, VecDeque};

use bitstream::BitReader;

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;

/// Name of the table holding per-class instance baselines.
pub const INSTANCE_BASELINE_TABLE: &str = "instancebaseline";

/// Keys remembered for prefix sharing.
const KEY_HISTORY_LEN: usize = 32;

/// Table flag marking entries that may carry their own compression bit.
const FLAG_ENTRY_COMPRESSION: i32 = 0x1;

/// A create-string-table record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateStringTable {
    pub name: String,
    pub num_entries: i32,
    pub user_data_fixed_size: bool,
    pub user_data_size: i32,
    pub user_data_size_bits: i32,
    pub flags: i32,
    /// Entry payload, snappy-compressed as a whole when `data_compressed`.
    pub string_data: Vec<u8>,
    pub data_compressed: bool,
    pub using_varint_bitcounts: bool,
}

/// An update-string-table record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStringTable {
    pub table_id: u32,
    pub num_changed_entries: i32,
    pub string_data: Vec<u8>,
}

/// One entry of a string table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTableEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// A named table of keyed byte payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    index: u32,
    name: String,
    user_data_fixed_size: bool,
    user_data_size: i32,
    user_data_size_bits: i32,
    flags: i32,
    varint_bit_counts: bool,
    entries: BTreeMap<i32, StringTableEntry>,
}

impl StringTable {
    /// Creates an empty table configured from a create record.
    #[must_use]
    pub fn new(index: u32, record: &CreateStringTable) -> Self {
        Self {
            index,
            name: record.name.clone(),
            user_data_fixed_size: record.user_data_fixed_size,
            user_data_size: record.user_data_size,
            user_data_size_bits: record.user_data_size_bits,
            flags: record.flags,
            varint_bit_counts: record.using_varint_bitcounts,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed payload size in bytes, meaningful for fixed-size tables.
    #[must_use]
    pub const fn user_data_size(&self) -> i32 {
        self.user_data_size
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: i32) -> Option<&StringTableEntry> {
        self.entries.get(&index)
    }

    /// Entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &StringTableEntry)> {
        self.entries.iter().map(|(&i, e)| (i, e))
    }

    /// Decodes `num_entries` entry changes from `data` and upserts them.
    ///
    /// An empty buffer carries no entries. A new non-empty key replaces the
    /// stored key; an entry without a value keeps its previous value.
    pub fn apply_entries(
        &mut self,
        data: &[u8],
        num_entries: i32,
        limits: &CodecLimits,
    ) -> CodecResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let count = usize::try_from(num_entries).unwrap_or(0);
        if count > limits.max_string_table_entries {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringTableEntries,
                limit: limits.max_string_table_entries,
                actual: count,
            });
        }

        let mut reader = BitReader::new(data);
        let mut history: VecDeque<Vec<u8>> = VecDeque::with_capacity(KEY_HISTORY_LEN);
        let mut index: i32 = -1;

        for _ in 0..count {
            if reader.read_bit()? {
                index = index.wrapping_add(1);
            } else {
                index = (reader.read_varu32()? as i32).wrapping_add(1);
            }

            let key = if reader.read_bit()? {
                let key = read_key(&mut reader, &history)?;
                let text = String::from_utf8_lossy(&key).into_owned();
                if history.len() >= KEY_HISTORY_LEN {
                    history.pop_front();
                }
                history.push_back(key);
                text
            } else {
                String::new()
            };

            let value = if reader.read_bit()? {
                Some(self.read_value(&mut reader, index, limits)?)
            } else {
                None
            };

            match self.entries.get_mut(&index) {
                Some(entry) => {
                    if !key.is_empty() && entry.key != key {
                        entry.key = key;
                    }
                    if let Some(value) = value {
                        entry.value = value;
                    }
                }
                None => {
                    self.entries.insert(
                        index,
                        StringTableEntry {
                            key,
                            value: value.unwrap_or_default(),
                        },
                    );
                }
            }
        }
        Ok(count)
    }

    fn read_value(
        &self,
        reader: &mut BitReader<'_>,
        index: i32,
        limits: &CodecLimits,
    ) -> CodecResult<Vec<u8>> {
        let mut compressed = false;
        let bits = if self.user_data_fixed_size {
            usize::try_from(self.user_data_size_bits).unwrap_or(0)
        } else {
            if self.flags & FLAG_ENTRY_COMPRESSION != 0 {
                compressed = reader.read_bit()?;
            }
            let bytes = if self.varint_bit_counts {
                reader.read_ubitvar()?
            } else {
                reader.read_ubits(17)?
            };
            bytes as usize * 8
        };

        let raw = reader.read_bits_as_bytes(bits)?;
        if !compressed {
            return Ok(raw);
        }
        decompress(&raw, limits, &self.name, index)
    }
}

fn read_key(reader: &mut BitReader<'_>, history: &VecDeque<Vec<u8>>) -> CodecResult<Vec<u8>> {
    if !reader.read_bit()? {
        return Ok(reader.read_cstring_bytes()?);
    }
    let position = reader.read_ubits(5)? as usize;
    let shared = reader.read_ubits(5)? as usize;
    let Some(previous) = history.get(position) else {
        return Ok(reader.read_cstring_bytes()?);
    };
    let mut key = previous[..shared.min(previous.len())].to_vec();
    key.extend(reader.read_cstring_bytes()?);
    Ok(key)
}

/// Decompresses a raw snappy block, enforcing the decompressed size limit.
fn decompress(data: &[u8], limits: &CodecLimits, table: &str, index: i32) -> CodecResult<Vec<u8>> {
    let corrupt = |e: snap::Error| CodecError::CorruptCompressedEntry {
        table: table.to_string(),
        index,
        reason: e.to_string(),
    };
    let len = snap::raw::decompress_len(data).map_err(corrupt)?;
    if len > limits.max_decompressed_entry_bytes {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::DecompressedEntryBytes,
            limit: limits.max_decompressed_entry_bytes,
            actual: len,
        });
    }
    snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(corrupt)
}

/// All string tables of a session, indexed by creation order.
#[derive(Debug, Clone, Default)]
pub struct StringTables {
    tables: Vec<StringTable>,
    by_name: HashMap<String, u32>,
}

impl StringTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&StringTable> {
        self.tables.get(index as usize)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&StringTable> {
        self.by_name.get(name).and_then(|&i| self.get(i))
    }

    /// Creates a table at the next index and loads its initial entries.
    pub fn create(
        &mut self,
        record: &CreateStringTable,
        limits: &CodecLimits,
    ) -> CodecResult<&StringTable> {
        let index = self.tables.len() as u32;
        let mut table = StringTable::new(index, record);

        let data = if record.data_compressed {
            decompress(&record.string_data, limits, &record.name, -1)?
        } else {
            record.string_data.clone()
        };
        table.apply_entries(&data, record.num_entries, limits)?;

        tracing::debug!(
            table = %record.name,
            index,
            entries = table.len(),
            "created string table"
        );
        self.by_name.insert(record.name.clone(), index);
        self.tables.push(table);
        Ok(&self.tables[index as usize])
    }

    /// Applies an update record to an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownStringTable`] if the table id was never
    /// created.
    pub fn update(
        &mut self,
        record: &UpdateStringTable,
        limits: &CodecLimits,
    ) -> CodecResult<&StringTable> {
        let table = self
            .tables
            .get_mut(record.table_id as usize)
            .ok_or(CodecError::UnknownStringTable {
                table_id: record.table_id,
            })?;
        table.apply_entries(&record.string_data, record.num_changed_entries, limits)?;
        Ok(&*table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream::BitWriter;

    fn table(flags: i32, varint: bool) -> StringTable {
        StringTable::new(
            0,
            &CreateStringTable {
                name: "userinfo".to_string(),
                flags,
                using_varint_bitcounts: varint,
                ..CreateStringTable::default()
            },
        )
    }

    fn write_plain_key(w: &mut BitWriter, key: &str) {
        w.write_bit(true);
        w.write_bit(false);
        w.write_cstring(key);
    }

    #[test]
    fn history_splices_prefix() {
        let mut w = BitWriter::new();
        // entry 0: key without history, no value
        w.write_bit(true);
        write_plain_key(&mut w, "npc_dota_hero_axe");
        w.write_bit(false);
        // entry 1: another plain key
        w.write_bit(true);
        write_plain_key(&mut w, "npc_dota_hero_lina");
        w.write_bit(false);
        // entry 2: history slot 0, 14 shared bytes
        w.write_bit(true);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(0, 5).unwrap();
        w.write_bits(14, 5).unwrap();
        w.write_cstring("pudge");
        w.write_bit(false);
        let data = w.finish();

        let mut t = table(0, false);
        let n = t.apply_entries(&data, 3, &CodecLimits::for_testing()).unwrap();
        assert_eq!(n, 3);
        assert_eq!(t.get(0).unwrap().key, "npc_dota_hero_axe");
        assert_eq!(t.get(1).unwrap().key, "npc_dota_hero_lina");
        assert_eq!(t.get(2).unwrap().key, "npc_dota_hero_pudge");
    }

    #[test]
    fn shared_prefix_may_split_a_character() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        write_plain_key(&mut w, "modifier_é");
        w.write_bit(false);
        // keep "modifier_" plus the first byte of "é"
        w.write_bit(true);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(0, 5).unwrap();
        w.write_bits(10, 5).unwrap();
        w.write_bytes(&[0xA9, b's', 0]);
        w.write_bit(false);
        let data = w.finish();

        let mut t = table(0, false);
        t.apply_entries(&data, 2, &CodecLimits::for_testing()).unwrap();
        assert_eq!(t.get(1).unwrap().key, "modifier_és");
    }

    #[test]
    fn history_out_of_range_reads_whole_key() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(5, 5).unwrap();
        w.write_bits(3, 5).unwrap();
        w.write_cstring("whole");
        w.write_bit(false);
        let data = w.finish();

        let mut t = table(0, false);
        t.apply_entries(&data, 1, &CodecLimits::for_testing()).unwrap();
        assert_eq!(t.get(0).unwrap().key, "whole");
    }

    #[test]
    fn explicit_index_and_value() {
        let mut w = BitWriter::new();
        w.write_bit(false);
        w.write_varu32(4);
        w.write_bit(false);
        w.write_bit(true);
        w.write_bits(2, 17).unwrap();
        w.write_bytes(&[0xAB, 0xCD]);
        let data = w.finish();

        let mut t = table(0, false);
        t.apply_entries(&data, 1, &CodecLimits::for_testing()).unwrap();
        let entry = t.get(5).unwrap();
        assert!(entry.key.is_empty());
        assert_eq!(entry.value, vec![0xAB, 0xCD]);
    }

    #[test]
    fn update_keeps_value_when_absent() {
        let mut t = table(0, true);
        let mut w = BitWriter::new();
        w.write_bit(true);
        write_plain_key(&mut w, "7");
        w.write_bit(true);
        w.write_ubitvar(1);
        w.write_byte(0x11);
        let data = w.finish();
        t.apply_entries(&data, 1, &CodecLimits::for_testing()).unwrap();

        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(false);
        let data = w.finish();
        t.apply_entries(&data, 1, &CodecLimits::for_testing()).unwrap();

        let entry = t.get(0).unwrap();
        assert_eq!(entry.key, "7");
        assert_eq!(entry.value, vec![0x11]);
    }

    #[test]
    fn compressed_entry() {
        let payload = b"baseline-bytes-baseline-bytes".to_vec();
        let compressed = snap::raw::Encoder::new().compress_vec(&payload).unwrap();

        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(compressed.len() as u64, 17).unwrap();
        w.write_bytes(&compressed);
        let data = w.finish();

        let mut t = table(FLAG_ENTRY_COMPRESSION, false);
        t.apply_entries(&data, 1, &CodecLimits::for_testing()).unwrap();
        assert_eq!(t.get(0).unwrap().value, payload);
    }

    #[test]
    fn corrupt_compressed_entry() {
        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bits(2, 17).unwrap();
        w.write_bytes(&[0xFF, 0xFF]);
        let data = w.finish();

        let mut t = table(FLAG_ENTRY_COMPRESSION, false);
        let err = t
            .apply_entries(&data, 1, &CodecLimits::for_testing())
            .unwrap_err();
        assert!(matches!(err, CodecError::CorruptCompressedEntry { index: 0, .. }));
    }

    #[test]
    fn empty_buffer_has_no_entries() {
        let mut t = table(0, false);
        assert_eq!(t.apply_entries(&[], 10, &CodecLimits::for_testing()).unwrap(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn registry_create_and_update() {
        let mut tables = StringTables::new();
        let mut w = BitWriter::new();
        w.write_bit(true);
        write_plain_key(&mut w, "first");
        w.write_bit(false);
        let data = w.finish();
        let compressed = snap::raw::Encoder::new().compress_vec(&data).unwrap();

        let created = tables
            .create(
                &CreateStringTable {
                    name: "ActiveModifiers".to_string(),
                    num_entries: 1,
                    string_data: compressed,
                    data_compressed: true,
                    ..CreateStringTable::default()
                },
                &CodecLimits::for_testing(),
            )
            .unwrap();
        assert_eq!(created.index(), 0);
        assert_eq!(created.get(0).unwrap().key, "first");

        let mut w = BitWriter::new();
        w.write_bit(true);
        w.write_bit(true);
        write_plain_key(&mut w, "second");
        w.write_bit(false);
        let update = UpdateStringTable {
            table_id: 0,
            num_changed_entries: 1,
            string_data: w.finish(),
        };
        tables.update(&update, &CodecLimits::for_testing()).unwrap();
        assert_eq!(
            tables.get_by_name("ActiveModifiers").unwrap().get(0).unwrap().key,
            "second"
        );

        let missing = UpdateStringTable {
            table_id: 3,
            ..update
        };
        assert!(matches!(
            tables.update(&missing, &CodecLimits::for_testing()),
            Err(CodecError::UnknownStringTable { table_id: 3 })
        ));
    }

    #[test]
    fn entry_count_limit() {
        let mut t = table(0, false);
        let err = t
            .apply_entries(&[0xFF], 100_000, &CodecLimits::for_testing())
            .unwrap_err();
        assert!(matches!(err, CodecError::LimitsExceeded { .. }));
    }
}
