//! Limits for session-level decoding.

/// Codec-specific limits enforced while decoding records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Largest accepted entity index plus one.
    pub max_entities: usize,
    /// Maximum number of entries in one string-table record.
    pub max_string_table_entries: usize,
    /// Maximum size of a decompressed string-table payload.
    pub max_decompressed_entry_bytes: usize,
    /// Maximum number of field paths in one entity update.
    pub max_field_paths: usize,
    /// Largest index accepted at any depth of a field path.
    pub max_field_index: usize,
    /// Maximum number of classes announced by class info.
    pub max_classes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_entities: 1 << 14,
            max_string_table_entries: 1 << 16,
            max_decompressed_entry_bytes: 16 * 1024 * 1024,
            max_field_paths: 1 << 16,
            max_field_index: 1 << 14,
            max_classes: 1 << 12,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_entities: 256,
            max_string_table_entries: 512,
            max_decompressed_entry_bytes: 64 * 1024,
            max_field_paths: 1024,
            max_field_index: 1024,
            max_classes: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_entities: usize::MAX,
            max_string_table_entries: usize::MAX,
            max_decompressed_entry_bytes: usize::MAX,
            max_field_paths: usize::MAX,
            max_field_index: usize::MAX,
            max_classes: usize::MAX,
        }
    }
}
