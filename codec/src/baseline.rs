//! Instance baselines keyed by class id.

use std::collections::HashMap;

use crate::error::{CodecError, CodecResult};
use crate::string_table::StringTable;
use crate::types::ClassId;

/// Raw default-state payloads per class, decoded before each create.
#[derive(Debug, Clone, Default)]
pub struct InstanceBaselines {
    by_class: HashMap<ClassId, Vec<u8>>,
}

impl InstanceBaselines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    #[must_use]
    pub fn get(&self, class_id: ClassId) -> Option<&[u8]> {
        self.by_class.get(&class_id).map(Vec::as_slice)
    }

    /// Replaces every baseline with the entries of `table`.
    ///
    /// Entry keys are decimal class ids; entries with an empty key are
    /// skipped. On error the previous baselines are kept.
    pub fn rebuild(&mut self, table: &StringTable) -> CodecResult<usize> {
        let mut by_class = HashMap::with_capacity(table.len());
        for (_, entry) in table.iter() {
            if entry.key.is_empty() {
                continue;
            }
            let id: u32 = entry
                .key
                .parse()
                .map_err(|_| CodecError::InvalidBaselineKey {
                    key: entry.key.clone(),
                })?;
            by_class.insert(ClassId::new(id), entry.value.clone());
        }
        self.by_class = by_class;
        tracing::debug!(baselines = self.by_class.len(), "rebuilt instance baselines");
        Ok(self.by_class.len())
    }
}
