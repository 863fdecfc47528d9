//! Network classes and their serializers.

use std::collections::HashMap;
use std::sync::Arc;

use schema::{Serializer, SerializerRegistry};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::types::ClassId;

/// One `(class id, network name)` pair from a class-info record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassEntry {
    pub class_id: u32,
    pub network_name: String,
}

/// A class-info record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassInfoRecord {
    pub classes: Vec<ClassEntry>,
}

/// A network class bound to its serializer.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    id: ClassId,
    name: String,
    serializer: Arc<Serializer>,
}

impl ClassInfo {
    #[must_use]
    pub fn new(id: ClassId, name: impl Into<String>, serializer: Arc<Serializer>) -> Self {
        Self {
            id,
            name: name.into(),
            serializer,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ClassId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn serializer(&self) -> &Arc<Serializer> {
        &self.serializer
    }
}

/// All classes announced so far, plus the width of class ids on the wire.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    by_id: HashMap<ClassId, Arc<ClassInfo>>,
    by_name: HashMap<String, ClassId>,
    class_id_bits: u8,
}

impl ClassTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Bits used to encode a class id in entity creates.
    #[must_use]
    pub const fn class_id_bits(&self) -> u8 {
        self.class_id_bits
    }

    #[must_use]
    pub fn get(&self, id: ClassId) -> Option<&Arc<ClassInfo>> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<ClassInfo>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Binds each announced class to its serializer.
    ///
    /// The record is validated as a whole; on error the table is unchanged.
    pub fn ingest(
        &mut self,
        record: &ClassInfoRecord,
        serializers: &SerializerRegistry,
        limits: &CodecLimits,
    ) -> CodecResult<usize> {
        let mut resolved = Vec::with_capacity(record.classes.len());
        for entry in &record.classes {
            let serializer = serializers.get(&entry.network_name).ok_or_else(|| {
                CodecError::MissingSerializer {
                    class_id: entry.class_id,
                    name: entry.network_name.clone(),
                }
            })?;
            resolved.push(ClassInfo::new(
                ClassId::new(entry.class_id),
                entry.network_name.clone(),
                Arc::clone(serializer),
            ));
        }

        let new_ids = resolved
            .iter()
            .filter(|class| !self.by_id.contains_key(&class.id))
            .count();
        let total = self.by_id.len() + new_ids;
        if total > limits.max_classes {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::Classes,
                limit: limits.max_classes,
                actual: total,
            });
        }

        let count = resolved.len();
        for class in resolved {
            self.by_name.insert(class.name.clone(), class.id);
            self.by_id.insert(class.id, Arc::new(class));
        }
        self.class_id_bits = class_id_bits(self.by_id.len());
        tracing::debug!(
            classes = self.by_id.len(),
            class_id_bits = self.class_id_bits,
            "ingested class info"
        );
        Ok(count)
    }
}

/// `floor(log2(count)) + 1`, or zero with no classes.
#[must_use]
pub fn class_id_bits(count: usize) -> u8 {
    if count == 0 {
        0
    } else {
        (count.ilog2() + 1) as u8
    }
}
