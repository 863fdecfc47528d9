//! The packet-entities delta protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitstream::BitReader;

use crate::baseline::InstanceBaselines;
use crate::class::{ClassInfo, ClassTable};
use crate::entity::{Entity, EntityOp};
use crate::error::{CodecError, CodecResult, LimitKind};
use crate::field_reader::decode_fields;
use crate::limits::CodecLimits;
use crate::scratch::DecodeScratch;
use crate::types::{ClassId, EntityIndex};

const SERIAL_BITS: u8 = 17;

/// A packet-entities record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketEntities {
    /// `false` for a full authoritative snapshot.
    pub is_delta: bool,
    pub updated_entries: i32,
    pub entity_data: Vec<u8>,
}

/// One entity touched by a record.
#[derive(Debug, Clone)]
pub struct EntityChange {
    pub index: EntityIndex,
    pub serial: u32,
    pub class_id: ClassId,
    pub op: EntityOp,
    /// Final state of an entity removed by this record.
    pub removed: Option<Entity>,
}

/// Every change of one record, in wire order.
#[derive(Debug, Clone, Default)]
pub struct EntityBatch {
    pub changes: Vec<EntityChange>,
}

impl EntityBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityChange> {
        self.changes.iter()
    }

    /// Changes whose op includes every flag of `op`.
    pub fn with_op(&self, op: EntityOp) -> impl Iterator<Item = &EntityChange> {
        self.changes.iter().filter(move |c| c.op.contains(op))
    }
}

/// Read-only state a record is decoded against.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub classes: &'a ClassTable,
    pub baselines: &'a InstanceBaselines,
    pub limits: &'a CodecLimits,
}

/// Live entities by index.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    entities: BTreeMap<EntityIndex, Entity>,
}

impl EntityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: EntityIndex) -> Option<&Entity> {
        self.entities.get(&index)
    }

    /// Entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entities of the named class.
    pub fn by_class<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.values().filter(move |e| e.class().name() == name)
    }

    /// Applies one record and returns every change it made.
    ///
    /// On error, changes applied before the failing entry stay in the map but
    /// no batch is returned for them.
    pub fn apply(
        &mut self,
        record: &PacketEntities,
        ctx: DecodeContext<'_>,
        scratch: &mut DecodeScratch,
    ) -> CodecResult<EntityBatch> {
        let updates = usize::try_from(record.updated_entries).unwrap_or(0);
        let mut reader = BitReader::new(&record.entity_data);
        let mut batch = EntityBatch {
            changes: Vec::with_capacity(updates),
        };
        let mut index: i64 = -1;

        for _ in 0..updates {
            index += i64::from(reader.read_ubitvar()?) + 1;
            let raw = u32::try_from(index).map_err(|_| CodecError::LimitsExceeded {
                kind: LimitKind::Entities,
                limit: ctx.limits.max_entities,
                actual: usize::MAX,
            })?;
            if raw as usize >= ctx.limits.max_entities {
                return Err(CodecError::LimitsExceeded {
                    kind: LimitKind::Entities,
                    limit: ctx.limits.max_entities,
                    actual: raw as usize + 1,
                });
            }
            let entity_index = EntityIndex::new(raw);

            let change = match reader.read_ubits(2)? {
                2 => self.create(entity_index, &mut reader, ctx, scratch)?,
                0 => self.update(entity_index, &mut reader, ctx, scratch)?,
                1 => self.leave(entity_index)?,
                _ => self.delete(entity_index)?,
            };
            batch.changes.push(change);
        }

        tracing::trace!(
            changes = batch.len(),
            live = self.entities.len(),
            delta = record.is_delta,
            "applied packet entities"
        );
        Ok(batch)
    }

    fn create(
        &mut self,
        index: EntityIndex,
        reader: &mut BitReader<'_>,
        ctx: DecodeContext<'_>,
        scratch: &mut DecodeScratch,
    ) -> CodecResult<EntityChange> {
        let class_id = ClassId::new(reader.read_ubits(ctx.classes.class_id_bits())?);
        let serial = reader.read_ubits(SERIAL_BITS)?;
        // Unused by the protocol; keeps the cursor aligned.
        reader.read_varu32()?;

        let class: Arc<ClassInfo> = ctx
            .classes
            .get(class_id)
            .cloned()
            .ok_or(CodecError::UnknownClass {
                class_id: class_id.raw(),
            })?;
        let baseline = ctx
            .baselines
            .get(class_id)
            .ok_or(CodecError::UnknownBaseline {
                class_id: class_id.raw(),
            })?;

        let mut entity = Entity::new(index, serial, Arc::clone(&class));
        let serializer = class.serializer();
        let mut baseline_reader = BitReader::new(baseline);
        decode_fields(
            &mut baseline_reader,
            serializer,
            &mut entity.state,
            scratch,
            ctx.limits,
            index.raw(),
        )?;
        decode_fields(
            reader,
            serializer,
            &mut entity.state,
            scratch,
            ctx.limits,
            index.raw(),
        )?;

        self.entities.insert(index, entity);
        Ok(EntityChange {
            index,
            serial,
            class_id,
            op: EntityOp::CREATED | EntityOp::ENTERED,
            removed: None,
        })
    }

    fn update(
        &mut self,
        index: EntityIndex,
        reader: &mut BitReader<'_>,
        ctx: DecodeContext<'_>,
        scratch: &mut DecodeScratch,
    ) -> CodecResult<EntityChange> {
        let entity = self
            .entities
            .get_mut(&index)
            .ok_or(CodecError::UnknownEntity { index: index.raw() })?;

        let mut op = EntityOp::UPDATED;
        if !entity.active {
            entity.active = true;
            op |= EntityOp::ENTERED;
        }

        let class = Arc::clone(entity.class());
        decode_fields(
            reader,
            class.serializer(),
            &mut entity.state,
            scratch,
            ctx.limits,
            index.raw(),
        )?;

        Ok(EntityChange {
            index,
            serial: entity.serial(),
            class_id: class.id(),
            op,
            removed: None,
        })
    }

    fn leave(&mut self, index: EntityIndex) -> CodecResult<EntityChange> {
        let entity = self
            .entities
            .get_mut(&index)
            .ok_or(CodecError::UnknownEntity { index: index.raw() })?;
        if !entity.active {
            return Err(CodecError::InactiveEntity { index: index.raw() });
        }
        entity.active = false;
        Ok(EntityChange {
            index,
            serial: entity.serial(),
            class_id: entity.class_id(),
            op: EntityOp::LEFT,
            removed: None,
        })
    }

    /// Removes an existing entity whether or not it is active.
    fn delete(&mut self, index: EntityIndex) -> CodecResult<EntityChange> {
        let entity = self
            .entities
            .remove(&index)
            .ok_or(CodecError::UnknownEntity { index: index.raw() })?;
        Ok(EntityChange {
            index,
            serial: entity.serial(),
            class_id: entity.class_id(),
            op: EntityOp::LEFT | EntityOp::DELETED,
            removed: Some(entity),
        })
    }
}
