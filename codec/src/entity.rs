//! Live entities and the operations reported for them.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use schema::FieldValue;

use crate::class::ClassInfo;
use crate::field_path::FieldPath;
use crate::field_state::FieldState;
use crate::types::{ClassId, EntityIndex};

bitflags! {
    /// What happened to an entity within one packet-entities record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EntityOp: u8 {
        const CREATED = 0x01;
        const UPDATED = 0x02;
        const DELETED = 0x04;
        const ENTERED = 0x08;
        const LEFT = 0x10;
    }
}

impl fmt::Display for EntityOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names = [
            (Self::CREATED, "Created"),
            (Self::UPDATED, "Updated"),
            (Self::DELETED, "Deleted"),
            (Self::ENTERED, "Entered"),
            (Self::LEFT, "Left"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A networked entity and its decoded field values.
#[derive(Debug, Clone)]
pub struct Entity {
    index: EntityIndex,
    serial: u32,
    class: Arc<ClassInfo>,
    pub(crate) active: bool,
    pub(crate) state: FieldState,
}

impl Entity {
    /// Creates an active entity with empty state.
    #[must_use]
    pub fn new(index: EntityIndex, serial: u32, class: Arc<ClassInfo>) -> Self {
        Self {
            index,
            serial,
            class,
            active: true,
            state: FieldState::new(),
        }
    }

    #[must_use]
    pub const fn index(&self) -> EntityIndex {
        self.index
    }

    /// Serial distinguishing successive occupants of one index.
    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.class
    }

    #[must_use]
    pub fn class_id(&self) -> ClassId {
        self.class.id()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn state(&self) -> &FieldState {
        &self.state
    }

    /// Value at an explicit field path.
    #[must_use]
    pub fn get(&self, path: &[i32]) -> Option<&FieldValue> {
        self.state.get(path)
    }

    /// Resolves a dotted field name such as `CBodyComponent.m_cellX`.
    #[must_use]
    pub fn field_path(&self, name: &str) -> Option<FieldPath> {
        let indices = self.class.serializer().field_path_for_name(name)?;
        FieldPath::from_indices(&indices).ok()
    }

    /// Value of a dotted field name, if the entity has one.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&FieldValue> {
        let path = self.field_path(name)?;
        self.state.get(path.as_slice())
    }
}
