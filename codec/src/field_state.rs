//! Sparse nested value storage for one entity.

use schema::FieldValue;

/// Slots materialized for a fresh node.
const INITIAL_SLOTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Default)]
enum Slot {
    #[default]
    Empty,
    Value(FieldValue),
    Nested(FieldState),
}

/// One node of an entity's value tree.
///
/// Nodes grow on demand and never shrink. A slot that has been used as a
/// nested node keeps that role; scalar writes to it are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    slots: Vec<Slot>,
}

impl Default for FieldState {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldState {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(INITIAL_SLOTS);
        slots.resize_with(INITIAL_SLOTS, Slot::default);
        Self { slots }
    }

    /// Number of materialized slots at this node.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reads the value at `path`.
    ///
    /// Returns `None` for paths never written, for paths that run through a
    /// scalar, and for paths that end at a nested node.
    #[must_use]
    pub fn get(&self, path: &[i32]) -> Option<&FieldValue> {
        let (&last, parents) = path.split_last()?;
        let mut node = self;
        for &index in parents {
            match node.slot(index)? {
                Slot::Nested(child) => node = child,
                _ => return None,
            }
        }
        match node.slot(last)? {
            Slot::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Nested node at `path`, if one exists.
    #[must_use]
    pub fn get_nested(&self, path: &[i32]) -> Option<&Self> {
        let mut node = self;
        for &index in path {
            match node.slot(index)? {
                Slot::Nested(child) => node = child,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Stores `value` at `path`, creating intermediate nodes as needed.
    ///
    /// Negative indices are ignored. An intermediate slot holding a scalar is
    /// replaced by a nested node; a final slot holding a nested node is left
    /// untouched.
    pub fn set(&mut self, path: &[i32], value: FieldValue) {
        let Some((&last, parents)) = path.split_last() else {
            return;
        };
        let mut node = self;
        for &index in parents {
            let Ok(index) = usize::try_from(index) else {
                return;
            };
            let slot = node.slot_mut(index);
            if !matches!(slot, Slot::Nested(_)) {
                *slot = Slot::Nested(Self::new());
            }
            let Slot::Nested(child) = slot else {
                return;
            };
            node = child;
        }
        let Ok(last) = usize::try_from(last) else {
            return;
        };
        let slot = node.slot_mut(last);
        if !matches!(slot, Slot::Nested(_)) {
            *slot = Slot::Value(value);
        }
    }

    /// Visits every stored value with its path, in index order.
    pub fn for_each(&self, mut visit: impl FnMut(&[i32], &FieldValue)) {
        let mut path = Vec::new();
        self.walk(&mut path, &mut visit);
    }

    fn walk(&self, path: &mut Vec<i32>, visit: &mut impl FnMut(&[i32], &FieldValue)) {
        for (index, slot) in self.slots.iter().enumerate() {
            path.push(index as i32);
            match slot {
                Slot::Empty => {}
                Slot::Value(value) => visit(path, value),
                Slot::Nested(child) => child.walk(path, visit),
            }
            path.pop();
        }
    }

    fn slot(&self, index: i32) -> Option<&Slot> {
        usize::try_from(index).ok().and_then(|i| self.slots.get(i))
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        if self.slots.len() < index + 2 {
            let len = (index + 2).max(self.slots.len() * 2);
            self.slots.resize_with(len, Slot::default);
        }
        &mut self.slots[index]
    }
}
