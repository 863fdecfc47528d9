//! Named, versioned field lists.

use std::sync::Arc;

use crate::decoder::FieldDecoder;
use crate::error::{SchemaError, SchemaResult};
use crate::field::{Field, FieldLayout};

/// An ordered list of fields describing one networked class or component.
#[derive(Debug, Clone, PartialEq)]
pub struct Serializer {
    name: String,
    version: i32,
    fields: Vec<Arc<Field>>,
}

impl Serializer {
    pub fn new(name: impl Into<String>, version: i32, fields: Vec<Arc<Field>>) -> Self {
        Self {
            name: name.into(),
            version,
            fields,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn version(&self) -> i32 {
        self.version
    }

    #[must_use]
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index).map(AsRef::as_ref)
    }

    /// Resolves the decoder for `path`, starting with `path[position]` as an
    /// index into this serializer.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::PathOutOfRange`] if an index along the path does
    /// not address a field.
    pub fn decoder_for_path(&self, path: &[i32], position: usize) -> SchemaResult<&FieldDecoder> {
        let raw = path.get(position).copied().unwrap_or(-1);
        let field = usize::try_from(raw)
            .ok()
            .and_then(|index| self.fields.get(index))
            .ok_or_else(|| SchemaError::PathOutOfRange {
                serializer: self.name.clone(),
                index: raw,
                fields: self.fields.len(),
            })?;
        field.decoder_for_path(path, position)
    }

    /// Resolves a dotted field name to path indices.
    ///
    /// Table fields continue into their nested serializer; variable tables and
    /// arrays take a decimal element index as the next segment, e.g.
    /// `CBodyComponent.m_cellX` or `m_vecAbilities.3`.
    #[must_use]
    pub fn field_path_for_name(&self, name: &str) -> Option<Vec<i32>> {
        let mut path = Vec::new();
        let mut segments = name.split('.');
        let mut current = self;
        let mut segment = segments.next()?;
        loop {
            let index = current
                .fields
                .iter()
                .position(|f| f.var_name == segment)?;
            path.push(i32::try_from(index).ok()?);
            let field = &current.fields[index];

            match field.layout() {
                FieldLayout::Simple { .. } => break,
                FieldLayout::FixedTable { serializer } => match segments.next() {
                    Some(next) => {
                        current = serializer;
                        segment = next;
                    }
                    None => break,
                },
                FieldLayout::FixedArray { .. } | FieldLayout::VariableArray { .. } => {
                    if let Some(element) = segments.next() {
                        path.push(element.parse().ok()?);
                    }
                    break;
                }
                FieldLayout::VariableTable { serializer } => {
                    let Some(element) = segments.next() else {
                        break;
                    };
                    path.push(element.parse().ok()?);
                    match segments.next() {
                        Some(next) => {
                            current = serializer;
                            segment = next;
                        }
                        None => break,
                    }
                }
            }
        }
        if segments.next().is_some() {
            return None;
        }
        Some(path)
    }
}
