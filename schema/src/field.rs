//! Schema fields and their resolved layouts.

use std::fmt;
use std::sync::Arc;

use crate::decoder::{self, FieldDecoder, LENGTH_DECODER, PRESENCE_DECODER};
use crate::error::{SchemaError, SchemaResult};
use crate::field_type::FieldType;
use crate::serializer::Serializer;

/// Base types of dynamically sized vectors.
const VECTOR_CONTAINERS: &[&str] = &["CUtlVector", "CNetworkUtlVectorBase"];

/// Component types embedded as single-instance tables even though they are
/// not declared as pointers.
const EMBEDDED_TABLE_TYPES: &[&str] = &[
    "PhysicsRagdollPose_t",
    "CBodyComponent",
    "CEntityIdentity",
    "CPhysicsComponent",
    "CRenderComponent",
    "CDOTAGamerules",
    "CDOTAGameManager",
    "CDOTASpectatorGraphManager",
    "CPlayerLocalData",
    "CPlayer_CameraServices",
    "CDOTAGameRules",
];

/// How a field's values are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldModel {
    Simple,
    FixedArray,
    FixedTable,
    VariableArray,
    VariableTable,
}

impl FieldModel {
    /// Classifies a field from its type and whether it names a known
    /// serializer.
    #[must_use]
    pub fn classify(field_type: &FieldType, has_serializer: bool) -> Self {
        if has_serializer {
            if field_type.pointer || EMBEDDED_TABLE_TYPES.contains(&field_type.base.as_str()) {
                Self::FixedTable
            } else {
                Self::VariableTable
            }
        } else if field_type.count > 0 && field_type.base != "char" {
            Self::FixedArray
        } else if VECTOR_CONTAINERS.contains(&field_type.base.as_str()) {
            Self::VariableArray
        } else {
            Self::Simple
        }
    }
}

impl fmt::Display for FieldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Simple => "simple",
            Self::FixedArray => "fixed-array",
            Self::FixedTable => "fixed-table",
            Self::VariableArray => "variable-array",
            Self::VariableTable => "variable-table",
        };
        f.write_str(name)
    }
}

/// A field's model together with the decoders and nested serializer it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLayout {
    Simple { decoder: FieldDecoder },
    FixedArray { decoder: FieldDecoder },
    /// Presence flag at the field's own depth, nested fields below it.
    FixedTable { serializer: Arc<Serializer> },
    /// Length at the field's own depth, elements one level down.
    VariableArray { element: FieldDecoder },
    /// Length at the field's own depth, element index one level down, nested
    /// fields below that.
    VariableTable { serializer: Arc<Serializer> },
}

impl FieldLayout {
    #[must_use]
    pub const fn model(&self) -> FieldModel {
        match self {
            Self::Simple { .. } => FieldModel::Simple,
            Self::FixedArray { .. } => FieldModel::FixedArray,
            Self::FixedTable { .. } => FieldModel::FixedTable,
            Self::VariableArray { .. } => FieldModel::VariableArray,
            Self::VariableTable { .. } => FieldModel::VariableTable,
        }
    }
}

/// One field of a serializer.
///
/// A field built with [`Field::new`] decodes as a plain unsigned varint until
/// [`Field::resolve_layout`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub var_name: String,
    pub var_type: String,
    /// Name of the serializer that introduced the field.
    pub parent_name: String,
    pub send_node: String,
    /// Nested serializer name, empty if the field is a leaf.
    pub serializer_name: String,
    pub serializer_version: i32,
    pub encoder: String,
    pub encode_flags: Option<i32>,
    pub bit_count: Option<i32>,
    pub low_value: Option<f32>,
    pub high_value: Option<f32>,
    pub field_type: Arc<FieldType>,
    layout: FieldLayout,
}

impl Field {
    pub fn new(
        var_name: impl Into<String>,
        var_type: impl Into<String>,
        field_type: impl Into<Arc<FieldType>>,
    ) -> Self {
        Self {
            var_name: var_name.into(),
            var_type: var_type.into(),
            parent_name: String::new(),
            send_node: String::new(),
            serializer_name: String::new(),
            serializer_version: 0,
            encoder: String::new(),
            encode_flags: None,
            bit_count: None,
            low_value: None,
            high_value: None,
            field_type: field_type.into(),
            layout: FieldLayout::Simple {
                decoder: FieldDecoder::Unsigned32,
            },
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    #[must_use]
    pub const fn model(&self) -> FieldModel {
        self.layout.model()
    }

    /// The nested serializer of a table field.
    #[must_use]
    pub fn serializer(&self) -> Option<&Arc<Serializer>> {
        match &self.layout {
            FieldLayout::FixedTable { serializer } | FieldLayout::VariableTable { serializer } => {
                Some(serializer)
            }
            _ => None,
        }
    }

    /// Classifies the field and resolves its decoders.
    ///
    /// `nested` is the serializer named by `serializer_name`, if one is
    /// registered. Encoding patches must already have been applied.
    pub fn resolve_layout(&mut self, nested: Option<Arc<Serializer>>) -> SchemaResult<()> {
        let model = FieldModel::classify(&self.field_type, nested.is_some());
        self.layout = match (model, nested) {
            (FieldModel::FixedTable, Some(serializer)) => FieldLayout::FixedTable { serializer },
            (FieldModel::VariableTable, Some(serializer)) => {
                FieldLayout::VariableTable { serializer }
            }
            (FieldModel::FixedArray, _) => FieldLayout::FixedArray {
                decoder: decoder::find_decoder(self)?,
            },
            (FieldModel::VariableArray, _) => {
                let element = self.field_type.element_base().ok_or_else(|| {
                    SchemaError::MissingElementType {
                        field: self.var_name.clone(),
                        type_name: self.var_type.clone(),
                    }
                })?;
                FieldLayout::VariableArray {
                    element: decoder::find_decoder_by_base_type(element),
                }
            }
            _ => FieldLayout::Simple {
                decoder: decoder::find_decoder(self)?,
            },
        };
        Ok(())
    }

    /// Resolves the decoder for `path`, where `path[position]` addresses this
    /// field.
    pub fn decoder_for_path(&self, path: &[i32], position: usize) -> SchemaResult<&FieldDecoder> {
        let last = path.len().saturating_sub(1);
        match &self.layout {
            FieldLayout::Simple { decoder } | FieldLayout::FixedArray { decoder } => Ok(decoder),
            FieldLayout::FixedTable { serializer } => {
                if last == position {
                    Ok(&PRESENCE_DECODER)
                } else {
                    serializer.decoder_for_path(path, position + 1)
                }
            }
            FieldLayout::VariableArray { element } => {
                if last == position + 1 {
                    Ok(element)
                } else {
                    Ok(&LENGTH_DECODER)
                }
            }
            FieldLayout::VariableTable { serializer } => {
                if last >= position + 2 {
                    serializer.decoder_for_path(path, position + 2)
                } else {
                    Ok(&LENGTH_DECODER)
                }
            }
        }
    }
}
