//! Serializer registry built from flattened send-table records.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SchemaError, SchemaResult};
use crate::field::Field;
use crate::field_type::FieldType;
use crate::hash::serializer_hash;
use crate::patch::{patches_for_build, FieldPatch};
use crate::Serializer;

/// Send node value that denotes the root of the class.
const ROOT_SEND_NODE: &str = "(root)";

/// A flattened serializer record: a shared symbol table, serializers that list
/// field indices, and the field table they index into.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlattenedSerializers {
    pub symbols: Vec<String>,
    pub serializers: Vec<SerializerRecord>,
    pub fields: Vec<FieldRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializerRecord {
    pub name_sym: i32,
    pub version: i32,
    pub field_indices: Vec<i32>,
}

/// One entry of the flattened field table. Symbol ids index
/// [`FlattenedSerializers::symbols`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRecord {
    pub var_name_sym: Option<i32>,
    pub var_type_sym: Option<i32>,
    pub send_node_sym: Option<i32>,
    pub field_serializer_name_sym: Option<i32>,
    pub field_serializer_version: Option<i32>,
    pub var_encoder_sym: Option<i32>,
    pub encode_flags: Option<i32>,
    pub bit_count: Option<i32>,
    pub low_value: Option<f32>,
    pub high_value: Option<f32>,
}

/// Outcome of one [`SerializerRegistry::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Names seen for the first time.
    pub added: usize,
    /// Names re-registered with an identical layout.
    pub redefined: usize,
    /// Names re-registered with a different layout.
    pub changed: usize,
}

/// Serializers by name. Later definitions of a name replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
    game_build: u32,
    serializers: HashMap<String, Arc<Serializer>>,
    hashes: HashMap<String, u64>,
}

impl SerializerRegistry {
    /// Creates an empty registry whose field patches are selected by
    /// `game_build`.
    #[must_use]
    pub fn new(game_build: u32) -> Self {
        Self {
            game_build,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn game_build(&self) -> u32 {
        self.game_build
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Serializer>> {
        self.serializers.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Layout hash of the registered serializer named `name`.
    #[must_use]
    pub fn layout_hash(&self, name: &str) -> Option<u64> {
        self.hashes.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Serializer>> {
        self.serializers.values()
    }

    /// Builds and registers every serializer in `record`, in order.
    ///
    /// Fields are shared by field index across the serializers of one record,
    /// and nested serializer names resolve against everything registered so
    /// far, including earlier serializers of the same record.
    ///
    /// # Errors
    ///
    /// Fails on out-of-range symbol or field ids, unparseable type strings and
    /// fields whose decoders cannot be resolved. Serializers registered before
    /// the failing one stay registered.
    pub fn ingest(&mut self, record: &FlattenedSerializers) -> SchemaResult<IngestSummary> {
        let patches: Vec<&FieldPatch> = patches_for_build(self.game_build).collect();
        let mut fields: HashMap<i32, Arc<Field>> = HashMap::new();
        let mut types: HashMap<String, Arc<FieldType>> = HashMap::new();
        let mut summary = IngestSummary::default();

        for serializer in &record.serializers {
            let name = symbol(&record.symbols, serializer.name_sym)?;
            let mut serializer_fields = Vec::with_capacity(serializer.field_indices.len());

            for &field_index in &serializer.field_indices {
                if let Some(field) = fields.get(&field_index) {
                    serializer_fields.push(Arc::clone(field));
                    continue;
                }
                let field_record = usize::try_from(field_index)
                    .ok()
                    .and_then(|i| record.fields.get(i))
                    .ok_or_else(|| SchemaError::UnknownField {
                        serializer: name.to_string(),
                        field_index,
                    })?;
                let field =
                    self.build_field(record, field_record, name, &patches, &mut types)?;
                let field = Arc::new(field);
                fields.insert(field_index, Arc::clone(&field));
                serializer_fields.push(field);
            }

            let built = Serializer::new(name, serializer.version, serializer_fields);
            let hash = serializer_hash(&built);
            match self.hashes.insert(name.to_string(), hash) {
                None => summary.added += 1,
                Some(previous) if previous == hash => summary.redefined += 1,
                Some(_) => {
                    tracing::debug!(serializer = name, version = serializer.version, "serializer layout changed");
                    summary.changed += 1;
                }
            }
            self.serializers.insert(name.to_string(), Arc::new(built));
        }

        tracing::debug!(
            serializers = record.serializers.len(),
            fields = fields.len(),
            added = summary.added,
            redefined = summary.redefined,
            changed = summary.changed,
            "ingested send tables"
        );
        Ok(summary)
    }

    fn build_field(
        &self,
        record: &FlattenedSerializers,
        field_record: &FieldRecord,
        parent_name: &str,
        patches: &[&FieldPatch],
        types: &mut HashMap<String, Arc<FieldType>>,
    ) -> SchemaResult<Field> {
        let symbols = &record.symbols;
        let var_type = optional_symbol(symbols, field_record.var_type_sym)?;
        let field_type = match types.get(var_type) {
            Some(ty) => Arc::clone(ty),
            None => {
                let ty = Arc::new(FieldType::parse(var_type)?);
                types.insert(var_type.to_string(), Arc::clone(&ty));
                ty
            }
        };

        let mut field = Field::new(
            optional_symbol(symbols, field_record.var_name_sym)?,
            var_type,
            field_type,
        );
        field.parent_name = parent_name.to_string();
        let send_node = optional_symbol(symbols, field_record.send_node_sym)?;
        if send_node != ROOT_SEND_NODE {
            field.send_node = send_node.to_string();
        }
        field.serializer_name =
            optional_symbol(symbols, field_record.field_serializer_name_sym)?.to_string();
        field.serializer_version = field_record.field_serializer_version.unwrap_or(0);
        field.encoder = optional_symbol(symbols, field_record.var_encoder_sym)?.to_string();
        field.encode_flags = field_record.encode_flags;
        field.bit_count = field_record.bit_count;
        field.low_value = field_record.low_value;
        field.high_value = field_record.high_value;

        let nested = if field.serializer_name.is_empty() {
            None
        } else {
            self.serializers.get(&field.serializer_name).cloned()
        };

        for patch in patches {
            patch.apply(&mut field);
        }
        field.resolve_layout(nested)?;
        Ok(field)
    }
}

fn symbol(symbols: &[String], id: i32) -> SchemaResult<&str> {
    usize::try_from(id)
        .ok()
        .and_then(|i| symbols.get(i))
        .map(String::as_str)
        .ok_or(SchemaError::UnknownSymbol {
            symbol: id,
            symbols: symbols.len(),
        })
}

fn optional_symbol(symbols: &[String], id: Option<i32>) -> SchemaResult<&str> {
    id.map_or(Ok(""), |id| symbol(symbols, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FieldDecoder, FloatDecoder};
    use crate::field::FieldModel;

    struct Builder {
        record: FlattenedSerializers,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                record: FlattenedSerializers::default(),
            }
        }

        fn sym(&mut self, s: &str) -> i32 {
            if let Some(i) = self.record.symbols.iter().position(|x| x == s) {
                return i as i32;
            }
            self.record.symbols.push(s.to_string());
            (self.record.symbols.len() - 1) as i32
        }

        fn field(&mut self, name: &str, ty: &str, nested: Option<&str>) -> i32 {
            let record = FieldRecord {
                var_name_sym: Some(self.sym(name)),
                var_type_sym: Some(self.sym(ty)),
                send_node_sym: Some(self.sym("(root)")),
                field_serializer_name_sym: nested.map(|n| self.sym(n)),
                ..FieldRecord::default()
            };
            self.record.fields.push(record);
            (self.record.fields.len() - 1) as i32
        }

        fn serializer(&mut self, name: &str, version: i32, fields: Vec<i32>) {
            let name_sym = self.sym(name);
            self.record.serializers.push(SerializerRecord {
                name_sym,
                version,
                field_indices: fields,
            });
        }
    }

    fn hero_record() -> FlattenedSerializers {
        let mut b = Builder::new();
        let cell = b.field("m_cellX", "uint16", None);
        b.serializer("CBodyComponent", 0, vec![cell]);
        let health = b.field("m_iHealth", "int32", None);
        let body = b.field("CBodyComponent", "CBodyComponent", Some("CBodyComponent"));
        let sim = b.field("m_flSimulationTime", "float32", None);
        b.serializer("CDOTA_Unit_Hero_Axe", 0, vec![health, body, sim]);
        b.record
    }

    #[test]
    fn ingest_builds_nested_serializers() {
        let mut registry = SerializerRegistry::new(7000);
        let summary = registry.ingest(&hero_record()).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(registry.len(), 2);

        let hero = registry.get("CDOTA_Unit_Hero_Axe").unwrap();
        assert_eq!(hero.fields().len(), 3);
        let body = hero.field(1).unwrap();
        assert_eq!(body.model(), FieldModel::FixedTable);
        assert_eq!(body.parent_name, "CDOTA_Unit_Hero_Axe");
        assert!(body.send_node.is_empty());
        assert_eq!(
            hero.decoder_for_path(&[2], 0).unwrap(),
            &FieldDecoder::Float(FloatDecoder::SimulationTime)
        );
    }

    #[test]
    fn fields_are_shared_by_index() {
        let mut b = Builder::new();
        let health = b.field("m_iHealth", "int32", None);
        b.serializer("CA", 0, vec![health]);
        b.serializer("CB", 0, vec![health]);
        let mut registry = SerializerRegistry::new(0);
        registry.ingest(&b.record).unwrap();
        let a = &registry.get("CA").unwrap().fields()[0];
        let c = &registry.get("CB").unwrap().fields()[0];
        assert!(Arc::ptr_eq(a, c));
        assert_eq!(c.parent_name, "CA");
    }

    #[test]
    fn redefinition_detection() {
        let mut registry = SerializerRegistry::new(7000);
        registry.ingest(&hero_record()).unwrap();
        let again = registry.ingest(&hero_record()).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.redefined, 2);

        let mut b = Builder::new();
        let mana = b.field("m_flMana", "float32", None);
        b.serializer("CBodyComponent", 0, vec![mana]);
        let changed = registry.ingest(&b.record).unwrap();
        assert_eq!(changed.changed, 1);
        assert_eq!(
            registry.get("CBodyComponent").unwrap().field(0).unwrap().var_name,
            "m_flMana"
        );
    }

    #[test]
    fn unknown_nested_serializer_falls_back_to_leaf() {
        let mut b = Builder::new();
        let f = b.field("m_pEntity", "CEntityIdentity*", Some("CEntityIdentity"));
        b.serializer("CWorld", 0, vec![f]);
        let mut registry = SerializerRegistry::new(0);
        registry.ingest(&b.record).unwrap();
        let field = registry.get("CWorld").unwrap().field(0).unwrap();
        assert_eq!(field.model(), FieldModel::Simple);
    }

    #[test]
    fn bad_ids_are_errors() {
        let mut b = Builder::new();
        b.serializer("CWorld", 0, vec![4]);
        let mut registry = SerializerRegistry::new(0);
        assert!(matches!(
            registry.ingest(&b.record),
            Err(SchemaError::UnknownField { field_index: 4, .. })
        ));

        let record = FlattenedSerializers {
            symbols: vec![],
            serializers: vec![SerializerRecord {
                name_sym: 3,
                version: 0,
                field_indices: vec![],
            }],
            fields: vec![],
        };
        assert!(matches!(
            registry.ingest(&record),
            Err(SchemaError::UnknownSymbol { symbol: 3, symbols: 0 })
        ));
    }

    #[test]
    fn patches_follow_game_build() {
        let mut b = Builder::new();
        let f = b.field("m_ulTeamLogo", "uint64", None);
        b.serializer("CDOTA_DataRadiant", 0, vec![f]);

        let mut old = SerializerRegistry::new(1020);
        old.ingest(&b.record).unwrap();
        assert_eq!(
            old.get("CDOTA_DataRadiant").unwrap().decoder_for_path(&[0], 0).unwrap(),
            &FieldDecoder::Fixed64
        );

        let mut new = SerializerRegistry::new(6000);
        new.ingest(&b.record).unwrap();
        assert_eq!(
            new.get("CDOTA_DataRadiant").unwrap().decoder_for_path(&[0], 0).unwrap(),
            &FieldDecoder::Unsigned64
        );
    }
}
