//! Parse session: the state shared by every record of one replay.

use schema::{FlattenedSerializers, IngestSummary, SerializerRegistry};

use crate::baseline::InstanceBaselines;
use crate::class::{ClassInfoRecord, ClassTable};
use crate::error::{CodecError, CodecResult};
use crate::limits::CodecLimits;
use crate::packet_entities::{DecodeContext, EntityBatch, EntityMap, PacketEntities};
use crate::scratch::DecodeScratch;
use crate::string_table::{
    CreateStringTable, StringTable, StringTables, UpdateStringTable, INSTANCE_BASELINE_TABLE,
};

/// Session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Game build of the replay; selects field encoding patches.
    pub game_build: u32,
    pub limits: CodecLimits,
}

impl SessionConfig {
    #[must_use]
    pub fn new(game_build: u32) -> Self {
        Self {
            game_build,
            limits: CodecLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Receives each applied packet-entities batch.
///
/// Observers run after the whole record has been applied, so every entity
/// in `entities` reflects the record's final state.
pub trait EntityObserver {
    fn on_entities(&mut self, batch: &EntityBatch, entities: &EntityMap);
}

impl<F> EntityObserver for F
where
    F: FnMut(&EntityBatch, &EntityMap),
{
    fn on_entities(&mut self, batch: &EntityBatch, entities: &EntityMap) {
        self(batch, entities);
    }
}

/// Owns the serializer registry, class table, string tables, baselines and
/// live entities of one replay.
pub struct ParseSession {
    config: SessionConfig,
    serializers: SerializerRegistry,
    classes: ClassTable,
    string_tables: StringTables,
    baselines: InstanceBaselines,
    entities: EntityMap,
    scratch: DecodeScratch,
    observers: Vec<Box<dyn EntityObserver>>,
    full_packets: usize,
}

impl std::fmt::Debug for ParseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseSession")
            .field("config", &self.config)
            .field("serializers", &self.serializers.len())
            .field("classes", &self.classes.len())
            .field("string_tables", &self.string_tables.len())
            .field("baselines", &self.baselines.len())
            .field("entities", &self.entities.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl ParseSession {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            serializers: SerializerRegistry::new(config.game_build),
            config,
            classes: ClassTable::new(),
            string_tables: StringTables::new(),
            baselines: InstanceBaselines::new(),
            entities: EntityMap::new(),
            scratch: DecodeScratch::new(),
            observers: Vec::new(),
            full_packets: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    #[must_use]
    pub const fn classes(&self) -> &ClassTable {
        &self.classes
    }

    #[must_use]
    pub const fn string_tables(&self) -> &StringTables {
        &self.string_tables
    }

    #[must_use]
    pub const fn baselines(&self) -> &InstanceBaselines {
        &self.baselines
    }

    #[must_use]
    pub const fn entities(&self) -> &EntityMap {
        &self.entities
    }

    /// Registers an observer for every later entity batch.
    pub fn add_observer(&mut self, observer: Box<dyn EntityObserver>) {
        self.observers.push(observer);
    }

    /// Registers the serializers of a send-tables record.
    pub fn on_send_tables(&mut self, record: &FlattenedSerializers) -> CodecResult<IngestSummary> {
        Ok(self.serializers.ingest(record)?)
    }

    /// Binds announced classes to serializers and refreshes baselines.
    pub fn on_class_info(&mut self, record: &ClassInfoRecord) -> CodecResult<usize> {
        let count = self
            .classes
            .ingest(record, &self.serializers, &self.config.limits)?;
        if let Some(table) = self.string_tables.get_by_name(INSTANCE_BASELINE_TABLE) {
            self.baselines.rebuild(table)?;
        }
        Ok(count)
    }

    /// Creates a string table; returns its index.
    pub fn on_create_string_table(&mut self, record: &CreateStringTable) -> CodecResult<u32> {
        let table = self.string_tables.create(record, &self.config.limits)?;
        let index = table.index();
        Self::refresh_baselines(&mut self.baselines, &self.classes, table)?;
        Ok(index)
    }

    /// Applies a string-table update.
    ///
    /// Updates naming a table that was never created are ignored.
    pub fn on_update_string_table(&mut self, record: &UpdateStringTable) -> CodecResult<()> {
        match self.string_tables.update(record, &self.config.limits) {
            Ok(table) => Self::refresh_baselines(&mut self.baselines, &self.classes, table),
            Err(CodecError::UnknownStringTable { table_id }) => {
                tracing::warn!(table_id, "update for unknown string table ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Applies a packet-entities record and notifies observers.
    ///
    /// Full snapshots after the first one of the session are skipped and
    /// yield an empty batch. A record that fails midway is not delivered to
    /// observers, though the entries before the failure remain applied.
    pub fn on_packet_entities(&mut self, record: &PacketEntities) -> CodecResult<EntityBatch> {
        if !record.is_delta {
            if self.full_packets > 0 {
                tracing::warn!(
                    full_packets = self.full_packets,
                    "ignoring repeated full entity snapshot"
                );
                return Ok(EntityBatch::default());
            }
            self.full_packets += 1;
        }

        let ctx = DecodeContext {
            classes: &self.classes,
            baselines: &self.baselines,
            limits: &self.config.limits,
        };
        let batch = self.entities.apply(record, ctx, &mut self.scratch)?;
        for observer in &mut self.observers {
            observer.on_entities(&batch, &self.entities);
        }
        Ok(batch)
    }

    fn refresh_baselines(
        baselines: &mut InstanceBaselines,
        classes: &ClassTable,
        table: &StringTable,
    ) -> CodecResult<()> {
        if table.name() != INSTANCE_BASELINE_TABLE || classes.is_empty() {
            return Ok(());
        }
        baselines.rebuild(table)?;
        Ok(())
    }
}
