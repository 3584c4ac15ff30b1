use super::coercion::json_kind;
use super::config::MapperConfig;
use super::entity_mapper::EntityMapper;
use super::report::{BatchReport, RecordFailure};
use super::static_data::reshape_static_data;
use crate::cache::IdentityCache;
use crate::core::{EntityType, MapError, Record, Result};
use crate::schema::SchemaCatalog;
use crate::storage::PersistenceStore;
use log::{debug, warn};
use serde_json::Value as JsonValue;
use tracing::{Level, event, info_span};

/// Where a `BatchProcessor` is within a top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Validating,
    MappingRecords,
}

/// Top-level driver: validates payloads, maps their records and owns the
/// identity cache of the session.
pub struct BatchProcessor<S: PersistenceStore> {
    store: S,
    catalog: SchemaCatalog,
    cache: IdentityCache,
    config: MapperConfig,
    state: ProcessorState,
    #[cfg(test)]
    trail: Vec<ProcessorState>,
}

impl<S: PersistenceStore> BatchProcessor<S> {
    pub fn new(store: S, catalog: SchemaCatalog, config: MapperConfig) -> Self {
        Self {
            store,
            catalog,
            cache: IdentityCache::new(),
            config,
            state: ProcessorState::Idle,
            #[cfg(test)]
            trail: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Forget every cached identity. Call before the first batch of a
    /// session and between unrelated batches.
    pub fn reset_mapper(&mut self) {
        debug!("resetting identity cache ({} entries)", self.cache.len());
        self.cache.reset();
    }

    /// Map a sequence of records of `entity_type`.
    ///
    /// A payload that is not a sequence of records fails with
    /// `MapError::PayloadShape` before anything is written. Records that fail
    /// on their own are collected in the report; storage errors end the batch.
    pub fn process_data(&mut self, entity_type: &str, payload: &JsonValue) -> Result<BatchReport> {
        let span = info_span!("mapper.batch", entity_type = %entity_type, mode = "records");
        let _enter = span.enter();

        if self.config.reset_before_batch {
            self.reset_mapper();
        }

        self.transition(ProcessorState::Validating);
        let records = match validate_records(entity_type, payload) {
            Ok(records) => records,
            Err(err) => {
                event!(Level::WARN, error = %err, "payload rejected");
                self.transition(ProcessorState::Idle);
                return Err(err);
            }
        };

        self.map_records(entity_type, &records)
    }

    /// Map static/reference data: header row plus positional rows.
    ///
    /// Reshaping is part of validation; the reshaped records go straight on
    /// to mapping.
    pub fn process_static_data(
        &mut self,
        entity_type: &str,
        payload: &JsonValue,
    ) -> Result<BatchReport> {
        let span = info_span!("mapper.batch", entity_type = %entity_type, mode = "static");
        let _enter = span.enter();

        if self.config.reset_before_batch {
            self.reset_mapper();
        }

        self.transition(ProcessorState::Validating);
        let records = match reshape_static_data(payload) {
            Ok(records) => records,
            Err(err) => {
                event!(Level::WARN, error = %err, "static data rejected");
                self.transition(ProcessorState::Idle);
                return Err(err);
            }
        };

        let records: Vec<&Record> = records.iter().collect();
        self.map_records(entity_type, &records)
    }

    /// Map records that were already validated by the caller.
    pub fn process_records(&mut self, entity_type: &str, records: &[Record]) -> Result<BatchReport> {
        let span = info_span!("mapper.batch", entity_type = %entity_type, mode = "prevalidated");
        let _enter = span.enter();

        if self.config.reset_before_batch {
            self.reset_mapper();
        }
        let records: Vec<&Record> = records.iter().collect();
        self.map_records(entity_type, &records)
    }

    /// Map an `{"entities": {Type: static data, ..}}` payload type by type in
    /// `order`, resetting the mapper before each type. Types missing from the
    /// payload are skipped, as are payload types not named in `order`.
    pub fn process_entities(&mut self, payload: &JsonValue, order: &[&str]) -> Result<Vec<BatchReport>> {
        let entities = payload
            .get("entities")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| {
                MapError::PayloadShape(format!(
                    "expected a record with an 'entities' record, got {}",
                    json_kind(payload)
                ))
            })?;

        for name in entities.keys() {
            if !order.contains(&name.as_str()) {
                debug!("payload type '{}' not requested, skipping", name);
            }
        }

        let mut reports = Vec::new();
        for entity_type in order {
            let Some(data) = entities.get(*entity_type) else {
                debug!("no '{}' data in payload", entity_type);
                continue;
            };
            self.reset_mapper();
            reports.push(self.process_static_data(entity_type, data)?);
        }
        Ok(reports)
    }

    fn map_records(&mut self, entity_type: &str, records: &[&Record]) -> Result<BatchReport> {
        self.transition(ProcessorState::MappingRecords);
        let entity_type = EntityType::from(entity_type);
        let mut report = BatchReport::new(entity_type.clone());
        let mut mapper = EntityMapper::new(&mut self.store, &self.catalog, &self.config);
        let mut fatal = None;

        for (index, record) in records.iter().enumerate() {
            match mapper.apply_record(record, &entity_type, None, true, &mut self.cache) {
                Ok(handle) => report.mapped.push(handle),
                Err(err) if err.is_fatal() => {
                    event!(Level::ERROR, error = %err, index, "batch aborted");
                    fatal = Some(err);
                    break;
                }
                Err(err) => {
                    warn!("record {} of '{}' not mapped: {}", index, entity_type, err);
                    report.failures.push(RecordFailure {
                        index,
                        partial: mapper.last_root(),
                        error: err,
                    });
                }
            }
        }

        let stats = mapper.stats();
        report.skipped_fields = mapper.take_issues();
        report.deleted = stats.deleted;
        report.unlinked = stats.unlinked;

        self.transition(ProcessorState::Idle);
        if let Some(err) = fatal {
            return Err(err);
        }
        event!(
            Level::DEBUG,
            mapped = report.mapped.len(),
            failed = report.failures.len(),
            deleted = report.deleted,
            "batch mapped"
        );
        Ok(report)
    }

    fn transition(&mut self, next: ProcessorState) {
        event!(Level::TRACE, from = ?self.state, to = ?next, "processor state");
        self.state = next;
        #[cfg(test)]
        self.trail.push(next);
    }
}

fn validate_records<'p>(entity_type: &str, payload: &'p JsonValue) -> Result<Vec<&'p Record>> {
    let items = payload.as_array().ok_or_else(|| {
        MapError::PayloadShape(format!(
            "expected a sequence of '{}' records, got {}",
            entity_type,
            json_kind(payload)
        ))
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().ok_or_else(|| {
                MapError::PayloadShape(format!(
                    "element {} of '{}' payload is a {}, expected a record",
                    i,
                    entity_type,
                    json_kind(item)
                ))
            })
        })
        .collect()
}
