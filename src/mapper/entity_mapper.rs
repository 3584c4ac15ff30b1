use super::coercion::{ValueCoercer, json_kind, primary_id_from_json};
use super::config::{CoercionPolicy, MapperConfig};
use super::report::FieldIssue;
use crate::cache::IdentityCache;
use crate::core::{DataType, EntityHandle, EntityType, Identity, MapError, Record, Result};
use crate::schema::{AttributeDef, EntitySchema, FieldKind, RelationshipDescriptor, SchemaCatalog};
use crate::storage::PersistenceStore;
use log::{debug, trace, warn};
use serde_json::Value as JsonValue;

/// Counters collected while mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    pub deleted: usize,
    pub unlinked: usize,
}

/// Applies records to entities: resolves identity, writes attributes and
/// walks relationships recursively.
pub struct EntityMapper<'m, S: PersistenceStore + ?Sized> {
    store: &'m mut S,
    catalog: &'m SchemaCatalog,
    config: &'m MapperConfig,
    issues: Vec<FieldIssue>,
    stats: MappingStats,
    root: Option<EntityHandle>,
}

impl<'m, S: PersistenceStore + ?Sized> EntityMapper<'m, S> {
    pub fn new(store: &'m mut S, catalog: &'m SchemaCatalog, config: &'m MapperConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            issues: Vec::new(),
            stats: MappingStats::default(),
            root: None,
        }
    }

    /// Fields skipped so far; drains the list.
    pub fn take_issues(&mut self) -> Vec<FieldIssue> {
        std::mem::take(&mut self.issues)
    }

    pub fn stats(&self) -> MappingStats {
        self.stats
    }

    /// Root entity resolved by the latest `apply_record` call. Set as soon as
    /// identity is resolved, so it is available when the call later fails.
    pub fn last_root(&self) -> Option<EntityHandle> {
        self.root
    }

    /// Map `record` onto an entity of `entity_type` and return its handle.
    ///
    /// `parent` is the relationship that led here; its inverse is not walked.
    /// To-many fields are only processed when `process_to_many` is set and the
    /// record's level (the root is 1) is within `MapperConfig::to_many_depth`.
    pub fn apply_record(
        &mut self,
        record: &Record,
        entity_type: &EntityType,
        parent: Option<&RelationshipDescriptor>,
        process_to_many: bool,
        cache: &mut IdentityCache,
    ) -> Result<EntityHandle> {
        self.root = None;
        self.apply_at_depth(record, entity_type, parent, process_to_many, 1, cache)
    }

    fn apply_at_depth(
        &mut self,
        record: &Record,
        entity_type: &EntityType,
        parent: Option<&RelationshipDescriptor>,
        process_to_many: bool,
        depth: usize,
        cache: &mut IdentityCache,
    ) -> Result<EntityHandle> {
        let catalog = self.catalog;
        let schema = catalog.require_entity(entity_type.as_str())?;
        let identity = extract_identity(record, schema)?;
        let handle = cache.lookup_or_create(&mut *self.store, &identity)?;
        trace!("resolved {} to {}", identity, handle);
        if depth == 1 {
            self.root = Some(handle);
        }

        let to_many_here = process_to_many && depth <= self.config.to_many_depth;
        let nested_to_many = to_many_here && depth < self.config.to_many_depth;

        for (field, value) in record {
            match catalog.field_kind(entity_type.as_str(), field) {
                FieldKind::Attribute(attr) => self.apply_attribute(handle, entity_type, attr, value)?,
                FieldKind::ToOne(_) | FieldKind::ToMany(_) => {}
                FieldKind::Unknown => {
                    if field != schema.id_field() && field != schema.uuid_field() {
                        debug!("ignoring unknown field '{}.{}'", entity_type, field);
                    }
                }
            }
        }
        self.stamp_identity(handle, schema, &identity, Some(record))?;

        for (field, value) in record {
            if let FieldKind::ToOne(rel) = catalog.field_kind(entity_type.as_str(), field) {
                if parent.is_some_and(|p| rel.is_inverse_of(p)) {
                    trace!("skipping inverse '{}.{}'", entity_type, field);
                    continue;
                }
                self.apply_to_one(handle, rel, value, nested_to_many, depth, cache)?;
            }
        }

        if to_many_here {
            for (field, value) in record {
                if let FieldKind::ToMany(rel) = catalog.field_kind(entity_type.as_str(), field) {
                    if parent.is_some_and(|p| rel.is_inverse_of(p)) {
                        trace!("skipping inverse '{}.{}'", entity_type, field);
                        continue;
                    }
                    self.apply_to_many(handle, rel, value, nested_to_many, depth, cache)?;
                }
            }
        }

        Ok(handle)
    }

    fn apply_attribute(
        &mut self,
        handle: EntityHandle,
        entity_type: &EntityType,
        attr: &AttributeDef,
        value: &JsonValue,
    ) -> Result<()> {
        match ValueCoercer::coerce(value, attr.data_type) {
            Ok(coerced) => {
                self.store.set_attribute(handle, &attr.name, coerced)?;
                Ok(())
            }
            Err(err) => self.coercion_failed(entity_type, &attr.name, err.to_string()),
        }
    }

    /// Write identity keys the record's attribute pass did not cover, so the
    /// store can find the entity again later in the session.
    fn stamp_identity(
        &mut self,
        handle: EntityHandle,
        schema: &EntitySchema,
        identity: &Identity,
        record: Option<&Record>,
    ) -> Result<()> {
        let keys = [
            (
                schema.id_field(),
                identity.primary_id.map(JsonValue::from),
                DataType::Integer,
            ),
            (
                schema.uuid_field(),
                identity.uuid.clone().map(JsonValue::from),
                DataType::Text,
            ),
        ];

        for (field, key, fallback_type) in keys {
            let Some(key) = key else { continue };
            let declared = schema.get_attribute(field);
            if declared.is_some() && record.is_some_and(|r| r.contains_key(field)) {
                continue;
            }

            let data_type = declared.map_or(fallback_type, |attr| attr.data_type);
            match ValueCoercer::coerce(&key, data_type) {
                Ok(value) => self.store.set_attribute(handle, field, value)?,
                Err(err) => self.coercion_failed(schema.name(), field, err.to_string())?,
            }
        }
        Ok(())
    }

    fn apply_to_one(
        &mut self,
        handle: EntityHandle,
        rel: &RelationshipDescriptor,
        value: &JsonValue,
        process_to_many: bool,
        depth: usize,
        cache: &mut IdentityCache,
    ) -> Result<()> {
        let target = if value.is_null() {
            None
        } else {
            match self.resolve_related(rel, value, process_to_many, depth, cache)? {
                Some(target) => Some(target),
                None => return Ok(()),
            }
        };
        self.store.set_to_one(handle, rel, target)?;
        Ok(())
    }

    fn apply_to_many(
        &mut self,
        handle: EntityHandle,
        rel: &RelationshipDescriptor,
        value: &JsonValue,
        process_to_many: bool,
        depth: usize,
        cache: &mut IdentityCache,
    ) -> Result<()> {
        let elements: &[JsonValue] = match value {
            JsonValue::Array(items) => items,
            JsonValue::Null => &[],
            other => {
                return self.coercion_failed(
                    &rel.source,
                    &rel.name,
                    format!("expected a sequence of records, got {}", json_kind(other)),
                );
            }
        };

        let existing = self.store.linked_entities(handle, rel)?;

        let mut incoming = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(target) = self.resolve_related(rel, element, process_to_many, depth, cache)? {
                if !incoming.contains(&target) {
                    incoming.push(target);
                }
            }
        }
        self.store.set_to_many(handle, rel, &incoming)?;

        for stale in existing.into_iter().filter(|h| !incoming.contains(h)) {
            // Still linked from elsewhere in the graph, so only the link goes.
            if !self.config.delete_not_provided || self.store.has_references(stale)? {
                debug!("unlinked {} from '{}.{}'", stale, rel.source, rel.name);
                self.stats.unlinked += 1;
                continue;
            }
            debug!("deleting {} no longer provided in '{}.{}'", stale, rel.source, rel.name);
            self.store.delete_entity(stale)?;
            cache.evict(stale);
            self.stats.deleted += 1;
        }
        Ok(())
    }

    /// Resolve one relationship value: a nested record is mapped recursively,
    /// a bare number or string is read as the target's id or uuid.
    fn resolve_related(
        &mut self,
        rel: &RelationshipDescriptor,
        value: &JsonValue,
        process_to_many: bool,
        depth: usize,
        cache: &mut IdentityCache,
    ) -> Result<Option<EntityHandle>> {
        match value {
            JsonValue::Object(record) => self
                .apply_at_depth(record, &rel.target, Some(rel), process_to_many, depth + 1, cache)
                .map(Some),
            JsonValue::Number(_) | JsonValue::String(_) => {
                self.resolve_reference(rel, value, cache).map(Some)
            }
            other => {
                self.coercion_failed(
                    &rel.source,
                    &rel.name,
                    format!("expected a record or reference, got {}", json_kind(other)),
                )?;
                Ok(None)
            }
        }
    }

    fn resolve_reference(
        &mut self,
        rel: &RelationshipDescriptor,
        value: &JsonValue,
        cache: &mut IdentityCache,
    ) -> Result<EntityHandle> {
        let catalog = self.catalog;
        let schema = catalog.require_entity(rel.target.as_str())?;
        let identity = match (primary_id_from_json(value), value) {
            (Some(id), _) => Identity::new(rel.target.clone(), Some(id), None),
            (None, JsonValue::String(uuid)) if !uuid.is_empty() => {
                Identity::new(rel.target.clone(), None, Some(uuid.clone()))
            }
            _ => {
                return Err(MapError::schema_mismatch(
                    rel.target.as_str(),
                    format!("unusable reference {} in '{}.{}'", value, rel.source, rel.name),
                ));
            }
        };

        let handle = cache.lookup_or_create(&mut *self.store, &identity)?;
        self.stamp_identity(handle, schema, &identity, None)?;
        Ok(handle)
    }

    fn coercion_failed(&mut self, entity_type: &EntityType, field: &str, reason: String) -> Result<()> {
        match self.config.coercion_policy {
            CoercionPolicy::SkipField => {
                warn!("skipping field '{}.{}': {}", entity_type, field, reason);
                self.issues.push(FieldIssue {
                    entity_type: entity_type.clone(),
                    field: field.to_string(),
                    reason,
                });
                Ok(())
            }
            CoercionPolicy::AbortRecord => Err(MapError::TypeCoercion {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
                reason,
            }),
        }
    }
}

/// Pull the primary id and uuid out of a record using the type's identity
/// field names. Absent or null keys are fine; present but unusable ones are not.
pub fn extract_identity(record: &Record, schema: &EntitySchema) -> Result<Identity> {
    let primary_id = match record.get(schema.id_field()) {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(primary_id_from_json(value).ok_or_else(|| {
            MapError::schema_mismatch(
                schema.name().as_str(),
                format!("field '{}' is not a usable primary id: {}", schema.id_field(), value),
            )
        })?),
    };

    let uuid = match record.get(schema.uuid_field()) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) if s.is_empty() => None,
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(value) => {
            return Err(MapError::schema_mismatch(
                schema.name().as_str(),
                format!("field '{}' is not a usable uuid: {}", schema.uuid_field(), value),
            ));
        }
    };

    Ok(Identity::new(schema.name().clone(), primary_id, uuid))
}
