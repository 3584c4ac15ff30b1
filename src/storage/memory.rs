use super::PersistenceStore;
use crate::core::{EntityHandle, EntityType, StoreError, StoreResult, Value};
use crate::schema::{Cardinality, EntitySchema, RelationshipDescriptor, SchemaCatalog};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

/// Operation counters, mainly for asserting how often the mapper hit storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub lookups: u64,
    pub creates: u64,
    pub deletes: u64,
    pub attribute_writes: u64,
    pub relationship_writes: u64,
}

#[derive(Debug, Clone)]
struct StoredEntity {
    entity_type: EntityType,
    attributes: HashMap<String, Value>,
    to_one: HashMap<String, EntityHandle>,
    to_many: HashMap<String, Vec<EntityHandle>>,
}

impl StoredEntity {
    fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            attributes: HashMap::new(),
            to_one: HashMap::new(),
            to_many: HashMap::new(),
        }
    }

    fn attach(&mut self, name: &str, cardinality: Cardinality, target: EntityHandle) {
        match cardinality {
            Cardinality::ToOne => {
                self.to_one.insert(name.to_string(), target);
            }
            Cardinality::ToMany => {
                let targets = self.to_many.entry(name.to_string()).or_default();
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }

    fn detach(&mut self, name: &str, target: EntityHandle) {
        if self.to_one.get(name) == Some(&target) {
            self.to_one.remove(name);
        }
        if let Some(targets) = self.to_many.get_mut(name) {
            targets.retain(|h| *h != target);
        }
    }

    fn links_to(&self, target: EntityHandle) -> bool {
        self.to_one.values().any(|h| *h == target)
            || self.to_many.values().any(|targets| targets.contains(&target))
    }

    fn forget(&mut self, target: EntityHandle) {
        self.to_one.retain(|_, h| *h != target);
        for targets in self.to_many.values_mut() {
            targets.retain(|h| *h != target);
        }
    }
}

/// Schema-aware in-memory persistence store.
///
/// Keeps both sides of a relationship in step when the schema declares an
/// inverse, the way an object-graph store would.
pub struct InMemoryStore {
    catalog: SchemaCatalog,
    /// Ordered by handle, i.e. by creation
    entities: BTreeMap<EntityHandle, StoredEntity>,
    next_handle: u64,
    stats: StoreStats,
}

impl InMemoryStore {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            catalog,
            entities: BTreeMap::new(),
            next_handle: 1,
            stats: StoreStats::default(),
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = StoreStats::default();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.entities.contains_key(&handle)
    }

    /// Handles of all live entities of a type, in creation order.
    pub fn entities_of(&self, entity_type: &str) -> Vec<EntityHandle> {
        self.entities
            .iter()
            .filter(|(_, entity)| entity.entity_type.as_str() == entity_type)
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn count(&self, entity_type: &str) -> usize {
        self.entities
            .values()
            .filter(|entity| entity.entity_type.as_str() == entity_type)
            .count()
    }

    /// Create an entity and set the given attributes in one go.
    pub fn insert(
        &mut self,
        entity_type: &str,
        attributes: Vec<(&str, Value)>,
    ) -> StoreResult<EntityHandle> {
        let handle = self.create_entity(&EntityType::from(entity_type))?;
        for (name, value) in attributes {
            self.set_attribute(handle, name, value)?;
        }
        Ok(handle)
    }

    /// JSON dump of every live entity grouped by type.
    pub fn snapshot(&self) -> JsonValue {
        let mut by_type: BTreeMap<String, Vec<JsonValue>> = BTreeMap::new();
        for (handle, entity) in &self.entities {
            let mut object = Map::new();
            object.insert("handle".into(), JsonValue::from(handle.raw()));

            let mut attributes: Vec<_> = entity.attributes.iter().collect();
            attributes.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in attributes {
                object.insert(name.clone(), value.to_json());
            }

            let mut to_one: Vec<_> = entity.to_one.iter().collect();
            to_one.sort_by(|a, b| a.0.cmp(b.0));
            for (name, target) in to_one {
                object.insert(name.clone(), JsonValue::from(target.raw()));
            }

            let mut to_many: Vec<_> = entity.to_many.iter().collect();
            to_many.sort_by(|a, b| a.0.cmp(b.0));
            for (name, targets) in to_many {
                let raw: Vec<JsonValue> = targets.iter().map(|h| JsonValue::from(h.raw())).collect();
                object.insert(name.clone(), JsonValue::Array(raw));
            }

            by_type
                .entry(entity.entity_type.to_string())
                .or_default()
                .push(JsonValue::Object(object));
        }

        JsonValue::Object(
            by_type
                .into_iter()
                .map(|(name, entities)| (name, JsonValue::Array(entities)))
                .collect(),
        )
    }

    fn schema(&self, entity_type: &EntityType) -> StoreResult<&EntitySchema> {
        self.catalog
            .entity(entity_type.as_str())
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))
    }

    fn get(&self, handle: EntityHandle) -> StoreResult<&StoredEntity> {
        self.entities
            .get(&handle)
            .ok_or(StoreError::EntityNotFound(handle))
    }

    fn get_mut(&mut self, handle: EntityHandle) -> StoreResult<&mut StoredEntity> {
        self.entities
            .get_mut(&handle)
            .ok_or(StoreError::EntityNotFound(handle))
    }

    fn check_relationship(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        cardinality: Cardinality,
    ) -> StoreResult<()> {
        let entity = self.get(handle)?;
        if entity.entity_type != relationship.source {
            return Err(StoreError::UnknownRelationship(
                relationship.name.clone(),
                entity.entity_type.to_string(),
            ));
        }
        if relationship.cardinality != cardinality {
            return Err(StoreError::CardinalityMismatch(format!(
                "relationship '{}.{}' is {:?}",
                relationship.source, relationship.name, relationship.cardinality
            )));
        }
        Ok(())
    }

    fn check_target(
        &self,
        relationship: &RelationshipDescriptor,
        target: EntityHandle,
    ) -> StoreResult<()> {
        let entity = self.get(target)?;
        if entity.entity_type != relationship.target {
            return Err(StoreError::TypeMismatch(format!(
                "relationship '{}.{}' expects {}, got {} {}",
                relationship.source,
                relationship.name,
                relationship.target,
                entity.entity_type,
                target
            )));
        }
        Ok(())
    }

    fn inverse_of(&self, relationship: &RelationshipDescriptor) -> Option<RelationshipDescriptor> {
        let inverse = relationship.inverse.as_deref()?;
        self.catalog
            .relationship(relationship.target.as_str(), inverse)
            .cloned()
    }

    fn link(
        &mut self,
        owner: EntityHandle,
        relationship: &RelationshipDescriptor,
        target: EntityHandle,
    ) -> StoreResult<()> {
        let inverse = self.inverse_of(relationship);

        // A to-one inverse can only point at one owner: take the target away
        // from whoever held it before.
        if let Some(inverse) = &inverse {
            if inverse.cardinality == Cardinality::ToOne {
                let previous = self.get(target)?.to_one.get(&inverse.name).copied();
                if let Some(previous) = previous.filter(|p| *p != owner) {
                    self.get_mut(previous)?.detach(&relationship.name, target);
                }
            }
        }

        self.get_mut(owner)?
            .attach(&relationship.name, relationship.cardinality, target);
        if let Some(inverse) = inverse {
            self.get_mut(target)?
                .attach(&inverse.name, inverse.cardinality, owner);
        }
        Ok(())
    }

    fn unlink(
        &mut self,
        owner: EntityHandle,
        relationship: &RelationshipDescriptor,
        target: EntityHandle,
    ) -> StoreResult<()> {
        self.get_mut(owner)?.detach(&relationship.name, target);
        if let Some(inverse) = self.inverse_of(relationship) {
            if let Some(entity) = self.entities.get_mut(&target) {
                entity.detach(&inverse.name, owner);
            }
        }
        Ok(())
    }

    fn attribute_matches<F>(entity: &StoredEntity, field: &str, predicate: F) -> bool
    where
        F: Fn(&Value) -> bool,
    {
        entity.attributes.get(field).is_some_and(predicate)
    }
}

/// Primary ids may be declared as text; "12" and 12 name the same entity.
fn primary_id_of(value: &Value) -> Option<i64> {
    match value {
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

impl PersistenceStore for InMemoryStore {
    fn find_entity(
        &mut self,
        entity_type: &EntityType,
        primary_id: Option<i64>,
        uuid: Option<&str>,
    ) -> StoreResult<Option<EntityHandle>> {
        self.stats.lookups += 1;
        let schema = self.schema(entity_type)?;
        let candidates = || {
            self.entities
                .iter()
                .filter(move |(_, entity)| &entity.entity_type == entity_type)
        };

        if let Some(id) = primary_id {
            let found = candidates().find(|(_, entity)| {
                Self::attribute_matches(entity, schema.id_field(), |v| primary_id_of(v) == Some(id))
            });
            if let Some((handle, _)) = found {
                return Ok(Some(*handle));
            }
        }

        if let Some(uuid) = uuid {
            let found = candidates().find(|(_, entity)| {
                Self::attribute_matches(entity, schema.uuid_field(), |v| match v {
                    Value::Text(s) => s == uuid,
                    Value::Uuid(u) => u.to_string().eq_ignore_ascii_case(uuid),
                    _ => false,
                })
            });
            if let Some((handle, _)) = found {
                return Ok(Some(*handle));
            }
        }

        Ok(None)
    }

    fn create_entity(&mut self, entity_type: &EntityType) -> StoreResult<EntityHandle> {
        self.schema(entity_type)?;
        let handle = EntityHandle::new(self.next_handle);
        self.next_handle += 1;
        self.entities
            .insert(handle, StoredEntity::new(entity_type.clone()));
        self.stats.creates += 1;
        Ok(handle)
    }

    fn entity_type(&self, handle: EntityHandle) -> StoreResult<EntityType> {
        Ok(self.get(handle)?.entity_type.clone())
    }

    fn set_attribute(&mut self, handle: EntityHandle, name: &str, value: Value) -> StoreResult<()> {
        let entity_type = self.get(handle)?.entity_type.clone();
        let schema = self.schema(&entity_type)?;

        // Identity fields may be stored even when not declared as attributes.
        let is_identity = name == schema.id_field() || name == schema.uuid_field();
        match schema.get_attribute(name) {
            Some(attr) if !attr.data_type.is_compatible(&value) => {
                return Err(StoreError::TypeMismatch(format!(
                    "attribute '{}.{}' expects {}, got {}",
                    entity_type,
                    name,
                    attr.data_type,
                    value.type_name()
                )));
            }
            Some(_) => {}
            None if is_identity => {}
            None => {
                return Err(StoreError::UnknownAttribute(
                    name.to_string(),
                    entity_type.to_string(),
                ));
            }
        }

        self.get_mut(handle)?
            .attributes
            .insert(name.to_string(), value);
        self.stats.attribute_writes += 1;
        Ok(())
    }

    fn get_attribute(&self, handle: EntityHandle, name: &str) -> StoreResult<Value> {
        Ok(self
            .get(handle)?
            .attributes
            .get(name)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn related_entity(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Option<EntityHandle>> {
        self.check_relationship(handle, relationship, Cardinality::ToOne)?;
        Ok(self.get(handle)?.to_one.get(&relationship.name).copied())
    }

    fn linked_entities(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Vec<EntityHandle>> {
        self.check_relationship(handle, relationship, Cardinality::ToMany)?;
        Ok(self
            .get(handle)?
            .to_many
            .get(&relationship.name)
            .cloned()
            .unwrap_or_default())
    }

    fn set_to_one(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        target: Option<EntityHandle>,
    ) -> StoreResult<()> {
        self.check_relationship(handle, relationship, Cardinality::ToOne)?;
        let current = self.get(handle)?.to_one.get(&relationship.name).copied();
        if current == target {
            return Ok(());
        }

        if let Some(target) = target {
            self.check_target(relationship, target)?;
        }
        if let Some(current) = current {
            self.unlink(handle, relationship, current)?;
        }
        if let Some(target) = target {
            self.link(handle, relationship, target)?;
        }
        self.stats.relationship_writes += 1;
        Ok(())
    }

    fn set_to_many(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        targets: &[EntityHandle],
    ) -> StoreResult<()> {
        self.check_relationship(handle, relationship, Cardinality::ToMany)?;
        for target in targets {
            self.check_target(relationship, *target)?;
        }

        let current = self.linked_entities(handle, relationship)?;
        for removed in current.iter().filter(|h| !targets.contains(h)) {
            self.unlink(handle, relationship, *removed)?;
        }
        for added in targets.iter().filter(|h| !current.contains(h)) {
            self.link(handle, relationship, *added)?;
        }

        let mut ordered: Vec<EntityHandle> = Vec::with_capacity(targets.len());
        for target in targets {
            if !ordered.contains(target) {
                ordered.push(*target);
            }
        }
        self.get_mut(handle)?
            .to_many
            .insert(relationship.name.clone(), ordered);
        self.stats.relationship_writes += 1;
        Ok(())
    }

    fn has_references(&self, handle: EntityHandle) -> StoreResult<bool> {
        self.get(handle)?;
        Ok(self
            .entities
            .iter()
            .any(|(owner, entity)| *owner != handle && entity.links_to(handle)))
    }

    fn delete_entity(&mut self, handle: EntityHandle) -> StoreResult<()> {
        if self.entities.remove(&handle).is_none() {
            return Err(StoreError::EntityNotFound(handle));
        }
        for entity in self.entities.values_mut() {
            entity.forget(handle);
        }
        self.stats.deletes += 1;
        Ok(())
    }
}
