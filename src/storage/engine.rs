use crate::core::{EntityHandle, EntityType, StoreResult, Value};
use crate::schema::RelationshipDescriptor;

/// Persistence collaborator consumed by the mapper.
///
/// Implementations own the entities; the mapper only holds handles for the
/// duration of a session and never commits.
pub trait PersistenceStore {
    /// Look an entity up by primary id, falling back to uuid.
    fn find_entity(
        &mut self,
        entity_type: &EntityType,
        primary_id: Option<i64>,
        uuid: Option<&str>,
    ) -> StoreResult<Option<EntityHandle>>;

    /// Allocate a new, uncommitted entity.
    fn create_entity(&mut self, entity_type: &EntityType) -> StoreResult<EntityHandle>;

    fn entity_type(&self, handle: EntityHandle) -> StoreResult<EntityType>;

    fn set_attribute(&mut self, handle: EntityHandle, name: &str, value: Value) -> StoreResult<()>;

    fn get_attribute(&self, handle: EntityHandle, name: &str) -> StoreResult<Value>;

    /// Current target of a to-one relationship.
    fn related_entity(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Option<EntityHandle>>;

    /// Current targets of a to-many relationship.
    fn linked_entities(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Vec<EntityHandle>>;

    fn set_to_one(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        target: Option<EntityHandle>,
    ) -> StoreResult<()>;

    /// Replace the whole target set of a to-many relationship.
    fn set_to_many(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        targets: &[EntityHandle],
    ) -> StoreResult<()>;

    /// Whether any other entity still links to `handle` through a
    /// relationship.
    fn has_references(&self, handle: EntityHandle) -> StoreResult<bool>;

    fn delete_entity(&mut self, handle: EntityHandle) -> StoreResult<()>;
}

impl<S: PersistenceStore + ?Sized> PersistenceStore for &mut S {
    fn find_entity(
        &mut self,
        entity_type: &EntityType,
        primary_id: Option<i64>,
        uuid: Option<&str>,
    ) -> StoreResult<Option<EntityHandle>> {
        (**self).find_entity(entity_type, primary_id, uuid)
    }

    fn create_entity(&mut self, entity_type: &EntityType) -> StoreResult<EntityHandle> {
        (**self).create_entity(entity_type)
    }

    fn entity_type(&self, handle: EntityHandle) -> StoreResult<EntityType> {
        (**self).entity_type(handle)
    }

    fn set_attribute(&mut self, handle: EntityHandle, name: &str, value: Value) -> StoreResult<()> {
        (**self).set_attribute(handle, name, value)
    }

    fn get_attribute(&self, handle: EntityHandle, name: &str) -> StoreResult<Value> {
        (**self).get_attribute(handle, name)
    }

    fn related_entity(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Option<EntityHandle>> {
        (**self).related_entity(handle, relationship)
    }

    fn linked_entities(
        &self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
    ) -> StoreResult<Vec<EntityHandle>> {
        (**self).linked_entities(handle, relationship)
    }

    fn set_to_one(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        target: Option<EntityHandle>,
    ) -> StoreResult<()> {
        (**self).set_to_one(handle, relationship, target)
    }

    fn set_to_many(
        &mut self,
        handle: EntityHandle,
        relationship: &RelationshipDescriptor,
        targets: &[EntityHandle],
    ) -> StoreResult<()> {
        (**self).set_to_many(handle, relationship, targets)
    }

    fn has_references(&self, handle: EntityHandle) -> StoreResult<bool> {
        (**self).has_references(handle)
    }

    fn delete_entity(&mut self, handle: EntityHandle) -> StoreResult<()> {
        (**self).delete_entity(handle)
    }
}
