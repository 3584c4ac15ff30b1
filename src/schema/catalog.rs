use super::entity::{AttributeDef, Cardinality, EntitySchema, RelationshipDescriptor};
use crate::core::{EntityType, MapError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// How an incoming field maps onto an entity type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind<'a> {
    Attribute(&'a AttributeDef),
    ToOne(&'a RelationshipDescriptor),
    ToMany(&'a RelationshipDescriptor),
    Unknown,
}

/// Registry of entity schemas.
///
/// Immutable once built; `with_entity` returns a new catalog so clones can be
/// handed to stores and processors without locking.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    entities: Arc<HashMap<EntityType, EntitySchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity schema, returning the extended catalog.
    pub fn with_entity(self, schema: EntitySchema) -> Result<Self> {
        let name = schema.name().clone();
        if self.entities.contains_key(&name) {
            return Err(MapError::Definition(format!(
                "Entity type '{}' already registered",
                name
            )));
        }

        let mut entities = (*self.entities).clone();
        entities.insert(name, schema);
        Ok(Self {
            entities: Arc::new(entities),
        })
    }

    pub fn entity(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.entities.get(entity_type)
    }

    pub fn require_entity(&self, entity_type: &str) -> Result<&EntitySchema> {
        self.entity(entity_type).ok_or_else(|| {
            MapError::schema_mismatch(entity_type, "entity type is not registered in the schema")
        })
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    pub fn relationship(&self, entity_type: &str, name: &str) -> Option<&RelationshipDescriptor> {
        self.entity(entity_type)?.get_relationship(name)
    }

    /// Attributes win over relationships when a name is declared as both.
    pub fn field_kind(&self, entity_type: &str, field: &str) -> FieldKind<'_> {
        let Some(schema) = self.entity(entity_type) else {
            return FieldKind::Unknown;
        };

        if let Some(attr) = schema.get_attribute(field) {
            return FieldKind::Attribute(attr);
        }

        match schema.get_relationship(field) {
            Some(rel) if rel.cardinality == Cardinality::ToMany => FieldKind::ToMany(rel),
            Some(rel) => FieldKind::ToOne(rel),
            None => FieldKind::Unknown,
        }
    }

    pub fn entity_types(&self) -> Vec<&EntityType> {
        let mut names: Vec<&EntityType> = self.entities.keys().collect();
        names.sort();
        names
    }

    /// Check that every relationship targets a registered type and that
    /// declared inverses exist and point back at the source.
    pub fn validate(&self) -> Result<()> {
        for name in self.entity_types() {
            let schema = &self.entities[name];
            for rel in schema.relationships() {
                let Some(target) = self.entity(rel.target.as_str()) else {
                    return Err(MapError::schema_mismatch(
                        name.as_str(),
                        format!(
                            "relationship '{}' targets unknown type '{}'",
                            rel.name, rel.target
                        ),
                    ));
                };

                let Some(inverse_name) = rel.inverse.as_deref() else {
                    continue;
                };
                match target.get_relationship(inverse_name) {
                    Some(inverse) if inverse.target == rel.source => {}
                    Some(inverse) => {
                        return Err(MapError::schema_mismatch(
                            name.as_str(),
                            format!(
                                "inverse '{}.{}' of '{}' points at '{}'",
                                rel.target, inverse_name, rel.name, inverse.target
                            ),
                        ));
                    }
                    None => {
                        return Err(MapError::schema_mismatch(
                            name.as_str(),
                            format!(
                                "inverse '{}.{}' of '{}' does not exist",
                                rel.target, inverse_name, rel.name
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
