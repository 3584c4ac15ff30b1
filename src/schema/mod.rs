//! Schema collaborator: entity field layouts and relationship metadata.

pub mod catalog;
pub mod definition;
pub mod entity;

pub use catalog::{FieldKind, SchemaCatalog};
pub use definition::{
    AttributeDefinition, EntityDefinition, RelationshipDefinition, SchemaDefinition,
};
pub use entity::{AttributeDef, Cardinality, EntitySchema, RelationshipDescriptor};
