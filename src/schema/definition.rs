//! Serializable schema definitions.
//!
//! Lets a catalog be described in JSON instead of assembled with builder
//! calls:
//!
//! ```json
//! {"entities": [
//!   {"name": "DeviceType",
//!    "attributes": [{"name": "id", "type": "integer"}],
//!    "relationships": [
//!      {"name": "stateMachine", "target": "DeviceStateMachine",
//!       "cardinality": "to_one", "inverse": "deviceTypes"}]}
//! ]}
//! ```

use super::catalog::SchemaCatalog;
use super::entity::{Cardinality, DEFAULT_ID_FIELD, DEFAULT_UUID_FIELD, EntitySchema};
use crate::core::{DataType, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub entities: Vec<EntityDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_uuid_field")]
    pub uuid_field: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub inverse: Option<String>,
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

fn default_uuid_field() -> String {
    DEFAULT_UUID_FIELD.to_string()
}

impl EntityDefinition {
    fn to_schema(&self) -> EntitySchema {
        let mut schema = EntitySchema::new(self.name.as_str())
            .identity_fields(&self.id_field, &self.uuid_field);
        for attr in &self.attributes {
            schema = schema.attribute(&attr.name, attr.data_type);
        }
        for rel in &self.relationships {
            schema = schema.relationship(
                &rel.name,
                &rel.target,
                rel.cardinality,
                rel.inverse.as_deref(),
            );
        }
        schema
    }
}

impl SchemaCatalog {
    /// Build and validate a catalog from a definition.
    pub fn from_definition(definition: &SchemaDefinition) -> Result<Self> {
        let mut catalog = SchemaCatalog::new();
        for entity in &definition.entities {
            catalog = catalog.with_entity(entity.to_schema())?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let definition: SchemaDefinition = serde_json::from_str(json)?;
        Self::from_definition(&definition)
    }
}
