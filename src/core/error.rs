use super::types::EntityHandle;
use thiserror::Error;

/// Failures reported by a persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Entity {0} not found")]
    EntityNotFound(EntityHandle),

    #[error("Entity type '{0}' is not known to the store")]
    UnknownEntityType(String),

    #[error("Attribute '{0}' not found on entity type '{1}'")]
    UnknownAttribute(String, String),

    #[error("Relationship '{0}' not found on entity type '{1}'")]
    UnknownRelationship(String, String),

    #[error("Cardinality mismatch: {0}")]
    CardinalityMismatch(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Payload shape error: {0}")]
    PayloadShape(String),

    #[error("Schema mismatch for '{entity_type}': {reason}")]
    SchemaMismatch { entity_type: String, reason: String },

    #[error("Cannot coerce field '{field}' of '{entity_type}': {reason}")]
    TypeCoercion {
        entity_type: String,
        field: String,
        reason: String,
    },

    #[error("Schema definition error: {0}")]
    Definition(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl MapError {
    pub fn schema_mismatch(entity_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            entity_type: entity_type.into(),
            reason: reason.into(),
        }
    }

    /// Errors that end the whole batch rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PayloadShape(_) | Self::Storage(_))
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Definition(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
