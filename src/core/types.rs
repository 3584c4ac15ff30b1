use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Tag naming an entity type registered in the schema catalog.
///
/// Backed by `Arc<str>` so the tag can be cloned freely into cache keys
/// and relationship descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Opaque, non-owning reference to an entity held by a persistence store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(u64);

impl EntityHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of an incoming record: its type plus whichever of the primary id
/// and uuid the payload carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub entity_type: EntityType,
    pub primary_id: Option<i64>,
    pub uuid: Option<String>,
}

impl Identity {
    pub fn new(entity_type: EntityType, primary_id: Option<i64>, uuid: Option<String>) -> Self {
        Self {
            entity_type,
            primary_id,
            uuid,
        }
    }

    pub fn by_id(entity_type: impl Into<EntityType>, primary_id: i64) -> Self {
        Self::new(entity_type.into(), Some(primary_id), None)
    }

    pub fn by_uuid(entity_type: impl Into<EntityType>, uuid: impl Into<String>) -> Self {
        Self::new(entity_type.into(), None, Some(uuid.into()))
    }

    /// True when neither key is present and the record can only create.
    pub fn is_anonymous(&self) -> bool {
        self.primary_id.is_none() && self.uuid.is_none()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.entity_type)?;
        match (&self.primary_id, &self.uuid) {
            (Some(id), Some(uuid)) => write!(f, "id={}, uuid={}", id, uuid)?,
            (Some(id), None) => write!(f, "id={}", id)?,
            (None, Some(uuid)) => write!(f, "uuid={}", uuid)?,
            (None, None) => write!(f, "new")?,
        }
        write!(f, ")")
    }
}
