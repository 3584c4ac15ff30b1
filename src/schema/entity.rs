use crate::core::{DataType, EntityType};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_UUID_FIELD: &str = "uuid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    pub data_type: DataType,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Edge between two entity types, as the schema declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub source: EntityType,
    pub target: EntityType,
    pub cardinality: Cardinality,
    /// Name of the relationship on `target` that points back at `source`.
    pub inverse: Option<String>,
}

impl RelationshipDescriptor {
    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }

    /// Whether `self` walks back along `parent`, i.e. from the entity that
    /// `parent` led to, back to the entity that owns `parent`.
    pub fn is_inverse_of(&self, parent: &RelationshipDescriptor) -> bool {
        if self.source != parent.target || self.target != parent.source {
            return false;
        }
        parent.inverse.as_deref() == Some(self.name.as_str())
            || self.inverse.as_deref() == Some(parent.name.as_str())
    }
}

/// Field layout of one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: EntityType,
    id_field: String,
    uuid_field: String,
    attributes: Vec<AttributeDef>,
    relationships: Vec<RelationshipDescriptor>,
}

impl EntitySchema {
    pub fn new(name: impl Into<EntityType>) -> Self {
        Self {
            name: name.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            uuid_field: DEFAULT_UUID_FIELD.to_string(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Override the payload fields carrying the primary id and uuid.
    pub fn identity_fields(mut self, id_field: &str, uuid_field: &str) -> Self {
        self.id_field = id_field.to_string();
        self.uuid_field = uuid_field.to_string();
        self
    }

    pub fn attribute(mut self, name: &str, data_type: DataType) -> Self {
        self.attributes.push(AttributeDef::new(name, data_type));
        self
    }

    pub fn to_one(self, name: &str, target: &str, inverse: Option<&str>) -> Self {
        self.relationship(name, target, Cardinality::ToOne, inverse)
    }

    pub fn to_many(self, name: &str, target: &str, inverse: Option<&str>) -> Self {
        self.relationship(name, target, Cardinality::ToMany, inverse)
    }

    pub fn relationship(
        mut self,
        name: &str,
        target: &str,
        cardinality: Cardinality,
        inverse: Option<&str>,
    ) -> Self {
        self.relationships.push(RelationshipDescriptor {
            name: name.to_string(),
            source: self.name.clone(),
            target: EntityType::from(target),
            cardinality,
            inverse: inverse.map(str::to_string),
        });
        self
    }

    pub fn name(&self) -> &EntityType {
        &self.name
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn uuid_field(&self) -> &str {
        &self.uuid_field
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn get_relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|rel| rel.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_detection() {
        let machine = EntitySchema::new("StateMachine").to_many(
            "transitions",
            "Transition",
            Some("machine"),
        );
        let transition =
            EntitySchema::new("Transition").to_one("machine", "StateMachine", Some("transitions"));

        let down = machine.get_relationship("transitions").unwrap();
        let up = transition.get_relationship("machine").unwrap();
        assert!(up.is_inverse_of(down));
        assert!(down.is_inverse_of(up));
        assert!(!down.is_inverse_of(down));
    }

    #[test]
    fn test_one_sided_inverse_declaration() {
        let parent = EntitySchema::new("Parent").to_one("child", "Child", None);
        let child = EntitySchema::new("Child").to_one("parent", "Parent", Some("child"));
        assert!(
            child
                .get_relationship("parent")
                .unwrap()
                .is_inverse_of(parent.get_relationship("child").unwrap())
        );
    }
}
