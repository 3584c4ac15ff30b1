#![allow(dead_code)]

use memomap::{
    BatchProcessor, DataType, EntityHandle, EntitySchema, InMemoryStore, MapperConfig,
    PersistenceStore, Record, RelationshipDescriptor, SchemaCatalog, Value,
};
use serde_json::Value as JsonValue;

/// Device workflow schema: state machines own transitions, transitions point
/// at states, organizations own contracts which own users.
pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with_entity(
            EntitySchema::new("DeviceStateMachine")
                .attribute("id", DataType::Integer)
                .attribute("name", DataType::Text)
                .to_one(
                    "defaultInitialState",
                    "DeviceState",
                    Some("defaultInitialStateMachines"),
                )
                .to_many("transitions", "DeviceTransition", Some("stateMachine"))
                .to_many("deviceTypes", "DeviceType", Some("stateMachine")),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("DeviceState")
                .attribute("id", DataType::Integer)
                .attribute("uuid", DataType::Text)
                .attribute("name", DataType::Text)
                .attribute("disabled", DataType::Boolean)
                .attribute("created", DataType::Timestamp)
                .to_many(
                    "defaultInitialStateMachines",
                    "DeviceStateMachine",
                    Some("defaultInitialState"),
                ),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("DeviceTransition")
                .attribute("id", DataType::Integer)
                .attribute("name", DataType::Text)
                .to_one("stateMachine", "DeviceStateMachine", Some("transitions"))
                .to_one("source", "DeviceState", None)
                .to_one("target", "DeviceState", None),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("DeviceType")
                .attribute("id", DataType::Integer)
                .attribute("name", DataType::Text)
                .to_one("stateMachine", "DeviceStateMachine", Some("deviceTypes")),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("Organization")
                .attribute("id", DataType::Integer)
                .attribute("name", DataType::Text)
                .to_many("contracts", "Contract", Some("organization")),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("Contract")
                .attribute("id", DataType::Integer)
                .attribute("name", DataType::Text)
                .to_one("organization", "Organization", Some("contracts"))
                .to_many("users", "User", Some("contract")),
        )
        .unwrap()
        .with_entity(
            EntitySchema::new("User")
                .identity_fields("userId", "userUuid")
                .attribute("userId", DataType::Integer)
                .attribute("login", DataType::Text)
                .to_one("contract", "Contract", Some("users")),
        )
        .unwrap()
}

pub fn processor(config: MapperConfig) -> BatchProcessor<InMemoryStore> {
    let catalog = catalog();
    let store = InMemoryStore::new(catalog.clone());
    let mut processor = BatchProcessor::new(store, catalog, config);
    processor.reset_mapper();
    processor
}

pub fn record(value: JsonValue) -> Record {
    value.as_object().cloned().expect("test record must be an object")
}

pub fn rel(entity_type: &str, name: &str) -> RelationshipDescriptor {
    catalog()
        .relationship(entity_type, name)
        .cloned()
        .expect("relationship must exist in test schema")
}

/// First live entity of `entity_type` whose `id` attribute equals `id`.
pub fn find_by_id(store: &InMemoryStore, entity_type: &str, id: i64) -> Option<EntityHandle> {
    store
        .entities_of(entity_type)
        .into_iter()
        .find(|h| store.get_attribute(*h, "id").unwrap() == Value::Integer(id))
}

pub fn text(store: &InMemoryStore, handle: EntityHandle, name: &str) -> Value {
    store.get_attribute(handle, name).unwrap()
}
