mod common;

use common::{find_by_id, processor, rel, text};
use memomap::{
    BatchProcessor, CoercionPolicy, EntityHandle, EntityMapper, EntityType, Identity,
    IdentityCache, InMemoryStore, MapError, MapperConfig, PersistenceStore, Value,
};
use serde_json::json;

fn seed_machine_with_transitions(
    processor: &mut BatchProcessor<InMemoryStore>,
) -> (EntityHandle, [EntityHandle; 3]) {
    let store = processor.store_mut();
    let machine = store
        .insert("DeviceStateMachine", vec![("id", Value::Integer(1))])
        .unwrap();
    let a = store
        .insert("DeviceTransition", vec![("id", Value::Integer(101))])
        .unwrap();
    let b = store
        .insert("DeviceTransition", vec![("id", Value::Integer(102))])
        .unwrap();
    let c = store
        .insert("DeviceTransition", vec![("id", Value::Integer(103))])
        .unwrap();
    store
        .set_to_many(machine, &rel("DeviceStateMachine", "transitions"), &[a, b, c])
        .unwrap();
    store.reset_stats();
    (machine, [a, b, c])
}

#[test]
fn test_same_record_twice_maps_to_one_entity() {
    let mut processor = processor(MapperConfig::default());
    let payload = json!([
        {"id": 1, "name": "Open", "disabled": false},
        {"id": 1, "name": "Open", "disabled": false}
    ]);

    let report = processor.process_data("DeviceState", &payload).unwrap();
    processor.process_data("DeviceState", &payload).unwrap();

    assert_eq!(report.mapped[0], report.mapped[1]);
    let store = processor.store();
    assert_eq!(store.count("DeviceState"), 1);
    assert_eq!(text(store, report.mapped[0], "name"), Value::Text("Open".into()));
    assert_eq!(text(store, report.mapped[0], "disabled"), Value::Boolean(false));
}

#[test]
fn test_later_values_overwrite_and_null_clears() {
    let mut processor = processor(MapperConfig::default());
    let report = processor
        .process_data(
            "DeviceState",
            &json!([
                {"id": 1, "name": "Open", "uuid": "s-1"},
                {"id": 1, "name": "Closed", "uuid": null}
            ]),
        )
        .unwrap();

    let store = processor.store();
    assert_eq!(text(store, report.mapped[0], "name"), Value::Text("Closed".into()));
    assert_eq!(text(store, report.mapped[0], "uuid"), Value::Null);
}

#[test]
fn test_duplicate_identities_share_one_handle() {
    let mut processor = processor(MapperConfig::default());
    let payload = json!([
        {"id": 1, "name": "Repair", "defaultInitialState": {"id": 7, "name": "New"}},
        {"id": 2, "name": "Install", "defaultInitialState": {"id": 7}},
        {"id": 1, "name": "Repair", "defaultInitialState": {"uuid": "s-7", "id": 7}}
    ]);

    let report = processor.process_data("DeviceStateMachine", &payload).unwrap();
    assert!(report.is_clean());

    let cache = processor.cache();
    assert_eq!(cache.handles_of("DeviceState").len(), 1);
    assert_eq!(cache.handles_of("DeviceStateMachine").len(), 2);

    let store = processor.store();
    assert_eq!(store.count("DeviceState"), 1);
    assert_eq!(store.count("DeviceStateMachine"), 2);

    let state = find_by_id(store, "DeviceState", 7).unwrap();
    let machines = store
        .linked_entities(state, &rel("DeviceState", "defaultInitialStateMachines"))
        .unwrap();
    assert_eq!(machines.len(), 2);
    assert_eq!(text(store, state, "name"), Value::Text("New".into()));
}

#[test]
fn test_missing_to_many_entries_are_deleted_when_configured() {
    let mut processor = processor(MapperConfig::new().delete_not_provided(true));
    let (machine, [a, b, c]) = seed_machine_with_transitions(&mut processor);

    let report = processor
        .process_data(
            "DeviceStateMachine",
            &json!([{"id": 1, "transitions": [{"id": 101}, {"id": 103}]}]),
        )
        .unwrap();

    assert_eq!(report.mapped, vec![machine]);
    assert_eq!(report.deleted, 1);
    let store = processor.store();
    assert!(!store.contains(b));
    assert_eq!(
        store
            .linked_entities(machine, &rel("DeviceStateMachine", "transitions"))
            .unwrap(),
        vec![a, c]
    );
    assert_eq!(store.stats().creates, 0);
}

#[test]
fn test_missing_to_many_entries_are_only_unlinked_by_default() {
    let mut processor = processor(MapperConfig::default());
    let (machine, [a, b, c]) = seed_machine_with_transitions(&mut processor);

    let report = processor
        .process_data(
            "DeviceStateMachine",
            &json!([{"id": 1, "transitions": [{"id": 101}, {"id": 103}]}]),
        )
        .unwrap();

    assert_eq!(report.deleted, 0);
    assert_eq!(report.unlinked, 1);
    let store = processor.store();
    assert!(store.contains(b));
    assert_eq!(
        store
            .related_entity(b, &rel("DeviceTransition", "stateMachine"))
            .unwrap(),
        None
    );
    assert_eq!(
        store
            .linked_entities(machine, &rel("DeviceStateMachine", "transitions"))
            .unwrap(),
        vec![a, c]
    );
}

#[test]
fn test_entity_linked_elsewhere_is_only_unlinked() {
    let mut processor = processor(MapperConfig::new().delete_not_provided(true));
    let store = processor.store_mut();
    let state = store
        .insert("DeviceState", vec![("id", Value::Integer(7))])
        .unwrap();
    let kept = store
        .insert("DeviceStateMachine", vec![("id", Value::Integer(1))])
        .unwrap();
    let shared = store
        .insert("DeviceStateMachine", vec![("id", Value::Integer(2))])
        .unwrap();
    let transition = store
        .insert("DeviceTransition", vec![("id", Value::Integer(50))])
        .unwrap();
    store
        .set_to_many(
            state,
            &rel("DeviceState", "defaultInitialStateMachines"),
            &[kept, shared],
        )
        .unwrap();
    store
        .set_to_one(transition, &rel("DeviceTransition", "stateMachine"), Some(shared))
        .unwrap();

    let report = processor
        .process_data(
            "DeviceState",
            &json!([{"id": 7, "defaultInitialStateMachines": [{"id": 1}]}]),
        )
        .unwrap();

    assert_eq!((report.deleted, report.unlinked), (0, 1));
    let store = processor.store();
    assert!(store.contains(shared));
    assert_eq!(
        store
            .related_entity(shared, &rel("DeviceStateMachine", "defaultInitialState"))
            .unwrap(),
        None
    );

    let report = processor
        .process_data(
            "DeviceState",
            &json!([{"id": 7, "defaultInitialStateMachines": []}]),
        )
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert!(!processor.store().contains(kept));
    assert!(processor.cache().get(&Identity::by_id("DeviceStateMachine", 1)).is_none());
}

#[test]
fn test_shrinking_list_within_one_batch_deletes_dropped_entry() {
    let mut processor = processor(MapperConfig::new().delete_not_provided(true));

    let report = processor
        .process_data(
            "DeviceStateMachine",
            &json!([
                {"id": 1, "transitions": [{"id": 101}, {"id": 102}, {"id": 103}]},
                {"id": 1, "transitions": [{"id": 101}, {"id": 103}]}
            ]),
        )
        .unwrap();

    assert_eq!((report.deleted, report.unlinked), (1, 0));
    let store = processor.store();
    assert_eq!(store.count("DeviceTransition"), 2);
    assert!(find_by_id(store, "DeviceTransition", 102).is_none());
    assert_eq!(
        store
            .linked_entities(report.mapped[0], &rel("DeviceStateMachine", "transitions"))
            .unwrap()
            .len(),
        2
    );

    // The deleted identity is no longer cached, so it comes back as a new entity.
    processor
        .process_data("DeviceTransition", &json!([{"id": 102}]))
        .unwrap();
    assert_eq!(processor.store().count("DeviceTransition"), 3);
}

#[test]
fn test_null_to_many_empties_relationship() {
    let mut processor = processor(MapperConfig::default());
    let (machine, _) = seed_machine_with_transitions(&mut processor);

    let report = processor
        .process_data("DeviceStateMachine", &json!([{"id": 1, "transitions": null}]))
        .unwrap();

    assert_eq!(report.unlinked, 3);
    assert!(
        processor
            .store()
            .linked_entities(machine, &rel("DeviceStateMachine", "transitions"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_inverse_cycle_terminates_without_duplicates() {
    let mut processor = processor(MapperConfig::new().to_many_depth(8));
    let payload = json!([{
        "id": 1,
        "name": "Repair",
        "transitions": [
            {"id": 10, "name": "start", "stateMachine": {"id": 1, "name": "Overwritten?"}},
            {"id": 11, "name": "stop", "stateMachine": {"id": 1}}
        ]
    }]);

    let report = processor.process_data("DeviceStateMachine", &payload).unwrap();

    let store = processor.store();
    assert_eq!(store.count("DeviceStateMachine"), 1);
    assert_eq!(store.count("DeviceTransition"), 2);
    let machine = report.mapped[0];
    assert_eq!(text(store, machine, "name"), Value::Text("Repair".into()));

    let transition = find_by_id(store, "DeviceTransition", 10).unwrap();
    assert_eq!(
        store
            .related_entity(transition, &rel("DeviceTransition", "stateMachine"))
            .unwrap(),
        Some(machine)
    );
}

#[test]
fn test_repeated_reference_reuses_cached_handle() {
    let mut processor = processor(MapperConfig::default());
    let payload = json!([{
        "id": 5,
        "name": "Closed",
        "source": {"id": 1, "name": "Open"},
        "target": {"id": 1}
    }]);

    processor.process_data("DeviceTransition", &payload).unwrap();

    let store = processor.store();
    assert_eq!(store.count("DeviceState"), 1);
    let transition = find_by_id(store, "DeviceTransition", 5).unwrap();
    let source = store
        .related_entity(transition, &rel("DeviceTransition", "source"))
        .unwrap();
    let target = store
        .related_entity(transition, &rel("DeviceTransition", "target"))
        .unwrap();
    assert!(source.is_some());
    assert_eq!(source, target);
}

#[test]
fn test_to_many_depth_limits_nested_processing() {
    let payload = json!([{
        "id": 1,
        "name": "ACME",
        "contracts": [{"id": 20, "name": "Support", "users": [{"userId": 300, "login": "amy"}]}]
    }]);

    let mut shallow = processor(MapperConfig::default());
    shallow.process_data("Organization", &payload).unwrap();
    assert_eq!(shallow.store().count("Contract"), 1);
    assert_eq!(shallow.store().count("User"), 0);

    let mut deep = processor(MapperConfig::new().to_many_depth(2));
    deep.process_data("Organization", &payload).unwrap();
    let store = deep.store();
    assert_eq!(store.count("User"), 1);
    let user = store.entities_of("User")[0];
    assert_eq!(text(store, user, "login"), Value::Text("amy".into()));
    let contract = find_by_id(store, "Contract", 20).unwrap();
    assert_eq!(
        store.related_entity(user, &rel("User", "contract")).unwrap(),
        Some(contract)
    );
}

#[test]
fn test_zero_to_many_depth_skips_root_to_many() {
    let mut processor = processor(MapperConfig::new().to_many_depth(0));

    let report = processor
        .process_data(
            "DeviceStateMachine",
            &json!([{"id": 1, "name": "Repair", "transitions": [{"id": 101}, {"id": 102}]}]),
        )
        .unwrap();

    let store = processor.store();
    assert_eq!(store.count("DeviceTransition"), 0);
    assert!(
        store
            .linked_entities(report.mapped[0], &rel("DeviceStateMachine", "transitions"))
            .unwrap()
            .is_empty()
    );
    assert_eq!(text(store, report.mapped[0], "name"), Value::Text("Repair".into()));
}

#[test]
fn test_to_one_null_clears_relationship() {
    let mut processor = processor(MapperConfig::default());
    processor
        .process_data("DeviceType", &json!([{"id": 1, "stateMachine": {"id": 9}}]))
        .unwrap();
    let report = processor
        .process_data("DeviceType", &json!([{"id": 1, "stateMachine": null}]))
        .unwrap();

    let store = processor.store();
    assert_eq!(
        store
            .related_entity(report.mapped[0], &rel("DeviceType", "stateMachine"))
            .unwrap(),
        None
    );
    assert_eq!(store.count("DeviceStateMachine"), 1);
}

#[test]
fn test_scalar_references_resolve_identity() {
    let mut processor = processor(MapperConfig::default());
    let existing = processor
        .store_mut()
        .insert("DeviceState", vec![("id", Value::Integer(1)), ("name", "Open".into())])
        .unwrap();

    processor
        .process_data(
            "DeviceTransition",
            &json!([{"id": 5, "source": 1, "target": "state-uuid-2"}]),
        )
        .unwrap();

    let store = processor.store();
    let transition = find_by_id(store, "DeviceTransition", 5).unwrap();
    assert_eq!(
        store
            .related_entity(transition, &rel("DeviceTransition", "source"))
            .unwrap(),
        Some(existing)
    );
    let target = store
        .related_entity(transition, &rel("DeviceTransition", "target"))
        .unwrap()
        .unwrap();
    assert_eq!(text(store, target, "uuid"), Value::Text("state-uuid-2".into()));
    assert_eq!(store.count("DeviceState"), 2);
}

#[test]
fn test_custom_identity_fields() {
    let mut processor = processor(MapperConfig::default());
    processor
        .process_data("User", &json!([{"userId": 3, "login": "a"}]))
        .unwrap();
    processor.reset_mapper();
    let report = processor
        .process_data("User", &json!([{"userId": 3, "login": "b"}]))
        .unwrap();

    let store = processor.store();
    assert_eq!(store.count("User"), 1);
    assert_eq!(text(store, report.mapped[0], "login"), Value::Text("b".into()));
}

#[test]
fn test_coercion_failure_skips_field_by_default() {
    let mut processor = processor(MapperConfig::default());
    let report = processor
        .process_data(
            "DeviceState",
            &json!([{"id": 1, "name": "Open", "created": "yesterday", "disabled": "no"}]),
        )
        .unwrap();

    assert_eq!(report.mapped.len(), 1);
    assert_eq!(report.skipped_fields.len(), 1);
    assert_eq!(report.skipped_fields[0].field, "created");

    let store = processor.store();
    assert_eq!(text(store, report.mapped[0], "name"), Value::Text("Open".into()));
    assert_eq!(text(store, report.mapped[0], "disabled"), Value::Boolean(false));
    assert_eq!(text(store, report.mapped[0], "created"), Value::Null);
}

#[test]
fn test_coercion_failure_aborts_record_when_configured() {
    let mut processor =
        processor(MapperConfig::new().coercion_policy(CoercionPolicy::AbortRecord));
    let report = processor
        .process_data(
            "DeviceState",
            &json!([
                {"id": 1, "created": "yesterday"},
                {"id": 2, "created": "2016-10-12T08:00:00Z"}
            ]),
        )
        .unwrap();

    assert_eq!(report.mapped.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);
    assert!(matches!(
        &report.failures[0].error,
        MapError::TypeCoercion { field, .. } if field == "created"
    ));
}

#[test]
fn test_non_record_relationship_value_is_coercion_issue() {
    let mut processor = processor(MapperConfig::default());
    let report = processor
        .process_data(
            "DeviceStateMachine",
            &json!([{"id": 1, "defaultInitialState": true, "transitions": {"id": 3}}]),
        )
        .unwrap();

    assert_eq!(report.mapped.len(), 1);
    let fields: Vec<&str> = report.skipped_fields.iter().map(|i| i.field.as_str()).collect();
    assert_eq!(fields, vec!["defaultInitialState", "transitions"]);
}

#[test]
fn test_entity_mapper_without_to_many() {
    let catalog = common::catalog();
    let config = MapperConfig::default();
    let mut store = InMemoryStore::new(catalog.clone());
    let mut cache = IdentityCache::new();
    let record = common::record(json!({
        "id": 1,
        "name": "Repair",
        "defaultInitialState": {"id": 2},
        "transitions": [{"id": 3}]
    }));

    let mut mapper = EntityMapper::new(&mut store, &catalog, &config);
    let handle = mapper
        .apply_record(
            &record,
            &EntityType::from("DeviceStateMachine"),
            None,
            false,
            &mut cache,
        )
        .unwrap();

    assert_eq!(store.count("DeviceTransition"), 0);
    assert_eq!(store.count("DeviceState"), 1);
    assert_eq!(text(&store, handle, "name"), Value::Text("Repair".into()));
    assert_eq!(cache.resolved_count(), 2);
}
