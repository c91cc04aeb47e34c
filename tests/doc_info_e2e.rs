use std::sync::Arc;

use plugseed::plugins::{self, doc_info};
use plugseed::{
    run_forward_migration, run_reverse_migration, Fields, ForwardOutcome, InMemoryRecordStore,
    Migration, NotFoundError, Registry, SeedError, Shape, Upserter, Value,
};

fn registry() -> Registry {
    Registry::new(
        plugins::schema().unwrap(),
        Arc::new(InMemoryRecordStore::new()),
    )
}

fn count(registry: &Registry, label: &str) -> usize {
    registry.entity(label).unwrap().count().unwrap()
}

fn by_name(name: &str) -> Fields {
    let mut filter = Fields::new();
    filter.insert("name".to_string(), Value::from(name));
    filter
}

#[test]
fn forward_seeds_cross_linked_records_once() {
    let registry = registry();
    let seed = doc_info::seed_set().unwrap();

    let outcome = run_forward_migration(&registry, &seed).unwrap();
    assert_eq!(outcome, ForwardOutcome::Applied { created: 3, existing: 0 });

    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PARAMETER), 1);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PYTHON_MODULE), 1);

    let module = registry
        .entity(plugins::PYTHON_MODULE)
        .unwrap()
        .all()
        .unwrap()
        .remove(0);
    let analyzer = registry
        .entity(plugins::ANALYZER_CONFIG)
        .unwrap()
        .get(&by_name(doc_info::NAME))
        .unwrap();
    let parameter = registry
        .entity(plugins::PARAMETER)
        .unwrap()
        .get(&by_name("additional_passwords_to_check"))
        .unwrap();
    let value = registry
        .entity(plugins::PLUGIN_CONFIG)
        .unwrap()
        .all()
        .unwrap()
        .remove(0);

    assert_eq!(analyzer.get("python_module"), &Value::Ref(module.id));
    assert_eq!(parameter.get("python_module"), &Value::Ref(module.id));
    assert_eq!(value.get("parameter"), &Value::Ref(parameter.id));
    assert_eq!(value.get("analyzer_config"), &Value::Ref(analyzer.id));
    assert_eq!(value.get("value"), &Value::List(vec![Value::from("")]));
    assert!(value.get("owner").is_null());

    // Declared defaults and seeded values both land on the record.
    assert_eq!(analyzer.get("soft_time_limit"), &Value::Int(30));
    assert_eq!(analyzer.get("routing_key"), &Value::from("local"));
    assert!(analyzer.linked("disabled_in_organizations").is_empty());

    assert_eq!(
        run_forward_migration(&registry, &seed).unwrap(),
        ForwardOutcome::Skipped
    );
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PARAMETER), 1);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PYTHON_MODULE), 1);
}

#[test]
fn existing_primary_skips_all_dependents() {
    let registry = registry();
    let seed = doc_info::seed_set().unwrap();

    let module = Shape::new()
        .with("module", "doc_info.DocInfo")
        .with("base_path", "api_app.analyzers_manager.file_analyzers");
    Upserter::new(&registry)
        .upsert_into(
            plugins::ANALYZER_CONFIG,
            Shape::new()
                .with("name", doc_info::NAME)
                .with("python_module", module)
                .with("type", "file"),
        )
        .unwrap();

    assert_eq!(
        run_forward_migration(&registry, &seed).unwrap(),
        ForwardOutcome::Skipped
    );
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PARAMETER), 0);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 0);
}

#[test]
fn partial_application_is_not_repaired_by_a_rerun() {
    let registry = registry();
    let seed = doc_info::seed_set().unwrap();

    // Simulate a crash after the primary record was written.
    Upserter::new(&registry)
        .upsert_into(plugins::ANALYZER_CONFIG, seed.primary.clone())
        .unwrap();

    assert_eq!(
        run_forward_migration(&registry, &seed).unwrap(),
        ForwardOutcome::Skipped
    );
    assert_eq!(count(&registry, plugins::PARAMETER), 0);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 0);
}

#[test]
fn reverse_deletes_primary_then_fails_when_absent() {
    let registry = registry();
    let seed = doc_info::seed_set().unwrap();
    run_forward_migration(&registry, &seed).unwrap();

    // The analyzer and its plugin value go; the parameter and module stay.
    assert_eq!(run_reverse_migration(&registry, &seed).unwrap(), 2);
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 0);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 0);
    assert_eq!(count(&registry, plugins::PARAMETER), 1);
    assert_eq!(count(&registry, plugins::PYTHON_MODULE), 1);

    let err = run_reverse_migration(&registry, &seed).unwrap_err();
    assert!(matches!(err, SeedError::NotFound(NotFoundError::Record { .. })));
}

#[test]
fn reapplying_after_reverse_reuses_surviving_dependents() {
    let registry = registry();
    let seed = doc_info::seed_set().unwrap();
    run_forward_migration(&registry, &seed).unwrap();
    run_reverse_migration(&registry, &seed).unwrap();

    assert_eq!(
        run_forward_migration(&registry, &seed).unwrap(),
        ForwardOutcome::Applied { created: 2, existing: 1 }
    );
    assert_eq!(count(&registry, plugins::PARAMETER), 1);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 1);
}

#[test]
fn migration_trait_drives_both_directions() {
    let registry = registry();
    let migration = doc_info::migration().unwrap();
    assert!(!migration.atomic());

    migration.forward(&registry).unwrap();
    migration.forward(&registry).unwrap();
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 1);

    migration.backward(&registry).unwrap();
    assert!(migration.backward(&registry).unwrap_err().is_not_found());
}

#[test]
fn dangling_identity_key_aborts_with_not_found() {
    let registry = registry();
    let mut seed = doc_info::seed_set().unwrap();
    if let Some(shape) = seed.dependents[1].shapes.first_mut() {
        shape.set("analyzer_config", "Nonexistent_Analyzer");
    }

    let err = run_forward_migration(&registry, &seed).unwrap_err();
    assert!(matches!(err, SeedError::NotFound(NotFoundError::Reference { .. })));
    // Non-atomic: the primary record and parameter stay behind.
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 1);
    assert_eq!(count(&registry, plugins::PARAMETER), 1);
    assert_eq!(count(&registry, plugins::PLUGIN_CONFIG), 0);
}

#[test]
fn invalid_seed_value_aborts_with_validation_error() {
    let registry = registry();
    let mut seed = doc_info::seed_set().unwrap();
    seed.primary.set("maximum_tlp", "PURPLE");

    let err = run_forward_migration(&registry, &seed).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(count(&registry, plugins::ANALYZER_CONFIG), 0);
}
