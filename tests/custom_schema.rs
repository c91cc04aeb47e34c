use std::sync::Arc;

use plugseed::{
    run_forward_migration, EntityType, FieldDef, ForwardOutcome, InMemoryRecordStore, OnDelete,
    Registry, Schema, SeedGroup, SeedSet, Shape, Upserter, Value,
};
use serde_json::json;

fn registry() -> Registry {
    let team = EntityType::new("org", "Team")
        .keyed_by("slug")
        .field(FieldDef::string("slug").pattern(r"^[a-z-]+$"));
    let service = EntityType::new("org", "Service")
        .keyed_by("name")
        .field(FieldDef::string("name"))
        .field(FieldDef::reference("owner", "org.Team").on_delete(OnDelete::Restrict))
        .field(FieldDef::multi_reference("watchers", "org.Team"));
    let check = EntityType::new("org", "HealthCheck")
        .field(FieldDef::reference("service", "org.Service"))
        .field(FieldDef::int("interval").default_value(json!(60)))
        .field(
            FieldDef::reference("escalate_to", "org.Team")
                .nullable()
                .on_delete(OnDelete::SetNull),
        );

    Registry::new(
        Schema::new([team, service, check]).unwrap(),
        Arc::new(InMemoryRecordStore::new()),
    )
}

fn seed() -> SeedSet {
    let service = Shape::from_json(json!({
        "name": "billing",
        "owner": {"slug": "payments"},
        "watchers": ["sre"],
    }))
    .unwrap();
    let check = Shape::from_json(json!({
        "service": "billing",
        "interval": 30,
        "escalate_to": {"slug": "sre"},
    }))
    .unwrap();

    SeedSet::new("org.Service", "name", service)
        .with_dependents(SeedGroup::new("org.HealthCheck", vec![check]))
}

#[test]
fn json_seed_with_nested_and_multi_references() {
    let registry = registry();
    let teams = registry.entity("org.Team").unwrap();
    let sre = teams
        .create([("slug".to_string(), Value::from("sre"))].into())
        .unwrap();

    let outcome = run_forward_migration(&registry, &seed()).unwrap();
    assert_eq!(outcome, ForwardOutcome::Applied { created: 2, existing: 0 });

    // "payments" was created from the nested shape; "sre" was reused.
    assert_eq!(teams.count().unwrap(), 2);
    let service = registry.entity("org.Service").unwrap().all().unwrap().remove(0);
    assert_eq!(service.linked("watchers"), &[sre.id]);

    let check = registry.entity("org.HealthCheck").unwrap().all().unwrap().remove(0);
    assert_eq!(check.get("service"), &Value::Ref(service.id));
    assert_eq!(check.get("escalate_to"), &Value::Ref(sre.id));
    assert_eq!(check.get("interval"), &Value::Int(30));

    assert_eq!(run_forward_migration(&registry, &seed()).unwrap(), ForwardOutcome::Skipped);
    assert_eq!(teams.count().unwrap(), 2);
}

#[test]
fn missing_watcher_fails_after_the_primary_is_written() {
    let registry = registry();
    let err = run_forward_migration(&registry, &seed()).unwrap_err();
    assert!(err.is_not_found());
    // The service row exists without its watchers; a rerun skips it.
    assert_eq!(registry.entity("org.Service").unwrap().count().unwrap(), 1);
    assert_eq!(registry.entity("org.HealthCheck").unwrap().count().unwrap(), 0);
}

#[test]
fn repeated_upserts_of_the_same_nested_shape_create_one_row() {
    let registry = registry();
    let upserter = Upserter::new(&registry);
    let shape = Shape::new()
        .with("name", "search")
        .with("owner", Shape::new().with("slug", "discovery"));

    let (first, existed) = upserter.upsert_into("org.Service", shape.clone()).unwrap();
    assert!(!existed);
    for _ in 0..3 {
        let (again, existed) = upserter.upsert_into("org.Service", shape.clone()).unwrap();
        assert!(existed);
        assert_eq!(again.id, first.id);
    }
    assert_eq!(registry.entity("org.Team").unwrap().count().unwrap(), 1);
    assert_eq!(registry.entity("org.Service").unwrap().count().unwrap(), 1);
}

#[test]
fn fingerprint_tracks_seed_content() {
    let a = seed().fingerprint().unwrap();
    let mut edited = seed();
    edited.dependents[0].shapes[0].set("interval", 45);
    assert_ne!(a, edited.fingerprint().unwrap());
    assert_eq!(a, seed().fingerprint().unwrap());
}
