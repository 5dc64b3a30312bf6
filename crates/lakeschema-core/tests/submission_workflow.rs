//! End-to-end submission workflow over a persisted registry.

use lakeschema_core::adapter;
use lakeschema_core::canonical::{CanonicalSchema, DatasetIdentity, SourceFormat};
use lakeschema_core::pipeline::{self, PipelineError};
use lakeschema_core::policy::{DriftPolicy, EnforcementAction, PolicyError};
use lakeschema_core::registry::SchemaRegistry;
use lakeschema_core::storage::StoreLocation;

use serde_json::{json, Value};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn identity() -> DatasetIdentity {
    DatasetIdentity {
        domain: "sales".into(),
        environment: "prod".into(),
        zone: "curated".into(),
        layer: "raw".into(),
        entity: "orders".into(),
        dataset_name: None,
    }
}

fn schema_from(records: &[Value]) -> CanonicalSchema {
    let table = adapter::build_table("orders", records).expect("build table");
    CanonicalSchema::new(SourceFormat::Json, identity(), vec![table])
}

async fn open_registry(path: &std::path::Path) -> SchemaRegistry {
    SchemaRegistry::open(StoreLocation::local(path))
        .await
        .expect("open registry")
}

#[tokio::test]
async fn full_lifecycle_with_reopened_registry() -> TestResult {
    let tmp = TempDir::new()?;
    let registry_path = tmp.path().join("registry.json");

    let base = vec![
        json!({"id": "1", "email": "a@example.com"}),
        json!({"id": "2", "email": "b@example.com"}),
    ];

    // First submission registers v1.
    {
        let mut registry = open_registry(&registry_path).await;
        let mut schema = schema_from(&base);
        let outcomes = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Strict).await?;
        assert_eq!(outcomes[0].action, EnforcementAction::RegisteredEntity);
        assert_eq!(outcomes[0].active_version.to_string(), "v1");
    }

    // Identical resubmission through a fresh handle is a no-op.
    {
        let mut registry = open_registry(&registry_path).await;
        let mut schema = schema_from(&base);
        let outcomes = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Strict).await?;
        assert_eq!(outcomes[0].action, EnforcementAction::NoChange);
        assert_eq!(outcomes[0].active_version.to_string(), "v1");
    }

    // Adding an optional column folds into v1.
    let widened = vec![
        json!({"id": "1", "email": "a@example.com", "total": "10.50"}),
        json!({"id": "2", "email": "b@example.com", "total": null}),
    ];
    {
        let mut registry = open_registry(&registry_path).await;
        let mut schema = schema_from(&widened);
        let outcomes = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Strict).await?;
        assert_eq!(outcomes[0].action, EnforcementAction::UpdatedCurrentVersion);
        assert_eq!(outcomes[0].active_version.to_string(), "v1");

        let record = registry.current_record("sales_orders_raw")?;
        assert_eq!(record.schema.len(), 3);
        assert!(record
            .change_summary
            .iter()
            .any(|entry| entry.contains("ADD_NULLABLE_COLUMN total")));
    }

    // Removing a column is breaking: STRICT rejects, registry untouched.
    let narrowed = vec![json!({"id": "1", "total": "10.50"})];
    {
        let mut registry = open_registry(&registry_path).await;
        let mut schema = schema_from(&narrowed);
        let err = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Strict)
            .await
            .expect_err("expected STRICT rejection");
        assert!(matches!(
            err,
            PipelineError::Policy {
                source: PolicyError::BreakingRejected { .. }
            }
        ));
        assert_eq!(
            registry
                .current_record("sales_orders_raw")?
                .version
                .to_string(),
            "v1"
        );
    }

    // The same change under AUTO forks v2.
    {
        let mut registry = open_registry(&registry_path).await;
        let mut schema = schema_from(&narrowed);
        let outcomes = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Auto).await?;
        assert_eq!(outcomes[0].action, EnforcementAction::RegisteredVersion);
        assert_eq!(outcomes[0].active_version.to_string(), "v2");

        let record = registry.current_record("sales_orders_raw")?;
        assert!(record.breaking_change);
        assert_eq!(record.table_name, "sales_orders_raw_v2");
    }

    // v2 survives another reopen; v1 history is intact.
    {
        let registry = open_registry(&registry_path).await;
        let entry = registry.get_entity("sales_orders_raw").expect("entity");
        assert_eq!(entry.current_version.to_string(), "v2");
        assert_eq!(entry.versions.len(), 2);
    }

    Ok(())
}

#[tokio::test]
async fn nested_records_survive_projection_and_registration() -> TestResult {
    let tmp = TempDir::new()?;
    let registry_path = tmp.path().join("registry.json");

    let records = vec![json!({
        "id": "1",
        "customer": {"name": "Ada", "address": {"city": "Oslo"}},
        "items": [{"sku": "A1", "qty": "2"}]
    })];

    let mut registry = open_registry(&registry_path).await;
    let mut schema = schema_from(&records);
    let outcomes = pipeline::submit(&mut schema, &mut registry, DriftPolicy::Strict).await?;
    assert_eq!(outcomes[0].action, EnforcementAction::RegisteredEntity);

    let record = registry.current_record("sales_orders_raw")?;
    let customer = record
        .schema
        .iter()
        .find(|column| column.name == "customer")
        .expect("customer column");
    assert_eq!(customer.fields.len(), 2);

    let items = record
        .schema
        .iter()
        .find(|column| column.name == "items")
        .expect("items column");
    assert_eq!(items.mode.as_str(), "REPEATED");
    Ok(())
}
