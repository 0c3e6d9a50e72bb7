//! End-to-end workflow over a live database: vocabulary curation,
//! tile value resolution, validation, and the read path.

use serde_json::json;
use uuid::Uuid;

use tessera_db::test_fixtures::{TestDataBuilder, TestDatabase};
use tessera_db::{
    reference, ExportOptions, ListRepository, NodeConfig, ReferenceRepository, ValueType,
};

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_label_to_tile_roundtrip() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Concrete")
        .await
        .with_value(ValueType::AltLabel, "en", "Cement")
        .await
        .with_node("material", "Built Heritage")
        .await
        .build()
        .await;
    let item_id = data.items[0];

    // A curator types free text into the field; it resolves to the
    // canonical stored array.
    let config = db
        .references
        .node_config(data.nodes[0])
        .await
        .expect("fetch node config")
        .expect("node registered by the builder");
    let stored = db
        .references
        .transform_value_for_tile(Some(&json!("Cement")), &config)
        .await
        .expect("transform")
        .expect("label resolves");

    // The stored value validates cleanly against the same node.
    let issues = db
        .references
        .validate(Some(&stored), None, Some(data.nodes[0]))
        .await
        .expect("validate");
    assert!(issues.is_empty(), "unexpected issues: {:?}", issues);

    // Read path: display text and projection both come from the
    // snapshot, no further queries.
    assert_eq!(reference::display_value(Some(&stored), "en"), "Concrete");
    let projections = reference::to_representation(Some(&stored), "en")
        .expect("project")
        .expect("stored value present");
    assert_eq!(projections.len(), 1);
    assert_eq!(projections[0].list_item_id, item_id);
    assert_eq!(projections[0].display_value, "Concrete");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_curation_to_export_workflow() {
    dotenvy::dotenv().ok();
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Stone Types")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Igneous")
        .await
        .with_child_item()
        .await
        .with_pref_label("en", "Granite")
        .await
        .with_pref_label("de", "Granit")
        .await
        .build()
        .await;

    // Renaming a label is visible to a subsequent lookup.
    let granite = db
        .references
        .lookup_listitem_from_label("Granit", data.lists[0])
        .await
        .expect("lookup")
        .expect("German label resolves");
    assert_eq!(granite.id, data.items[1]);

    let export = db
        .lists
        .export(data.lists[0], &ExportOptions::default())
        .await
        .expect("export");
    assert_eq!(export.name, "Stone Types");
    assert_eq!(export.items.len(), 1);
    let child = &export.items[0].children.as_ref().expect("tree mode")[0];
    assert_eq!(child.values.len(), 2, "both language labels exported");

    // A node pointing at a different list must not see this one.
    let unrelated = NodeConfig {
        controlled_list: Uuid::new_v4(),
        multi_value: false,
    };
    let transformed = db
        .references
        .transform_value_for_tile(Some(&json!("Granite")), &unrelated)
        .await
        .expect("transform");
    assert!(transformed.is_none());

    test_db.cleanup().await;
}
