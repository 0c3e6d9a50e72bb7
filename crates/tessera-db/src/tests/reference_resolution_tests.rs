//! Tests for reference resolution against stored lists.
//!
//! Covers: label lookup and its sortorder tie-break, canonical tile
//! value assembly, the tile transform over mixed input, validation with
//! fetched node configuration, and node config parsing from live rows.

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::test_fixtures::{seed_minimal_list, TestDataBuilder, TestDatabase};
use crate::{Error, ListItemRepository, NodeConfig, ReferenceRepository, ValueType};

fn config_for(list_id: Uuid) -> NodeConfig {
    NodeConfig {
        controlled_list: list_id,
        multi_value: false,
    }
}

// =============================================================================
// Label lookup tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_lookup_finds_item_by_pref_label() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;

    let found = db
        .references
        .lookup_listitem_from_label("Concrete", data.lists[0])
        .await
        .expect("lookup")
        .expect("label should resolve");

    assert_eq!(found.id, data.items[0]);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_lookup_matches_any_value_kind() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Wall")
        .await
        .with_value(ValueType::AltLabel, "en", "Barrier")
        .await
        .build()
        .await;

    let found = db
        .references
        .lookup_listitem_from_label("Barrier", data.lists[0])
        .await
        .unwrap();
    assert_eq!(found.map(|i| i.id), Some(data.items[0]));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_lookup_tie_resolves_to_lowest_sortorder() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    // Both items carry "Shared"; the match kind does not matter, only
    // the item's position in the list.
    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_item()
        .await
        .with_pref_label("en", "First")
        .await
        .with_value(ValueType::AltLabel, "en", "Shared")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Shared")
        .await
        .build()
        .await;

    let found = db
        .references
        .lookup_listitem_from_label("Shared", data.lists[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, data.items[0]);
    assert_eq!(found.sortorder, 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_lookup_scoped_to_list() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Concrete")
        .await
        .with_list("Period")
        .await
        .build()
        .await;

    let found = db
        .references
        .lookup_listitem_from_label("Concrete", data.lists[1])
        .await
        .unwrap();
    assert!(found.is_none(), "label lives in the other list");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_lookup_returns_none_without_match() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;

    let found = db
        .references
        .lookup_listitem_from_label("Adobe", data.lists[0])
        .await
        .unwrap();
    assert!(found.is_none());

    test_db.cleanup().await;
}

// =============================================================================
// Tile value assembly tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_build_tile_value_materializes_label_categories() {
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
        .with_value(ValueType::HiddenLabel, "en", "Conckrete")
        .await
        .with_value(ValueType::ScopeNote, "en", "Mixture of cement and aggregate")
        .await
        .build()
        .await;
    let item_id = data.items[0];

    let reference = db
        .references
        .build_tile_value(item_id)
        .await
        .expect("build")
        .expect("item should exist");

    let item = db.items.get(item_id).await.unwrap().unwrap();
    assert_eq!(reference.uri, item.uri);
    assert_eq!(reference.list_id, data.lists[0]);

    // Labels carry prefLabel, altLabel, and hiddenLabel; notes stay out.
    assert_eq!(reference.labels.len(), 3);
    assert!(reference
        .labels
        .iter()
        .all(|l| l.list_item_id == item_id && l.language_id == "en"));
    assert!(reference
        .labels
        .iter()
        .any(|l| l.valuetype_id == "prefLabel" && l.value == "Concrete"));
    assert!(!reference
        .labels
        .iter()
        .any(|l| l.valuetype_id == "scopeNote"));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_build_tile_value_unknown_item_is_none() {
    let test_db = TestDatabase::new().await;

    let built = test_db
        .db
        .references
        .build_tile_value(Uuid::new_v4())
        .await
        .unwrap();
    assert!(built.is_none());

    test_db.cleanup().await;
}

// =============================================================================
// Tile transform tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_null_stays_null() {
    let test_db = TestDatabase::new().await;
    let data = seed_minimal_list(&test_db.db).await;
    let config = config_for(data.lists[0]);
    let references = &test_db.db.references;

    assert!(references
        .transform_value_for_tile(None, &config)
        .await
        .unwrap()
        .is_none());
    assert!(references
        .transform_value_for_tile(Some(&JsonValue::Null), &config)
        .await
        .unwrap()
        .is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_resolves_label_text() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let value = json!("Concrete");
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .expect("transform")
        .expect("label should resolve");

    let entries = transformed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let item = db.items.get(data.items[0]).await.unwrap().unwrap();
    assert_eq!(entries[0]["uri"], json!(item.uri));
    assert_eq!(entries[0]["list_id"], json!(data.lists[0].to_string()));
    assert!(!entries[0]["labels"].as_array().unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_resolves_item_id_string() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let value = json!(data.items[1].to_string());
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .unwrap()
        .expect("item id should resolve");

    let entries = transformed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0]["labels"][0]["list_item_id"],
        json!(data.items[1].to_string())
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_resolves_projection_shape() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    // The read projection points back at the item it came from.
    let value = json!({
        "list_item_id": data.items[0].to_string(),
        "display_value": "Concrete",
    });
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .unwrap()
        .expect("projection should resolve");

    let entries = transformed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0]["labels"][0]["list_item_id"],
        json!(data.items[0].to_string())
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_drops_unresolvable_entries() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let value = json!("Adobe");
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .unwrap();
    assert!(transformed.is_none(), "nothing resolved, nothing stored");

    let value = json!(["Concrete", "Adobe"]);
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .unwrap()
        .expect("one entry resolves");
    assert_eq!(transformed.as_array().unwrap().len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_transform_passes_stored_reference_unchanged() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let stored = db
        .references
        .build_tile_value(data.items[0])
        .await
        .unwrap()
        .unwrap();
    let stored_json = serde_json::to_value(&stored).unwrap();

    let value = json!([stored_json.clone()]);
    let transformed = db
        .references
        .transform_value_for_tile(Some(&value), &config)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(transformed.as_array().unwrap()[0], stored_json);

    test_db.cleanup().await;
}

// =============================================================================
// Validation tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_validate_with_inline_config() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let reference = db
        .references
        .build_tile_value(data.items[0])
        .await
        .unwrap()
        .unwrap();
    let value = json!([serde_json::to_value(&reference).unwrap()]);

    let issues = db
        .references
        .validate(Some(&value), Some(&config), None)
        .await
        .expect("validate");
    assert!(issues.is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_validate_fetches_node_config_for_multiplicity() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Concrete")
        .await
        .with_item()
        .await
        .with_pref_label("en", "Wood")
        .await
        .with_node("material", "Built Heritage")
        .await
        .build()
        .await;

    let first = db
        .references
        .build_tile_value(data.items[0])
        .await
        .unwrap()
        .unwrap();
    let second = db
        .references
        .build_tile_value(data.items[1])
        .await
        .unwrap()
        .unwrap();
    let value = json!([
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap(),
    ]);

    // The node registered by the builder is single-valued.
    let issues = db
        .references
        .validate(Some(&value), None, Some(data.nodes[0]))
        .await
        .expect("validate");
    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0].message,
        "This node does not allow multiple references."
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_validate_unknown_node_id_is_error() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;

    let reference = db
        .references
        .build_tile_value(data.items[0])
        .await
        .unwrap()
        .unwrap();
    let value = json!([serde_json::to_value(&reference).unwrap()]);

    let missing = Uuid::new_v4();
    let err = db
        .references
        .validate(Some(&value), None, Some(missing))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NodeNotFound(id) if id == missing));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_validate_without_config_is_usage_error() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;

    let reference = db
        .references
        .build_tile_value(data.items[0])
        .await
        .unwrap()
        .unwrap();
    let value = json!([serde_json::to_value(&reference).unwrap()]);

    let err = db
        .references
        .validate(Some(&value), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_validate_maps_bad_value_to_issues() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = seed_minimal_list(db).await;
    let config = config_for(data.lists[0]);

    let value = json!(42);
    let issues = db
        .references
        .validate(Some(&value), Some(&config), None)
        .await
        .expect("validate");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "ERROR");
    assert_eq!(
        issues[0].message,
        "Reference value must be a list of reference objects"
    );

    test_db.cleanup().await;
}

// =============================================================================
// Node config tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_node_config_roundtrip() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let data = TestDataBuilder::new(db)
        .with_list("Material")
        .await
        .with_node("material", "Built Heritage")
        .await
        .build()
        .await;

    let config = db
        .references
        .node_config(data.nodes[0])
        .await
        .expect("fetch config")
        .expect("node should exist");
    assert_eq!(config.controlled_list, data.lists[0]);
    assert!(!config.multi_value);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_node_config_unknown_node_is_none() {
    let test_db = TestDatabase::new().await;

    let config = test_db
        .db
        .references
        .node_config(Uuid::new_v4())
        .await
        .unwrap();
    assert!(config.is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with running PostgreSQL
async fn test_node_config_rejects_malformed_config() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let graph_id = Uuid::new_v4();
    sqlx::query("INSERT INTO graph (id, name) VALUES ($1, 'Broken Graph')")
        .bind(graph_id)
        .execute(&db.pool)
        .await
        .unwrap();
    let node_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO node (id, name, datatype, nodegroup_id, graph_id, config)
         VALUES ($1, 'broken', 'reference', $2, $3, $4)",
    )
    .bind(node_id)
    .bind(Uuid::new_v4())
    .bind(graph_id)
    .bind(json!({}))
    .execute(&db.pool)
    .await
    .unwrap();

    let err = db.references.node_config(node_id).await.unwrap_err();
    assert!(matches!(err, Error::GraphValidation(_)));

    test_db.cleanup().await;
}
