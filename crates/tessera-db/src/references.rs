//! Reference resolution repository implementation.
//!
//! Bridges the pure tile value contracts in tessera-core to stored
//! lists: free-text and identifier resolution into canonical
//! references, and validation with node configuration lookup.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use tessera_core::{
    reference, Error, ListItem, NodeConfig, Reference, ReferenceLabel, ReferenceRepository,
    Result, TileInput, ValidationIssue,
};

/// PostgreSQL implementation of ReferenceRepository.
pub struct PgReferenceRepository {
    pool: Pool<Postgres>,
}

impl PgReferenceRepository {
    /// Create a new PgReferenceRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceRepository for PgReferenceRepository {
    async fn lookup_listitem_from_label(
        &self,
        label: &str,
        list_id: Uuid,
    ) -> Result<Option<ListItem>> {
        // Matches any value row (any kind, any language). Ties between
        // items resolve to the lowest sortorder.
        let row = sqlx::query(
            r#"
            SELECT i.id, i.list_id, i.uri, i.sortorder, i.parent_id, i.guide
            FROM controlled_list_item i
            WHERE i.list_id = $1
              AND EXISTS (
                  SELECT 1 FROM controlled_list_item_value v
                  WHERE v.list_item_id = i.id AND v.value = $2
              )
            ORDER BY i.sortorder
            LIMIT 1
            "#,
        )
        .bind(list_id)
        .bind(label)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| ListItem {
            id: r.get("id"),
            list_id: r.get("list_id"),
            uri: r.get("uri"),
            sortorder: r.get("sortorder"),
            parent_id: r.get("parent_id"),
            guide: r.get("guide"),
        }))
    }

    async fn build_tile_value(&self, item_id: Uuid) -> Result<Option<Reference>> {
        let item = sqlx::query("SELECT list_id, uri FROM controlled_list_item WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let (list_id, uri): (Uuid, String) = match item {
            Some(row) => (row.get("list_id"), row.get("uri")),
            None => return Ok(None),
        };

        let labels = sqlx::query(
            "SELECT id, list_item_id, valuetype, language_id, value
             FROM controlled_list_item_value
             WHERE list_item_id = $1
               AND valuetype IN ('prefLabel', 'altLabel', 'hiddenLabel')
             ORDER BY id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(|r| ReferenceLabel {
            id: r.get("id"),
            value: r.get("value"),
            // Labels always carry a language; only image rows may not.
            language_id: r
                .get::<Option<String>, _>("language_id")
                .unwrap_or_default(),
            valuetype_id: r.get("valuetype"),
            list_item_id: r.get("list_item_id"),
        })
        .collect();

        Ok(Some(Reference {
            uri,
            list_id,
            labels,
        }))
    }

    async fn transform_value_for_tile(
        &self,
        value: Option<&JsonValue>,
        config: &NodeConfig,
    ) -> Result<Option<JsonValue>> {
        let value = match value {
            None | Some(JsonValue::Null) => return Ok(None),
            Some(v) => v,
        };
        let inputs = match TileInput::classify_promoted(value) {
            Some(inputs) => inputs,
            None => return Ok(None),
        };

        let mut references: Vec<JsonValue> = Vec::with_capacity(inputs.len());
        for input in inputs {
            match input {
                TileInput::Label(text) => {
                    match self
                        .lookup_listitem_from_label(&text, config.controlled_list)
                        .await?
                    {
                        Some(item) => {
                            if let Some(reference) = self.build_tile_value(item.id).await? {
                                references.push(serde_json::to_value(&reference)?);
                            }
                        }
                        None => {
                            debug!(
                                list_id = %config.controlled_list,
                                label = %text,
                                "references: label did not resolve, dropping"
                            );
                        }
                    }
                }
                TileInput::ItemId(id) => match self.build_tile_value(id).await? {
                    Some(reference) => references.push(serde_json::to_value(&reference)?),
                    None => {
                        debug!(item_id = %id, "references: item id did not resolve, dropping");
                    }
                },
                TileInput::Stored(stored) => references.push(stored),
                TileInput::Many(nested) => {
                    // One level of nesting is flattened by
                    // classify_promoted; deeper arrays are malformed.
                    debug!(count = nested.len(), "references: nested collection dropped");
                }
            }
        }

        if references.is_empty() {
            return Ok(None);
        }
        Ok(Some(JsonValue::Array(references)))
    }

    async fn validate(
        &self,
        value: Option<&JsonValue>,
        node: Option<&NodeConfig>,
        node_id: Option<Uuid>,
    ) -> Result<Vec<ValidationIssue>> {
        let resolved: Option<NodeConfig> = match (node, node_id) {
            (Some(config), _) => Some(*config),
            (None, Some(node_id)) => Some(
                self.node_config(node_id)
                    .await?
                    .ok_or(Error::NodeNotFound(node_id))?,
            ),
            (None, None) => None,
        };

        reference::validate_value(value, resolved.as_ref())
    }

    async fn node_config(&self, node_id: Uuid) -> Result<Option<NodeConfig>> {
        let row = sqlx::query("SELECT config FROM node WHERE id = $1")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => {
                let config: Option<JsonValue> = row.get("config");
                let config = config.unwrap_or(JsonValue::Null);
                Ok(Some(NodeConfig::from_config(&config)?))
            }
            None => Ok(None),
        }
    }
}
