//! List item repository implementation.
//!
//! Covers items, their values (labels, notes, images), and image
//! metadata. Mutations that must hold together (sortorder allocation,
//! the preferred-label delete guard, bulk reorder/reparent) run inside
//! a single transaction; the `(list_id, sortorder)` uniqueness is
//! deferred, so reorders surface violations at commit.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use tessera_core::{
    new_v7, validate_sortorder, Error, ListItem, ListItemImageMetadata, ListItemRepository,
    ListItemValue, MetadataType, NewListItem, Result, UriConfig,
};

/// PostgreSQL implementation of ListItemRepository.
pub struct PgListItemRepository {
    pool: Pool<Postgres>,
    uri_config: UriConfig,
}

impl PgListItemRepository {
    /// Create a new PgListItemRepository with the given connection
    /// pool. URI generation settings are read from the environment.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_uri_config(pool, UriConfig::from_env())
    }

    /// Create a repository with explicit URI configuration.
    pub fn with_uri_config(pool: Pool<Postgres>, uri_config: UriConfig) -> Self {
        Self { pool, uri_config }
    }

    fn parse_item_row(row: sqlx::postgres::PgRow) -> ListItem {
        ListItem {
            id: row.get("id"),
            list_id: row.get("list_id"),
            uri: row.get("uri"),
            sortorder: row.get("sortorder"),
            parent_id: row.get("parent_id"),
            guide: row.get("guide"),
        }
    }

    fn parse_value_row(row: sqlx::postgres::PgRow) -> ListItemValue {
        let valuetype: String = row.get("valuetype");
        ListItemValue {
            id: row.get("id"),
            list_item_id: row.get("list_item_id"),
            valuetype: valuetype.parse().unwrap_or_default(),
            language_id: row.get("language_id"),
            value: row.get("value"),
        }
    }

    fn parse_metadata_row(row: sqlx::postgres::PgRow) -> ListItemImageMetadata {
        let metadata_type: String = row.get("metadata_type");
        ListItemImageMetadata {
            id: row.get("id"),
            list_item_image_id: row.get("list_item_image_id"),
            language_id: row.get("language_id"),
            metadata_type: metadata_type.parse().unwrap_or(MetadataType::Title),
            value: row.get("value"),
        }
    }
}

#[async_trait]
impl ListItemRepository for PgListItemRepository {
    async fn create(&self, item: NewListItem) -> Result<ListItem> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let stored = self.create_tx(&mut tx, item).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ListItem>> {
        let row = sqlx::query(
            "SELECT id, list_id, uri, sortorder, parent_id, guide
             FROM controlled_list_item
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_item_row))
    }

    async fn list_for_list(&self, list_id: Uuid) -> Result<Vec<ListItem>> {
        let rows = sqlx::query(
            "SELECT id, list_id, uri, sortorder, parent_id, guide
             FROM controlled_list_item
             WHERE list_id = $1
             ORDER BY sortorder",
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_item_row).collect())
    }

    async fn update(&self, mut item: ListItem) -> Result<ListItem> {
        if item.uri.is_empty() {
            item.uri = self.uri_config.item_uri(item.id);
        }
        item.validate()?;

        let result = sqlx::query(
            "UPDATE controlled_list_item
             SET list_id = $1, uri = $2, sortorder = $3, parent_id = $4, guide = $5
             WHERE id = $6",
        )
        .bind(item.list_id)
        .bind(&item.uri)
        .bind(item.sortorder)
        .bind(item.parent_id)
        .bind(item.guide)
        .bind(item.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ListItemNotFound(item.id));
        }
        Ok(item)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // Descendant items and values go via ON DELETE CASCADE.
        sqlx::query("DELETE FROM controlled_list_item WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn bulk_update_parentage_and_order(
        &self,
        list_id: Uuid,
        parent_map: &HashMap<Uuid, Option<Uuid>>,
        sortorder_map: &HashMap<Uuid, i32>,
    ) -> Result<u64> {
        if sortorder_map.is_empty() && parent_map.is_empty() {
            return Ok(0);
        }

        // The two maps may cover different items: an item can move to a
        // new parent without changing slot, or shift slot in place.
        let affected: std::collections::HashSet<Uuid> = parent_map
            .keys()
            .chain(sortorder_map.keys())
            .copied()
            .collect();

        let mut ids = Vec::with_capacity(affected.len());
        let mut set_sorts = Vec::with_capacity(affected.len());
        let mut sortorders = Vec::with_capacity(affected.len());
        let mut set_parents = Vec::with_capacity(affected.len());
        let mut parents = Vec::with_capacity(affected.len());
        for item_id in affected {
            ids.push(item_id);
            match sortorder_map.get(&item_id) {
                Some(&sortorder) => {
                    validate_sortorder(sortorder)?;
                    set_sorts.push(true);
                    sortorders.push(sortorder);
                }
                None => {
                    set_sorts.push(false);
                    sortorders.push(0);
                }
            }
            match parent_map.get(&item_id) {
                Some(&parent) => {
                    set_parents.push(true);
                    parents.push(parent);
                }
                None => {
                    set_parents.push(false);
                    parents.push(None);
                }
            }
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            r#"
            UPDATE controlled_list_item AS i
            SET sortorder = CASE WHEN u.set_sort THEN u.sortorder ELSE i.sortorder END,
                parent_id = CASE WHEN u.set_parent THEN u.parent_id ELSE i.parent_id END,
                list_id = $1
            FROM unnest($2::uuid[], $3::boolean[], $4::integer[], $5::boolean[], $6::uuid[])
                 AS u(id, set_sort, sortorder, set_parent, parent_id)
            WHERE i.id = u.id
            "#,
        )
        .bind(list_id)
        .bind(&ids)
        .bind(&set_sorts)
        .bind(&sortorders)
        .bind(&set_parents)
        .bind(&parents)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Deferred (list_id, sortorder) uniqueness is checked here.
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            list_id = %list_id,
            updated = result.rows_affected(),
            reparented = parent_map.len(),
            "items: bulk parentage/order update"
        );

        Ok(result.rows_affected())
    }

    async fn add_value(&self, value: ListItemValue) -> Result<ListItemValue> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let stored = self.add_value_tx(&mut tx, value).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn get_value(&self, id: Uuid) -> Result<Option<ListItemValue>> {
        let row = sqlx::query(
            "SELECT id, list_item_id, valuetype, language_id, value
             FROM controlled_list_item_value
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_value_row))
    }

    async fn values_for_item(&self, list_item_id: Uuid) -> Result<Vec<ListItemValue>> {
        let rows = sqlx::query(
            "SELECT id, list_item_id, valuetype, language_id, value
             FROM controlled_list_item_value
             WHERE list_item_id = $1
             ORDER BY id",
        )
        .bind(list_item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_value_row).collect())
    }

    async fn update_value(&self, mut value: ListItemValue) -> Result<ListItemValue> {
        value.clean();
        value.validate()?;

        let result = sqlx::query(
            "UPDATE controlled_list_item_value
             SET list_item_id = $1, valuetype = $2, language_id = $3, value = $4
             WHERE id = $5",
        )
        .bind(value.list_item_id)
        .bind(value.valuetype.to_string())
        .bind(&value.language_id)
        .bind(&value.value)
        .bind(value.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "list item value {} not found",
                value.id
            )));
        }
        Ok(value)
    }

    async fn delete_value(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        match self.delete_value_tx(&mut tx, id).await {
            Ok(()) => {
                tx.commit().await.map_err(Error::Database)?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await.map_err(Error::Database)?;
                Err(e)
            }
        }
    }

    async fn add_image_metadata(
        &self,
        image_id: Uuid,
        language_id: &str,
        metadata_type: MetadataType,
        value: &str,
    ) -> Result<Uuid> {
        let id = new_v7();

        sqlx::query(
            "INSERT INTO controlled_list_item_image_metadata
                 (id, list_item_image_id, language_id, metadata_type, value)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(image_id)
        .bind(language_id)
        .bind(metadata_type.to_string())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn image_metadata(&self, image_id: Uuid) -> Result<Vec<ListItemImageMetadata>> {
        let rows = sqlx::query(
            "SELECT id, list_item_image_id, language_id, metadata_type, value
             FROM controlled_list_item_image_metadata
             WHERE list_item_image_id = $1
             ORDER BY id",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_metadata_row).collect())
    }

    async fn delete_image_metadata(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM controlled_list_item_image_metadata WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

/// Transaction-aware variants for callers composing larger mutations
/// (list imports, batched edits) in one transaction.
impl PgListItemRepository {
    /// Insert a new item within an existing transaction.
    ///
    /// Fills the id, the sortorder (next free slot in the list), and
    /// the URI when the caller left them unset. With a deferred
    /// uniqueness constraint, sortorder collisions surface at the
    /// caller's commit.
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut item: NewListItem,
    ) -> Result<ListItem> {
        let id = item.ensure_id();

        let sortorder = match item.sortorder {
            Some(s) => s,
            None => sqlx::query_scalar::<_, i32>(
                "SELECT COALESCE(MAX(sortorder) + 1, 0)
                 FROM controlled_list_item
                 WHERE list_id = $1",
            )
            .bind(item.list_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?,
        };

        let uri = if item.uri.is_empty() {
            item.generate_uri(&self.uri_config)?
        } else {
            item.uri.clone()
        };

        let stored = ListItem {
            id,
            list_id: item.list_id,
            uri,
            sortorder,
            parent_id: item.parent_id,
            guide: item.guide,
        };
        stored.validate()?;

        sqlx::query(
            "INSERT INTO controlled_list_item (id, list_id, uri, sortorder, parent_id, guide)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(stored.id)
        .bind(stored.list_id)
        .bind(&stored.uri)
        .bind(stored.sortorder)
        .bind(stored.parent_id)
        .bind(stored.guide)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(stored)
    }

    /// Attach a value to an item within an existing transaction.
    pub async fn add_value_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut value: ListItemValue,
    ) -> Result<ListItemValue> {
        value.clean();
        value.validate()?;

        sqlx::query(
            "INSERT INTO controlled_list_item_value
                 (id, list_item_id, valuetype, language_id, value)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(value.id)
        .bind(value.list_item_id)
        .bind(value.valuetype.to_string())
        .bind(&value.language_id)
        .bind(&value.value)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(value)
    }

    /// Delete a value row within an existing transaction.
    ///
    /// Checks that the owning item keeps at least one preferred label
    /// after the deletion. On [`Error::MissingPrefLabel`] the deletion
    /// has already been issued; the caller must roll the transaction
    /// back to undo it.
    pub async fn delete_value_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        let row = sqlx::query("SELECT list_item_id FROM controlled_list_item_value WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let list_item_id: Uuid = match row {
            Some(row) => row.get("list_item_id"),
            None => {
                return Err(Error::NotFound(format!(
                    "list item value {} not found",
                    id
                )))
            }
        };

        sqlx::query("DELETE FROM controlled_list_item_value WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        // The guard runs for every value kind, not only labels: it is
        // the item's remaining state that matters.
        let has_pref_label: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM controlled_list_item_value
                 WHERE list_item_id = $1 AND valuetype = 'prefLabel'
             )",
        )
        .bind(list_item_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if !has_pref_label {
            return Err(Error::MissingPrefLabel(list_item_id));
        }

        Ok(())
    }
}
