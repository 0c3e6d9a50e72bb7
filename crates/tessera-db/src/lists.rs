//! Controlled list repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tessera_core::{
    serialize_list, Error, ExportOptions, List, ListExport, ListItem, ListItemImageMetadata,
    ListItemValue, ListRepository, MetadataType, ReferencingNode, Result,
};

use crate::escape_like;

/// PostgreSQL implementation of ListRepository.
pub struct PgListRepository {
    pool: Pool<Postgres>,
}

impl PgListRepository {
    /// Create a new PgListRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Find lists whose name contains the given text (case-insensitive).
    pub async fn find_by_name(&self, pattern: &str) -> Result<Vec<List>> {
        let needle = format!("%{}%", escape_like(pattern));
        let rows = sqlx::query(
            "SELECT id, name, dynamic, search_only
             FROM controlled_list
             WHERE name ILIKE $1
             ORDER BY name",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_list_row).collect())
    }

    fn parse_list_row(row: sqlx::postgres::PgRow) -> List {
        List {
            id: row.get("id"),
            name: row.get("name"),
            dynamic: row.get("dynamic"),
            search_only: row.get("search_only"),
        }
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
impl ListRepository for PgListRepository {
    async fn create(&self, name: &str, dynamic: bool, search_only: bool) -> Result<List> {
        let mut list = List::new(name);
        list.dynamic = dynamic;
        list.search_only = search_only;
        list.clean();
        list.validate()?;

        sqlx::query(
            "INSERT INTO controlled_list (id, name, dynamic, search_only)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(list.id)
        .bind(&list.name)
        .bind(list.dynamic)
        .bind(list.search_only)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(list)
    }

    async fn get(&self, id: Uuid) -> Result<Option<List>> {
        let row = sqlx::query(
            "SELECT id, name, dynamic, search_only
             FROM controlled_list
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_list_row))
    }

    async fn list(&self) -> Result<Vec<List>> {
        let rows = sqlx::query(
            "SELECT id, name, dynamic, search_only
             FROM controlled_list
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_list_row).collect())
    }

    async fn update(&self, mut list: List) -> Result<List> {
        list.clean();
        list.validate()?;

        let result = sqlx::query(
            "UPDATE controlled_list
             SET name = $1, dynamic = $2, search_only = $3
             WHERE id = $4",
        )
        .bind(&list.name)
        .bind(list.dynamic)
        .bind(list.search_only)
        .bind(list.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ListNotFound(list.id));
        }
        Ok(list)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM controlled_list WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn export(&self, id: Uuid, options: &ExportOptions) -> Result<ListExport> {
        let list = self.get(id).await?.ok_or(Error::ListNotFound(id))?;

        let items = sqlx::query(
            "SELECT id, list_id, uri, sortorder, parent_id, guide
             FROM controlled_list_item
             WHERE list_id = $1
             ORDER BY sortorder",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(Self::parse_item_row)
        .collect::<Vec<_>>();

        let values = sqlx::query(
            "SELECT v.id, v.list_item_id, v.valuetype, v.language_id, v.value
             FROM controlled_list_item_value v
             JOIN controlled_list_item i ON i.id = v.list_item_id
             WHERE i.list_id = $1
             ORDER BY v.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(Self::parse_value_row)
        .collect::<Vec<_>>();

        let image_metadata = sqlx::query(
            "SELECT m.id, m.list_item_image_id, m.language_id, m.metadata_type, m.value
             FROM controlled_list_item_image_metadata m
             JOIN controlled_list_item_value v ON v.id = m.list_item_image_id
             JOIN controlled_list_item i ON i.id = v.list_item_id
             WHERE i.list_id = $1
             ORDER BY m.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?
        .into_iter()
        .map(Self::parse_metadata_row)
        .collect::<Vec<_>>();

        // Precomputed annotation wins over the live reverse lookup.
        let nodes = match &options.nodes {
            Some(nodes) => nodes.clone(),
            None => self.referencing_nodes(id).await?,
        };

        Ok(serialize_list(
            &list,
            &items,
            &values,
            &image_metadata,
            nodes,
            options.flat,
            options.permitted_nodegroups.as_ref(),
        ))
    }

    async fn referencing_nodes(&self, list_id: Uuid) -> Result<Vec<ReferencingNode>> {
        // Draft copies of nodes (carrying a source identifier) are not
        // reported; only the published node references the list.
        let rows = sqlx::query(
            r#"
            SELECT n.id, n.name, n.nodegroup_id, n.graph_id, g.name AS graph_name
            FROM node n
            JOIN graph g ON g.id = n.graph_id
            WHERE CAST(n.config ->> 'controlledList' AS uuid) = $1
              AND n.source_identifier_id IS NULL
            ORDER BY n.id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| ReferencingNode {
                id: r.get("id"),
                name: r.get("name"),
                nodegroup_id: r.get("nodegroup_id"),
                graph_id: r.get("graph_id"),
                graph_name: r.get("graph_name"),
            })
            .collect())
    }
}
