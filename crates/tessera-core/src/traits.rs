//! Core traits for tessera-references abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Result, ValidationIssue};
use crate::models::*;
use crate::reference::{NodeConfig, Reference};

// =============================================================================
// LIST REPOSITORY TRAITS
// =============================================================================

/// Options for list export assembly.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Emit every item at the top level with its computed depth instead
    /// of nesting children under roots.
    pub flat: bool,
    /// Restrict the `nodes` section to these nodegroups. `None` means
    /// no filtering.
    pub permitted_nodegroups: Option<HashSet<Uuid>>,
    /// Precomputed referencing-node annotation. When absent, the
    /// repository falls back to a live reverse lookup over node configs.
    pub nodes: Option<Vec<ReferencingNode>>,
}

/// Repository for controlled list operations.
#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Create a new list. A blank name is auto-filled with a
    /// timestamped placeholder.
    async fn create(&self, name: &str, dynamic: bool, search_only: bool) -> Result<List>;

    /// Get a list by ID.
    async fn get(&self, id: Uuid) -> Result<Option<List>>;

    /// List all lists ordered by name.
    async fn list(&self) -> Result<Vec<List>>;

    /// Update a list's fields, returning the row as stored.
    async fn update(&self, list: List) -> Result<List>;

    /// Delete a list along with its items and their values.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Assemble the full export of a list: item tree (or flat item
    /// table), values, images, and referencing nodes.
    async fn export(&self, id: Uuid, options: &ExportOptions) -> Result<ListExport>;

    /// Find graph nodes whose field configuration points at this list,
    /// ordered by node ID.
    async fn referencing_nodes(&self, list_id: Uuid) -> Result<Vec<ReferencingNode>>;
}

// =============================================================================
// LIST ITEM REPOSITORY TRAITS
// =============================================================================

/// Repository for list item, item value, and image metadata operations.
#[async_trait]
pub trait ListItemRepository: Send + Sync {
    /// Insert a new item. The id, sortorder (next free slot in the
    /// list), and URI are filled in when the caller leaves them unset.
    async fn create(&self, item: NewListItem) -> Result<ListItem>;

    /// Get an item by ID.
    async fn get(&self, id: Uuid) -> Result<Option<ListItem>>;

    /// All items of a list ordered by sortorder.
    async fn list_for_list(&self, list_id: Uuid) -> Result<Vec<ListItem>>;

    /// Update an item's fields. A blank URI is regenerated from the id.
    async fn update(&self, item: ListItem) -> Result<ListItem>;

    /// Delete an item. Values and descendant items go with it.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Reassign parentage and sort order for many items of one list in
    /// a single transaction. `sortorder_map` gives items a new slot;
    /// `parent_map` moves items (`None` promotes to a root); an item
    /// may appear in either or both. Returns the number of rows
    /// written. Parentage and sortorder move together because their
    /// uniqueness is enforced together.
    async fn bulk_update_parentage_and_order(
        &self,
        list_id: Uuid,
        parent_map: &HashMap<Uuid, Option<Uuid>>,
        sortorder_map: &HashMap<Uuid, i32>,
    ) -> Result<u64>;

    /// Attach a value (label, note, or image) to an item. A blank value
    /// is auto-filled with a timestamped placeholder.
    async fn add_value(&self, value: ListItemValue) -> Result<ListItemValue>;

    /// Get a single value row by ID.
    async fn get_value(&self, id: Uuid) -> Result<Option<ListItemValue>>;

    /// All value rows of an item, images included.
    async fn values_for_item(&self, list_item_id: Uuid) -> Result<Vec<ListItemValue>>;

    /// Update a value row, returning it as stored.
    async fn update_value(&self, value: ListItemValue) -> Result<ListItemValue>;

    /// Delete a value row. Fails with [`crate::Error::MissingPrefLabel`]
    /// and leaves the row in place when the deletion would strip the
    /// owning item of its last preferred label.
    async fn delete_value(&self, id: Uuid) -> Result<()>;

    /// Attach a metadata row (title, description, attribution, or
    /// alternative text in one language) to an image value.
    async fn add_image_metadata(
        &self,
        image_id: Uuid,
        language_id: &str,
        metadata_type: MetadataType,
        value: &str,
    ) -> Result<Uuid>;

    /// All metadata rows of an image value.
    async fn image_metadata(&self, image_id: Uuid) -> Result<Vec<ListItemImageMetadata>>;

    /// Delete an image metadata row.
    async fn delete_image_metadata(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// REFERENCE REPOSITORY TRAITS
// =============================================================================

/// Repository for resolving and validating reference values against
/// stored lists and node configurations.
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    /// Resolve free text to a list item by exact match against any
    /// value row of the given list. Among several matching items the
    /// one with the lowest sortorder wins.
    async fn lookup_listitem_from_label(
        &self,
        label: &str,
        list_id: Uuid,
    ) -> Result<Option<ListItem>>;

    /// Materialize the canonical reference for an item: its URI, the
    /// owning list, and every label-category value.
    async fn build_tile_value(&self, item_id: Uuid) -> Result<Option<Reference>>;

    /// Convert arbitrary tile input (free text, item IDs, stored
    /// references, or arrays of those) into the canonical stored array.
    /// Unresolvable entries are dropped; JSON null stays `None`.
    async fn transform_value_for_tile(
        &self,
        value: Option<&JsonValue>,
        config: &NodeConfig,
    ) -> Result<Option<JsonValue>>;

    /// Validate a tile value, resolving the node configuration from
    /// `node` or, failing that, by fetching `node_id`. Returns the
    /// structured issues (empty when valid); an unresolvable node
    /// configuration is a caller error, not an issue.
    async fn validate(
        &self,
        value: Option<&JsonValue>,
        node: Option<&NodeConfig>,
        node_id: Option<Uuid>,
    ) -> Result<Vec<ValidationIssue>>;

    /// Fetch and check the reference configuration of a node.
    async fn node_config(&self, node_id: Uuid) -> Result<Option<NodeConfig>>;
}
