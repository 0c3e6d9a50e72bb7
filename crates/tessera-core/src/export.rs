//! List export assembly.
//!
//! Builds the serialized shape of a list from already-fetched rows.
//! Items form an arena keyed by id with parent/child links stored as
//! ids, so traversal never chases object references. Tree mode nests
//! `children` under each root; flat mode emits every item at the top
//! level with its computed `depth`.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{
    List, ListExport, ListItem, ListItemExport, ListItemImageExport, ListItemImageMetadata,
    ListItemValue, ReferencingNode, ValueCategory,
};

/// Assemble the export of one list.
///
/// `values` holds every value row of the list's items, images
/// included; `nodes` arrive in source query order and pass through
/// unchanged apart from the optional nodegroup permission filter.
pub fn serialize_list(
    list: &List,
    items: &[ListItem],
    values: &[ListItemValue],
    image_metadata: &[ListItemImageMetadata],
    nodes: Vec<ReferencingNode>,
    flat: bool,
    permitted_nodegroups: Option<&HashSet<Uuid>>,
) -> ListExport {
    let arena = Arena::build(items, values, image_metadata);

    let item_exports = if flat {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by_key(|&idx| items[idx].sortorder);
        order
            .into_iter()
            .map(|idx| arena.export_item(idx, false))
            .collect()
    } else {
        arena
            .sorted_children(None)
            .into_iter()
            .map(|idx| arena.export_item(idx, true))
            .collect()
    };

    let nodes = match permitted_nodegroups {
        Some(permitted) => nodes
            .into_iter()
            .filter(|node| permitted.contains(&node.nodegroup_id))
            .collect(),
        None => nodes,
    };

    ListExport {
        id: list.id,
        name: list.name.clone(),
        dynamic: list.dynamic,
        search_only: list.search_only,
        items: item_exports,
        nodes,
    }
}

struct Arena<'a> {
    items: &'a [ListItem],
    by_parent: HashMap<Option<Uuid>, Vec<usize>>,
    depths: HashMap<Uuid, i32>,
    values_of: HashMap<Uuid, Vec<&'a ListItemValue>>,
    images_of: HashMap<Uuid, Vec<ListItemImageExport>>,
}

impl<'a> Arena<'a> {
    fn build(
        items: &'a [ListItem],
        values: &'a [ListItemValue],
        image_metadata: &'a [ListItemImageMetadata],
    ) -> Self {
        let known: HashSet<Uuid> = items.iter().map(|item| item.id).collect();
        let mut by_parent: HashMap<Option<Uuid>, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            // Parents outside the fetched set group with the roots.
            let key = item.parent_id.filter(|parent| known.contains(parent));
            by_parent.entry(key).or_default().push(idx);
        }

        let mut metadata_of: HashMap<Uuid, Vec<&ListItemImageMetadata>> = HashMap::new();
        for metadata in image_metadata {
            metadata_of
                .entry(metadata.list_item_image_id)
                .or_default()
                .push(metadata);
        }

        let mut values_of: HashMap<Uuid, Vec<&ListItemValue>> = HashMap::new();
        let mut images_of: HashMap<Uuid, Vec<ListItemImageExport>> = HashMap::new();
        for value in values {
            if value.valuetype.category() == ValueCategory::Image {
                images_of
                    .entry(value.list_item_id)
                    .or_default()
                    .push(ListItemImageExport {
                        id: value.id,
                        list_item_id: value.list_item_id,
                        url: value.value.clone(),
                        metadata: metadata_of
                            .get(&value.id)
                            .map(|rows| rows.iter().map(|m| m.to_export()).collect())
                            .unwrap_or_default(),
                    });
            } else {
                values_of.entry(value.list_item_id).or_default().push(value);
            }
        }

        Self {
            items,
            by_parent,
            depths: compute_depths(items),
            values_of,
            images_of,
        }
    }

    fn sorted_children(&self, parent: Option<Uuid>) -> Vec<usize> {
        let mut children = self.by_parent.get(&parent).cloned().unwrap_or_default();
        children.sort_by_key(|&idx| self.items[idx].sortorder);
        children
    }

    fn export_item(&self, idx: usize, with_children: bool) -> ListItemExport {
        let item = &self.items[idx];
        let children = with_children.then(|| {
            self.sorted_children(Some(item.id))
                .into_iter()
                .map(|child| self.export_item(child, true))
                .collect()
        });
        ListItemExport {
            id: item.id,
            list_id: item.list_id,
            uri: item.uri.clone(),
            sortorder: item.sortorder,
            guide: item.guide,
            values: self
                .values_of
                .get(&item.id)
                .map(|rows| rows.iter().map(|v| (*v).clone()).collect())
                .unwrap_or_default(),
            images: self.images_of.get(&item.id).cloned().unwrap_or_default(),
            parent_id: item.parent_id,
            depth: self.depths.get(&item.id).copied().unwrap_or(0),
            children,
        }
    }
}

/// Depth of every item, independent of input order.
///
/// Walks parent links upward until a root or an already-computed
/// ancestor, then assigns the whole walked chain at once. A parent
/// outside the arena or a cycle terminates the walk at that link.
fn compute_depths(items: &[ListItem]) -> HashMap<Uuid, i32> {
    let parent_of: HashMap<Uuid, Option<Uuid>> =
        items.iter().map(|item| (item.id, item.parent_id)).collect();
    let mut depths: HashMap<Uuid, i32> = HashMap::with_capacity(items.len());

    for item in items {
        if depths.contains_key(&item.id) {
            continue;
        }
        let mut chain = vec![item.id];
        let mut base = 0;
        let mut cursor = item.parent_id;
        while let Some(parent) = cursor {
            if let Some(known) = depths.get(&parent) {
                base = known + 1;
                break;
            }
            if !parent_of.contains_key(&parent) || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            cursor = parent_of[&parent];
        }
        for (offset, id) in chain.iter().rev().enumerate() {
            depths.insert(*id, base + offset as i32);
        }
    }
    depths
}
