//! Core data models for tessera controlled lists.
//!
//! Lists are named, possibly hierarchical vocabularies. Items belong to
//! exactly one list, may nest under a parent item, and carry
//! language-tagged values (labels, notes, images). These types are
//! shared between the pure validation logic and the storage layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::uuid_utils;

/// Maximum length of a list name.
pub const MAX_LIST_NAME_LEN: usize = 127;
/// Maximum length of an item URI.
pub const MAX_URI_LEN: usize = 2048;
/// Maximum length of an item value.
pub const MAX_VALUE_LEN: usize = 1024;

// =============================================================================
// VALUE TYPE REGISTRY
// =============================================================================

/// Category of a value type: display label, image asset, or free-text note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCategory {
    Label,
    Image,
    Note,
}

/// Kinds of values that can be attached to a list item.
///
/// Wire strings follow SKOS property names (`prefLabel`, `scopeNote`, ...)
/// and are stored verbatim in the value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// Preferred display label. At most one per language per item.
    #[default]
    PrefLabel,
    /// Alternative label (synonym, abbreviation). Multiple allowed.
    AltLabel,
    /// Hidden label for search only (misspellings, codes).
    HiddenLabel,
    /// Image asset reference; the only kind allowed a null language.
    Image,
    Note,
    ScopeNote,
    Definition,
    Example,
    HistoryNote,
    EditorialNote,
    ChangeNote,
    Description,
}

impl ValueType {
    /// Category used to partition values during export and tile building.
    pub fn category(&self) -> ValueCategory {
        match self {
            Self::PrefLabel | Self::AltLabel | Self::HiddenLabel => ValueCategory::Label,
            Self::Image => ValueCategory::Image,
            _ => ValueCategory::Note,
        }
    }

    pub fn is_label(&self) -> bool {
        self.category() == ValueCategory::Label
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrefLabel => write!(f, "prefLabel"),
            Self::AltLabel => write!(f, "altLabel"),
            Self::HiddenLabel => write!(f, "hiddenLabel"),
            Self::Image => write!(f, "image"),
            Self::Note => write!(f, "note"),
            Self::ScopeNote => write!(f, "scopeNote"),
            Self::Definition => write!(f, "definition"),
            Self::Example => write!(f, "example"),
            Self::HistoryNote => write!(f, "historyNote"),
            Self::EditorialNote => write!(f, "editorialNote"),
            Self::ChangeNote => write!(f, "changeNote"),
            Self::Description => write!(f, "description"),
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preflabel" => Ok(Self::PrefLabel),
            "altlabel" => Ok(Self::AltLabel),
            "hiddenlabel" => Ok(Self::HiddenLabel),
            "image" => Ok(Self::Image),
            "note" => Ok(Self::Note),
            "scopenote" => Ok(Self::ScopeNote),
            "definition" => Ok(Self::Definition),
            "example" => Ok(Self::Example),
            "historynote" => Ok(Self::HistoryNote),
            "editorialnote" => Ok(Self::EditorialNote),
            "changenote" => Ok(Self::ChangeNote),
            "description" => Ok(Self::Description),
            _ => Err(format!("Invalid value type: {}", s)),
        }
    }
}

/// Metadata fields attachable to a list item image, one entry per
/// `(image, metadata_type, language)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataType {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "desc")]
    Description,
    #[serde(rename = "attr")]
    Attribution,
    #[serde(rename = "alt")]
    AlternativeText,
}

impl MetadataType {
    /// Human-readable label for UI display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Attribution => "Attribution",
            Self::AlternativeText => "Alternative text",
        }
    }
}

impl std::fmt::Display for MetadataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Description => write!(f, "desc"),
            Self::Attribution => write!(f, "attr"),
            Self::AlternativeText => write!(f, "alt"),
        }
    }
}

impl std::str::FromStr for MetadataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "desc" => Ok(Self::Description),
            "attr" => Ok(Self::Attribution),
            "alt" => Ok(Self::AlternativeText),
            _ => Err(format!("Invalid metadata type: {}", s)),
        }
    }
}

// =============================================================================
// LIST
// =============================================================================

/// A named controlled vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: Uuid,
    pub name: String,
    /// Computed list (entries generated, not curated by hand).
    pub dynamic: bool,
    /// List is offered for search filtering but not data entry.
    pub search_only: bool,
}

impl List {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid_utils::new_v7(),
            name: name.into(),
            dynamic: false,
            search_only: false,
        }
    }

    /// Fill a blank name with a timestamped placeholder.
    pub fn clean(&mut self) {
        if self.name.is_empty() {
            self.name = format!("Untitled List: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.chars().count() > MAX_LIST_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "list name exceeds {} characters",
                MAX_LIST_NAME_LEN
            )));
        }
        Ok(())
    }
}

// =============================================================================
// LIST ITEM
// =============================================================================

/// One entry in a controlled list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub id: Uuid,
    pub list_id: Uuid,
    /// Canonical external identifier, generated from the id when blank.
    pub uri: String,
    /// Display position within the whole list, unique per list.
    pub sortorder: i32,
    /// Parent item id; None for roots.
    pub parent_id: Option<Uuid>,
    /// Non-selectable heading node.
    pub guide: bool,
}

impl ListItem {
    pub fn validate(&self) -> Result<()> {
        validate_sortorder(self.sortorder)?;
        if self.uri.chars().count() > MAX_URI_LEN {
            return Err(Error::InvalidInput(format!(
                "item uri exceeds {} characters",
                MAX_URI_LEN
            )));
        }
        Ok(())
    }
}

pub fn validate_sortorder(sortorder: i32) -> Result<()> {
    if sortorder < 0 {
        return Err(Error::InvalidInput(format!(
            "sortorder must be >= 0, got {}",
            sortorder
        )));
    }
    Ok(())
}

/// A list item not yet persisted. The id is allocated before first save
/// so that URI generation has something to derive from.
#[derive(Debug, Clone, Default)]
pub struct NewListItem {
    pub id: Option<Uuid>,
    pub list_id: Uuid,
    pub uri: String,
    /// None appends the item after the current maximum sortorder.
    pub sortorder: Option<i32>,
    pub parent_id: Option<Uuid>,
    pub guide: bool,
}

impl NewListItem {
    pub fn new(list_id: Uuid) -> Self {
        Self {
            list_id,
            ..Default::default()
        }
    }

    /// Allocate an id if one has not been assigned yet.
    pub fn ensure_id(&mut self) -> Uuid {
        *self.id.get_or_insert_with(uuid_utils::new_v7)
    }

    /// Derive the canonical URI for this item.
    ///
    /// Calling this before an id has been allocated is a defect in the
    /// caller, not bad data, and fails loudly.
    pub fn generate_uri(&self, config: &UriConfig) -> Result<String> {
        let id = self.id.ok_or_else(|| {
            Error::Internal("URI generation attempted without a primary key.".to_string())
        })?;
        Ok(config.item_uri(id))
    }
}

/// Public addressing used to derive item URIs.
#[derive(Debug, Clone)]
pub struct UriConfig {
    pub public_server_address: String,
    /// Optional path prefix when the host is mounted below the domain root.
    pub script_prefix: Option<String>,
}

impl Default for UriConfig {
    fn default() -> Self {
        Self {
            public_server_address: "http://localhost:8000".to_string(),
            script_prefix: None,
        }
    }
}

impl UriConfig {
    /// Read `PUBLIC_SERVER_ADDRESS` and `FORCE_SCRIPT_NAME` from the
    /// environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let public_server_address = match std::env::var("PUBLIC_SERVER_ADDRESS") {
            Ok(val) if !val.is_empty() => val,
            Ok(_) => {
                tracing::warn!("Empty PUBLIC_SERVER_ADDRESS, using default");
                defaults.public_server_address
            }
            Err(_) => defaults.public_server_address,
        };
        Self {
            public_server_address,
            script_prefix: std::env::var("FORCE_SCRIPT_NAME")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn item_uri(&self, id: Uuid) -> String {
        let mut parts = vec![self.public_server_address.trim_end_matches('/').to_string()];
        if let Some(prefix) = &self.script_prefix {
            parts.push(prefix.trim_matches('/').to_string());
        }
        parts.push("plugins".to_string());
        parts.push("controlled-list-manager".to_string());
        parts.push("item".to_string());
        parts.push(id.to_string());
        parts.join("/")
    }
}

// =============================================================================
// LIST ITEM VALUE
// =============================================================================

/// A language-tagged label, note, or image reference attached to an item.
///
/// Serializes to the wire shape shared with tile labels:
/// `{id, list_item_id, valuetype_id, language_id, value}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemValue {
    pub id: Uuid,
    pub list_item_id: Uuid,
    #[serde(rename = "valuetype_id")]
    pub valuetype: ValueType,
    /// None only for image rows.
    pub language_id: Option<String>,
    pub value: String,
}

impl ListItemValue {
    pub fn new(
        list_item_id: Uuid,
        valuetype: ValueType,
        language_id: Option<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid_utils::new_v7(),
            list_item_id,
            valuetype,
            language_id,
            value: value.into(),
        }
    }

    /// Fill a blank value with a timestamped placeholder.
    pub fn clean(&mut self) {
        if self.value.is_empty() {
            self.value = format!("New Item: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.language_id.is_none() && self.valuetype != ValueType::Image {
            return Err(Error::InvalidInput(
                "Item values must be associated with a language.".to_string(),
            ));
        }
        if self.value.chars().count() > MAX_VALUE_LEN {
            return Err(Error::InvalidInput(format!(
                "item value exceeds {} characters",
                MAX_VALUE_LEN
            )));
        }
        Ok(())
    }
}

/// Per-language metadata describing a list item image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemImageMetadata {
    pub id: Uuid,
    pub list_item_image_id: Uuid,
    pub language_id: String,
    pub metadata_type: MetadataType,
    pub value: String,
}

impl ListItemImageMetadata {
    pub fn to_export(&self) -> ImageMetadataExport {
        ImageMetadataExport {
            id: self.id,
            list_item_image_id: self.list_item_image_id,
            language_id: self.language_id.clone(),
            metadata_type: self.metadata_type,
            metadata_label: self.metadata_type.label().to_string(),
            value: self.value.clone(),
        }
    }
}

// =============================================================================
// EXPORT SHAPES
// =============================================================================

/// A graph node whose field configuration points at a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencingNode {
    pub id: Uuid,
    pub name: String,
    pub nodegroup_id: Uuid,
    pub graph_id: Uuid,
    pub graph_name: String,
}

/// Full export of a list with its item tree and referencing nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExport {
    pub id: Uuid,
    pub name: String,
    pub dynamic: bool,
    pub search_only: bool,
    pub items: Vec<ListItemExport>,
    pub nodes: Vec<ReferencingNode>,
}

/// One exported item. `children` is present in tree mode and absent in
/// flat mode; `depth` is filled in both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemExport {
    pub id: Uuid,
    pub list_id: Uuid,
    pub uri: String,
    pub sortorder: i32,
    pub guide: bool,
    pub values: Vec<ListItemValue>,
    pub images: Vec<ListItemImageExport>,
    pub parent_id: Option<Uuid>,
    pub depth: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ListItemExport>>,
}

/// An image row (a value of the image kind) with its metadata attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemImageExport {
    pub id: Uuid,
    pub list_item_id: Uuid,
    pub url: String,
    pub metadata: Vec<ImageMetadataExport>,
}

/// Image metadata row plus the human-readable label for its type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadataExport {
    pub id: Uuid,
    pub list_item_image_id: Uuid,
    pub language_id: String,
    pub metadata_type: MetadataType,
    pub metadata_label: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_wire_strings() {
        assert_eq!(ValueType::PrefLabel.to_string(), "prefLabel");
        assert_eq!(ValueType::AltLabel.to_string(), "altLabel");
        assert_eq!(ValueType::HiddenLabel.to_string(), "hiddenLabel");
        assert_eq!(ValueType::ScopeNote.to_string(), "scopeNote");
        assert_eq!(ValueType::HistoryNote.to_string(), "historyNote");
        assert_eq!(ValueType::Image.to_string(), "image");
    }

    #[test]
    fn test_value_type_parse_round_trip() {
        for vt in [
            ValueType::PrefLabel,
            ValueType::AltLabel,
            ValueType::HiddenLabel,
            ValueType::Image,
            ValueType::Note,
            ValueType::ScopeNote,
            ValueType::Definition,
            ValueType::Example,
            ValueType::HistoryNote,
            ValueType::EditorialNote,
            ValueType::ChangeNote,
            ValueType::Description,
        ] {
            let parsed: ValueType = vt.to_string().parse().unwrap();
            assert_eq!(parsed, vt);
        }
        assert!("gibberish".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_value_type_serde_matches_display() {
        let json = serde_json::to_value(ValueType::PrefLabel).unwrap();
        assert_eq!(json, serde_json::json!("prefLabel"));
        let json = serde_json::to_value(ValueType::EditorialNote).unwrap();
        assert_eq!(json, serde_json::json!("editorialNote"));
    }

    #[test]
    fn test_value_type_categories() {
        assert_eq!(ValueType::PrefLabel.category(), ValueCategory::Label);
        assert_eq!(ValueType::AltLabel.category(), ValueCategory::Label);
        assert_eq!(ValueType::HiddenLabel.category(), ValueCategory::Label);
        assert_eq!(ValueType::Image.category(), ValueCategory::Image);
        assert_eq!(ValueType::ScopeNote.category(), ValueCategory::Note);
        assert_eq!(ValueType::Description.category(), ValueCategory::Note);
        assert!(ValueType::PrefLabel.is_label());
        assert!(!ValueType::Image.is_label());
    }

    #[test]
    fn test_metadata_type_labels() {
        assert_eq!(MetadataType::Title.label(), "Title");
        assert_eq!(MetadataType::Description.label(), "Description");
        assert_eq!(MetadataType::Attribution.label(), "Attribution");
        assert_eq!(MetadataType::AlternativeText.label(), "Alternative text");
    }

    #[test]
    fn test_metadata_type_wire_strings() {
        assert_eq!(MetadataType::Description.to_string(), "desc");
        assert_eq!(MetadataType::Attribution.to_string(), "attr");
        assert_eq!(
            serde_json::to_value(MetadataType::AlternativeText).unwrap(),
            serde_json::json!("alt")
        );
        assert_eq!("alt".parse::<MetadataType>(), Ok(MetadataType::AlternativeText));
    }

    #[test]
    fn test_list_clean_fills_blank_name() {
        let mut list = List::new("");
        list.clean();
        assert!(list.name.starts_with("Untitled List: "));

        let mut named = List::new("Resource Types");
        named.clean();
        assert_eq!(named.name, "Resource Types");
    }

    #[test]
    fn test_list_validate_rejects_long_name() {
        let list = List::new("x".repeat(128));
        assert!(list.validate().is_err());
        let list = List::new("x".repeat(127));
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_value_clean_fills_blank_value() {
        let mut value = ListItemValue::new(
            Uuid::new_v4(),
            ValueType::PrefLabel,
            Some("en".to_string()),
            "",
        );
        value.clean();
        assert!(value.value.starts_with("New Item: "));
    }

    #[test]
    fn test_value_requires_language_unless_image() {
        let unlabeled = ListItemValue::new(Uuid::new_v4(), ValueType::PrefLabel, None, "x");
        assert!(unlabeled.validate().is_err());

        let image = ListItemValue::new(Uuid::new_v4(), ValueType::Image, None, "img.png");
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_value_serializes_to_label_wire_shape() {
        let value = ListItemValue::new(
            Uuid::new_v4(),
            ValueType::PrefLabel,
            Some("en".to_string()),
            "Concrete",
        );
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["valuetype_id"], "prefLabel");
        assert_eq!(json["language_id"], "en");
        assert_eq!(json["value"], "Concrete");
        assert_eq!(json["list_item_id"], value.list_item_id.to_string());
        assert!(json.get("valuetype").is_none());
    }

    #[test]
    fn test_sortorder_must_be_non_negative() {
        assert!(validate_sortorder(0).is_ok());
        assert!(validate_sortorder(17).is_ok());
        assert!(validate_sortorder(-1).is_err());
    }

    #[test]
    fn test_uri_generation_guards_against_missing_id() {
        let mut item = NewListItem::new(Uuid::new_v4());
        let err = item.generate_uri(&UriConfig::default()).unwrap_err();
        match err {
            Error::Internal(msg) => assert!(msg.contains("without a primary key")),
            other => panic!("expected Internal error, got {:?}", other),
        }

        let id = item.ensure_id();
        let uri = item.generate_uri(&UriConfig::default()).unwrap();
        assert!(uri.contains(&id.to_string()));
        assert!(uri.contains("plugins/controlled-list-manager/item/"));
    }

    #[test]
    fn test_uri_joins_prefix_without_double_slashes() {
        let config = UriConfig {
            public_server_address: "https://heritage.example.org/".to_string(),
            script_prefix: Some("/heritage/".to_string()),
        };
        let id = Uuid::nil();
        assert_eq!(
            config.item_uri(id),
            format!(
                "https://heritage.example.org/heritage/plugins/controlled-list-manager/item/{}",
                id
            )
        );
    }

    #[test]
    fn test_ensure_id_is_stable() {
        let mut item = NewListItem::new(Uuid::new_v4());
        let first = item.ensure_id();
        let second = item.ensure_id();
        assert_eq!(first, second);
    }

    #[test]
    fn test_item_export_omits_children_when_flat() {
        let export = ListItemExport {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            uri: "http://example.com/1".to_string(),
            sortorder: 0,
            guide: false,
            values: vec![],
            images: vec![],
            parent_id: None,
            depth: 0,
            children: None,
        };
        let json = serde_json::to_value(&export).unwrap();
        assert!(json.get("children").is_none());
        assert_eq!(json["depth"], 0);
    }

    #[test]
    fn test_metadata_export_carries_label() {
        let meta = ListItemImageMetadata {
            id: Uuid::new_v4(),
            list_item_image_id: Uuid::new_v4(),
            language_id: "en".to_string(),
            metadata_type: MetadataType::AlternativeText,
            value: "a stone wall".to_string(),
        };
        let export = meta.to_export();
        assert_eq!(export.metadata_label, "Alternative text");
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["metadata_type"], "alt");
        assert_eq!(json["metadata_label"], "Alternative text");
    }
}
