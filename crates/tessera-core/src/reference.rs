//! The reference value type embedded in tiles.
//!
//! A tile field configured for references stores an ordered array of
//! `{uri, list_id, labels}` objects, each denoting exactly one list
//! item together with a denormalized snapshot of its labels. This
//! module owns the parse/validate/serialize contracts for that shape
//! and the projections derived from it on the read path. Resolution
//! against stored lists lives in the database layer; everything here is
//! pure.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result, ValidationIssue};
use crate::ranking::best_label;

/// Value type identifier for preferred labels.
pub const PREF_LABEL: &str = "prefLabel";

/// Title carried by every structured validation issue for this type.
pub const ERROR_TITLE: &str = "Invalid Reference Datatype Value";

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One label snapshot inside a stored reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLabel {
    pub id: Uuid,
    pub value: String,
    pub language_id: String,
    pub valuetype_id: String,
    pub list_item_id: Uuid,
}

/// A materialized reference to a single list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub uri: String,
    pub list_id: Uuid,
    pub labels: Vec<ReferenceLabel>,
}

/// Read-side projection of a stored reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceProjection {
    pub list_item_id: Uuid,
    pub display_value: String,
}

/// Field configuration a graph node must carry to use this value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub controlled_list: Uuid,
    #[serde(default)]
    pub multi_value: bool,
}

impl NodeConfig {
    /// Parse the raw node config, requiring `controlledList` to be a
    /// UUID string. Absence or malformation is a graph-definition
    /// error, caught at schema validation rather than record write.
    pub fn from_config(config: &JsonValue) -> Result<Self> {
        let controlled_list = config
            .get("controlledList")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                Error::GraphValidation(
                    "A reference datatype node requires a controlled list".to_string(),
                )
            })?;
        let multi_value = config
            .get("multiValue")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Self {
            controlled_list,
            multi_value,
        })
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Why a raw value failed to parse into references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Non-null but empty collection.
    Empty,
    /// Input was not an array of reference objects.
    NotAList,
    /// One or more required fields were absent; carries the quoted,
    /// comma-joined field names.
    MissingValues(String),
    /// A field was unrecognized or carried an unusable value; carries
    /// the quoted field name.
    UnexpectedValue(String),
}

impl ParseError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "Reference datatype value cannot be empty".to_string(),
            Self::NotAList => "Reference value must be a list of reference objects".to_string(),
            Self::MissingValues(fields) => format!("Missing required value(s): {}", fields),
            Self::UnexpectedValue(field) => format!("Unexpected value: {}", field),
        }
    }

    pub fn to_issue(&self) -> ValidationIssue {
        ValidationIssue::error(self.message(), ERROR_TITLE)
    }
}

fn join_quoted(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("'{}'", only),
        [first, second] => format!("'{}' and '{}'", first, second),
        [head @ .., last] => {
            let quoted: Vec<String> = head.iter().map(|n| format!("'{}'", n)).collect();
            format!("{}, and '{}'", quoted.join(", "), last)
        }
    }
}

fn get_uuid(map: &serde_json::Map<String, JsonValue>, key: &'static str) -> Option<Uuid> {
    map.get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn get_string(map: &serde_json::Map<String, JsonValue>, key: &'static str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Parse the raw tile value into references.
///
/// Null input parses to `None`. An empty collection is an error
/// distinct from null. Field checks are hand-rolled rather than
/// derived so that all missing names for one object batch into a
/// single message.
pub fn parse_value(
    value: Option<&JsonValue>,
) -> std::result::Result<Option<Vec<Reference>>, ParseError> {
    let value = match value {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(v) => v,
    };
    let entries = match value {
        JsonValue::Array(entries) => entries,
        JsonValue::String(s) if s.is_empty() => return Err(ParseError::Empty),
        _ => return Err(ParseError::NotAList),
    };
    if entries.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut references = Vec::with_capacity(entries.len());
    for entry in entries {
        references.push(reference_from_json(entry)?);
    }
    Ok(Some(references))
}

fn reference_from_json(entry: &JsonValue) -> std::result::Result<Reference, ParseError> {
    const REQUIRED: [&str; 3] = ["uri", "labels", "list_id"];

    let map = entry.as_object().ok_or(ParseError::NotAList)?;

    // Labels are checked first so a malformed label is reported even
    // when the reference object itself is also incomplete.
    let labels = match map.get("labels") {
        Some(JsonValue::Array(raw_labels)) => Some(
            raw_labels
                .iter()
                .map(label_from_json)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(ParseError::NotAList),
        None => None,
    };

    if let Some(unexpected) = map.keys().find(|k| !REQUIRED.contains(&k.as_str())) {
        return Err(ParseError::UnexpectedValue(format!("'{}'", unexpected)));
    }

    let uri = get_string(map, "uri");
    let list_id = get_uuid(map, "list_id");

    let missing: Vec<&str> = [
        ("uri", map.contains_key("uri")),
        ("labels", labels.is_some()),
        ("list_id", map.contains_key("list_id")),
    ]
    .iter()
    .filter(|(_, present)| !present)
    .map(|(name, _)| *name)
    .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingValues(join_quoted(&missing)));
    }

    // Present but unusable values are reported by field name.
    let uri = uri.ok_or_else(|| ParseError::UnexpectedValue("'uri'".to_string()))?;
    let list_id = list_id.ok_or_else(|| ParseError::UnexpectedValue("'list_id'".to_string()))?;

    Ok(Reference {
        uri,
        list_id,
        labels: labels.unwrap_or_default(),
    })
}

fn label_from_json(entry: &JsonValue) -> std::result::Result<ReferenceLabel, ParseError> {
    const REQUIRED: [&str; 5] = ["id", "value", "language_id", "valuetype_id", "list_item_id"];

    let map = entry.as_object().ok_or(ParseError::NotAList)?;

    if let Some(unexpected) = map.keys().find(|k| !REQUIRED.contains(&k.as_str())) {
        return Err(ParseError::UnexpectedValue(format!("'{}'", unexpected)));
    }

    let missing: Vec<&str> = REQUIRED
        .iter()
        .filter(|name| !map.contains_key(**name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingValues(join_quoted(&missing)));
    }

    let id = get_uuid(map, "id").ok_or_else(|| ParseError::UnexpectedValue("'id'".to_string()))?;
    let list_item_id = get_uuid(map, "list_item_id")
        .ok_or_else(|| ParseError::UnexpectedValue("'list_item_id'".to_string()))?;
    let value =
        get_string(map, "value").ok_or_else(|| ParseError::UnexpectedValue("'value'".to_string()))?;
    let language_id = get_string(map, "language_id")
        .ok_or_else(|| ParseError::UnexpectedValue("'language_id'".to_string()))?;
    let valuetype_id = get_string(map, "valuetype_id")
        .ok_or_else(|| ParseError::UnexpectedValue("'valuetype_id'".to_string()))?;

    Ok(ReferenceLabel {
        id,
        value,
        language_id,
        valuetype_id,
        list_item_id,
    })
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Convert references back to the canonical storage array.
///
/// `parse_value` followed by this function is the identity on
/// well-formed canonical input.
pub fn serialize_references(references: &[Reference]) -> Result<JsonValue> {
    Ok(serde_json::to_value(references)?)
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a raw tile value against the reference contracts.
///
/// Short-circuits on the first violation: parse errors, then one
/// prefLabel per language, then single-item consistency, then the
/// node's multiplicity setting. Returns the issues for the editor on
/// bad data; returns `Err` when the caller supplied no node
/// configuration to check multiplicity against, since that is a defect
/// in the calling code rather than in the value.
pub fn validate_value(
    value: Option<&JsonValue>,
    config: Option<&NodeConfig>,
) -> Result<Vec<ValidationIssue>> {
    let references = match parse_value(value) {
        Ok(None) => return Ok(vec![]),
        Ok(Some(references)) => references,
        Err(e) => return Ok(vec![e.to_issue()]),
    };

    if let Some(issue) = check_pref_labels(&references) {
        return Ok(vec![issue]);
    }
    if let Some(issue) = check_single_item(&references) {
        return Ok(vec![issue]);
    }

    let config = config.ok_or_else(|| {
        Error::InvalidInput(
            "reference multiplicity validation requires a node configuration".to_string(),
        )
    })?;
    Ok(check_multivalue(&references, config).into_iter().collect())
}

/// At most one prefLabel per language within each reference.
pub fn check_pref_labels(references: &[Reference]) -> Option<ValidationIssue> {
    for reference in references {
        let mut seen = HashSet::new();
        for label in &reference.labels {
            if label.valuetype_id == PREF_LABEL && !seen.insert(label.language_id.as_str()) {
                return Some(ValidationIssue::error(
                    "A reference can have only one prefLabel per language",
                    ERROR_TITLE,
                ));
            }
        }
    }
    None
}

/// Every label in a reference must point at the same list item.
pub fn check_single_item(references: &[Reference]) -> Option<ValidationIssue> {
    for reference in references {
        let mut items = reference.labels.iter().map(|l| l.list_item_id);
        if let Some(first) = items.next() {
            if items.any(|item| item != first) {
                return Some(ValidationIssue::error(
                    "A reference can relate to only one list item",
                    ERROR_TITLE,
                ));
            }
        }
    }
    None
}

/// Single-valued nodes hold at most one reference.
pub fn check_multivalue(references: &[Reference], config: &NodeConfig) -> Option<ValidationIssue> {
    if !config.multi_value && references.len() > 1 {
        return Some(ValidationIssue::error(
            "This node does not allow multiple references.",
            ERROR_TITLE,
        ));
    }
    None
}

// =============================================================================
// TILE INPUT CLASSIFICATION
// =============================================================================

/// Classified raw input to the tile transform.
///
/// Dispatch is a single match over this closed set; there is no
/// ordered type-sniffing with fallthrough.
#[derive(Debug, Clone, PartialEq)]
pub enum TileInput {
    /// Free text to resolve against the configured list's labels.
    Label(String),
    /// Direct pointer to a list item, from a raw UUID string or the
    /// read projection's `list_item_id` form.
    ItemId(Uuid),
    /// Already in storage shape; passes through unchanged.
    Stored(JsonValue),
    /// Mixed collection; each element resolves independently.
    Many(Vec<TileInput>),
}

impl TileInput {
    /// Classify a raw value. Returns `None` for null and for scalar
    /// kinds that can never resolve to a list item.
    pub fn classify(value: &JsonValue) -> Option<TileInput> {
        match value {
            JsonValue::Null => None,
            JsonValue::String(s) => match Uuid::parse_str(s) {
                Ok(id) => Some(TileInput::ItemId(id)),
                Err(_) => Some(TileInput::Label(s.clone())),
            },
            JsonValue::Object(map) => match map.get("list_item_id").and_then(|v| v.as_str()) {
                Some(id) => match Uuid::parse_str(id) {
                    Ok(id) => Some(TileInput::ItemId(id)),
                    Err(_) => None,
                },
                None => Some(TileInput::Stored(value.clone())),
            },
            JsonValue::Array(entries) => Some(TileInput::Many(
                entries.iter().filter_map(TileInput::classify).collect(),
            )),
            JsonValue::Number(_) | JsonValue::Bool(_) => None,
        }
    }

    /// Classify and promote scalars to a one-element collection, so
    /// the transform always iterates. Null stays `None`.
    pub fn classify_promoted(value: &JsonValue) -> Option<Vec<TileInput>> {
        match TileInput::classify(value)? {
            TileInput::Many(inputs) => Some(inputs),
            single => Some(vec![single]),
        }
    }
}

// =============================================================================
// READ PATH
// =============================================================================

/// Project a stored value into `{list_item_id, display_value}` pairs
/// for the requested language. References without labels carry neither
/// a pointer nor text to display and are skipped.
pub fn to_representation(
    value: Option<&JsonValue>,
    language: &str,
) -> Result<Option<Vec<ReferenceProjection>>> {
    let references = match parse_value(value) {
        Ok(None) => return Ok(None),
        Ok(Some(references)) => references,
        Err(e) => return Err(Error::InvalidInput(e.message())),
    };

    let projections = references
        .iter()
        .filter_map(|reference| {
            best_label(&reference.labels, language).map(|label| ReferenceProjection {
                list_item_id: label.list_item_id,
                display_value: label.value.clone(),
            })
        })
        .collect();
    Ok(Some(projections))
}

/// Join the prefLabels matching the requested language across every
/// reference stored in the node's data.
///
/// Works over the raw stored JSON so display still functions on
/// legacy rows that would no longer pass strict parsing.
pub fn display_value(node_data: Option<&JsonValue>, language: &str) -> String {
    let mut labels = Vec::new();
    if let Some(entries) = node_data.and_then(|v| v.as_array()) {
        for entry in entries {
            let Some(entry_labels) = entry.get("labels").and_then(|v| v.as_array()) else {
                continue;
            };
            for label in entry_labels {
                let matches = label.get("language_id").and_then(|v| v.as_str()) == Some(language)
                    && label.get("valuetype_id").and_then(|v| v.as_str()) == Some(PREF_LABEL);
                if matches {
                    labels.push(
                        label
                            .get("value")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    );
                }
            }
        }
    }
    labels.join(", ")
}

/// Normalize an empty stored collection to null before save.
pub fn clean(value: &mut JsonValue) {
    if value.as_array().map_or(false, |entries| entries.is_empty()) {
        *value = JsonValue::Null;
    }
}

/// Flatten display values for spreadsheet export.
pub fn transform_export_values(values: &[String]) -> String {
    values.join(",")
}
