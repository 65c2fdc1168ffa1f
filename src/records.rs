//! Typed records decoded from store items
//!
//! Store items are loosely typed JSON maps. Each table decodes into one of the
//! structs below; a missing required key is a malformed record, a missing
//! optional key is `None` (or empty for lists).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One raw item as returned by a store
pub type Item = serde_json::Map<String, Value>;

/// Record decoding errors
#[derive(Error, Debug)]
#[error("Malformed record in table '{table}': {reason}")]
pub struct RecordError {
    pub table: String,
    pub reason: String,
}

/// Decode a store item into a typed record
pub fn decode<T: DeserializeOwned>(table: &str, item: Item) -> Result<T, RecordError> {
    serde_json::from_value(Value::Object(item)).map_err(|e| RecordError {
        table: table.to_string(),
        reason: e.to_string(),
    })
}

/// Decode every item of a table, failing on the first malformed one
pub fn decode_all<T: DeserializeOwned>(table: &str, items: Vec<Item>) -> Result<Vec<T>, RecordError> {
    items.into_iter().map(|item| decode(table, item)).collect()
}

/// Row of the researchers table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherRecord {
    pub researcher_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub advisor: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub contact_info: Vec<String>,
    /// Free-text lab names as entered by the researcher
    #[serde(default, deserialize_with = "string_list")]
    pub labs: Vec<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub standing: Option<String>,
}

/// Row of the papers table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub document_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub lab_id: Option<String>,
}

/// Row of the library table: associates a researcher with a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub researcher_id: String,
    pub document_id: String,
}

/// Row of the paper-edges table: an unordered co-authorship pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorshipEdge {
    pub researcher_one_id: String,
    pub researcher_two_id: String,
}

/// Row of the advisor edges table: advisee -> advisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisingEdge {
    pub advisee_id: String,
    pub advisor_id: String,
}

/// Row of the descriptions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub researcher_id: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub about: Option<String>,
}

/// Row of the metrics table
///
/// `influence` stays raw here; range and type checks happen during assembly
/// so a bad value only drops the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub researcher_id: String,
    #[serde(default)]
    pub influence: Option<Value>,
}

/// Biography and influence attached to a researcher by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub about: Option<String>,
    pub influence: Option<Value>,
}

/// Parse a raw influence value into a score in [0, 100]
///
/// Numbers and numeric strings are accepted; anything else is `Err` with the
/// offending value rendered for logging.
pub fn parse_influence(raw: &Value) -> Result<f64, String> {
    let score = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(v),
        _ => Err(raw.to_string()),
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Year as a number or numeric string; anything else is `None`
pub(crate) fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    let year = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        }
        _ => None,
    };
    Ok(year.and_then(|y| i32::try_from(y).ok()))
}

/// Influence as a number or numeric string in [0, 100]; anything else is `None`
pub(crate) fn lenient_influence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|raw| parse_influence(&raw).ok()))
}

/// Extract a string key from an item
pub(crate) fn item_key<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str)
}
