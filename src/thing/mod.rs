use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::location::{self, Location};

#[cfg(test)]
mod tests;

/// Thing represents one backend-managed entity in the live map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    /// Stable identifier (Ditto `thingId`, e.g. "org.example:bus-12")
    pub id: String,

    /// String-valued attributes (location, model, ...)
    pub attributes: BTreeMap<String, String>,

    /// String-valued features; values are often JSON text
    pub features: BTreeMap<String, String>,
}

impl Thing {
    /// A thing with empty attributes and features is a deletion marker
    /// when it arrives on the push stream.
    pub fn is_tombstone(&self) -> bool {
        self.attributes.is_empty() && self.features.is_empty() && !self.id.is_empty()
    }

    /// Display model from the `model` attribute, if any.
    pub fn model(&self) -> Option<&str> {
        self.attributes.get("model").map(String::as_str)
    }

    /// Raw `location` attribute.
    pub fn location_text(&self) -> Option<&str> {
        self.attributes.get("location").map(String::as_str)
    }

    /// Resolved coordinate, or None when the location attribute has no match.
    pub fn location(&self) -> Option<Location> {
        let text = self.location_text()?;
        if location::has_location(Some(text)) {
            location::resolve(text).ok()
        } else {
            None
        }
    }

    /// Feature values parsed for display.
    pub fn parsed_features(&self) -> impl Iterator<Item = (&str, FeatureValue)> {
        self.features
            .iter()
            .map(|(k, v)| (k.as_str(), FeatureValue::parse(v)))
    }
}

/// Stringify a JSON value for attribute/feature storage.
///
/// `None` stands for an absent field and becomes "undefined"; null becomes
/// "null"; strings are kept as-is; everything else is compact JSON text.
pub fn to_str(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        // Serializing a Value cannot fail
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    match value.and_then(Value::as_object) {
        Some(obj) => obj
            .iter()
            .map(|(k, v)| (k.clone(), to_str(Some(v))))
            .collect(),
        None => BTreeMap::new(),
    }
}

/// Convert a raw backend record into a Thing.
///
/// Never fails: missing or malformed fields become empty maps and a
/// missing `thingId` becomes "undefined".
pub fn normalize(raw: &Value) -> Thing {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    Thing {
        id: to_str(obj.get("thingId")),
        attributes: string_map(obj.get("attributes")),
        features: string_map(obj.get("features")),
    }
}

/// Feature value after the secondary JSON parse
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    /// Value parsed as JSON
    Structured(Value),
    /// Not JSON; shown as plain text
    Raw(String),
}

impl FeatureValue {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => FeatureValue::Structured(value),
            Err(_) => FeatureValue::Raw(text.to_string()),
        }
    }
}
