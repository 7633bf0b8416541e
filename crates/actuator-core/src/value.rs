//! Tagged value representation used for payloads, responses and attribute
//! values. JSON only appears at the transport edge; everything inside the
//! engine works with [`AttrValue`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// Request payload sent to an external API: API parameter name -> value.
pub type Payload = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum AttrValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttrValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            AttrValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Traverse a dotted path (`account.ids.0.value`). Numeric segments index
    /// into lists; an empty path returns the value itself.
    pub fn get_path(&self, path: &str) -> Option<&AttrValue> {
        let path = path.trim();
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                AttrValue::Map(map) => map.get(segment)?,
                AttrValue::List(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Canonical text form: strings without quotes, scalars via Display,
    /// composites as compact JSON.
    pub fn render(&self) -> String {
        match self {
            AttrValue::Null => String::new(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Text(s) => s.clone(),
            AttrValue::List(_) | AttrValue::Map(_) => JsonValue::from(self).to_string(),
        }
    }

    /// Build a map value from a payload.
    pub fn from_payload(payload: &Payload) -> Self {
        AttrValue::Map(payload.clone())
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<JsonValue> for AttrValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => AttrValue::Null,
            JsonValue::Bool(b) => AttrValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                // u64 above i64::MAX and real numbers both land here
                None => AttrValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => AttrValue::Text(s),
            JsonValue::Array(items) => AttrValue::List(items.into_iter().map(AttrValue::from).collect()),
            JsonValue::Object(map) => {
                AttrValue::Map(map.into_iter().map(|(k, v)| (k, AttrValue::from(v))).collect())
            }
        }
    }
}

impl From<&AttrValue> for JsonValue {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::Null => JsonValue::Null,
            AttrValue::Bool(b) => JsonValue::Bool(*b),
            AttrValue::Int(i) => JsonValue::Number((*i).into()),
            // JSON has no NaN/Infinity
            AttrValue::Float(f) => Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            AttrValue::Text(s) => JsonValue::String(s.clone()),
            AttrValue::List(items) => JsonValue::Array(items.iter().map(JsonValue::from).collect()),
            AttrValue::Map(map) => {
                JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), JsonValue::from(v))).collect())
            }
        }
    }
}

impl From<AttrValue> for JsonValue {
    fn from(value: AttrValue) -> Self {
        JsonValue::from(&value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}
