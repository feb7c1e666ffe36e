//! Records, messages, and the typed key/value map they carry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sunlink_core::SchemaError;

/// Identifier of a node on the channel (a handheld or a wearable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single typed value inside a [`DataMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl DataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// String-keyed map of typed values, the payload of a [`Record`].
///
/// Keys are stable field names; getters fail with a [`SchemaError`] when a
/// key is absent or holds a different type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataMap(BTreeMap<String, DataValue>);

macro_rules! typed_accessors {
    ($put:ident, $get:ident, $variant:ident, $ty:ty, $name:literal) => {
        pub fn $put(&mut self, key: &str, value: $ty) -> &mut Self {
            self.0.insert(key.to_string(), DataValue::$variant(value));
            self
        }

        pub fn $get(&self, key: &str) -> Result<$ty, SchemaError> {
            match self.0.get(key) {
                Some(DataValue::$variant(v)) => Ok(v.clone()),
                Some(other) => Err(SchemaError::WrongType {
                    key: key.to_string(),
                    expected: $name,
                    found: other.type_name(),
                }),
                None => Err(SchemaError::MissingField(key.to_string())),
            }
        }
    };
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    typed_accessors!(put_int, get_int, Int, i32, "int");
    typed_accessors!(put_long, get_long, Long, i64, "long");
    typed_accessors!(put_double, get_double, Double, f64, "double");
    typed_accessors!(put_bool, get_bool, Bool, bool, "bool");
    typed_accessors!(put_string, get_string, String, String, "string");
    typed_accessors!(put_bytes, get_bytes, Bytes, Vec<u8>, "bytes");

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Request to store a record under `path`, replacing any previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct PutRecordRequest {
    pub path: String,
    pub data: DataMap,
    /// Ask the transport for expedited delivery instead of batching.
    pub urgent: bool,
}

impl PutRecordRequest {
    pub fn new(path: impl Into<String>, data: DataMap) -> Self {
        Self {
            path: path.into(),
            data,
            urgent: false,
        }
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

/// A replicated record as stored by the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
    pub origin: PeerId,
    /// Monotonic per-channel sequence; a higher value supersedes a lower one.
    pub sequence: u64,
    pub data: DataMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEventKind {
    Changed,
    Deleted,
}

/// Notification delivered to record listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub kind: RecordEventKind,
    pub record: Record,
}

impl RecordEvent {
    pub fn path(&self) -> &str {
        &self.record.path
    }
}

/// A one-shot message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub source: PeerId,
    pub path: String,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut map = DataMap::new();
        map.put_int("weather_id", 800)
            .put_double("max_temp", 25.0)
            .put_string("description", "Clear".to_string())
            .put_bool("is_metric", true);

        assert_eq!(map.get_int("weather_id").unwrap(), 800);
        assert_eq!(map.get_double("max_temp").unwrap(), 25.0);
        assert_eq!(map.get_string("description").unwrap(), "Clear");
        assert!(map.get_bool("is_metric").unwrap());
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_missing_field() {
        let map = DataMap::new();
        assert_eq!(
            map.get_int("weather_id"),
            Err(SchemaError::MissingField("weather_id".to_string()))
        );
    }

    #[test]
    fn test_wrong_type() {
        let mut map = DataMap::new();
        map.put_string("weather_id", "800".to_string());
        assert_eq!(
            map.get_int("weather_id"),
            Err(SchemaError::WrongType {
                key: "weather_id".to_string(),
                expected: "int",
                found: "string",
            })
        );
    }

    #[test]
    fn test_put_replaces_value() {
        let mut map = DataMap::new();
        map.put_int("weather_id", 500);
        map.put_int("weather_id", 800);
        assert_eq!(map.get_int("weather_id").unwrap(), 800);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let mut map = DataMap::new();
        map.put_bool("is_metric", false);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "is_metric": { "type": "bool", "value": false } })
        );
    }

    #[test]
    fn test_put_request_defaults_to_non_urgent() {
        let request = PutRecordRequest::new("/weather", DataMap::new());
        assert!(!request.urgent);
        assert!(request.urgent().urgent);
    }
}
