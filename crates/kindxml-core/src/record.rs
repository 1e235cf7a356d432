//! Property records: ordered key/value maps read from the entity store

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// A single property value.
///
/// `Blob` and `Key` can be read from the store but have no XML rendering;
/// the serializer rejects them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Entity(Record),
    Array(Vec<Value>),
    /// Base64 payload, kept as received
    Blob(String),
    Key(EntityKey),
}

impl Value {
    /// Type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Entity(_) => "entity",
            Self::Array(_) => "array",
            Self::Blob(_) => "blob",
            Self::Key(_) => "key",
        }
    }

    /// Convert plain JSON into a value.
    ///
    /// Objects become nested records (key order kept), integers that fit
    /// `i64` become `Integer`, every other number becomes `Double`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Entity(Record::from_json(map)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Entity(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Ordered property map.
///
/// Iteration order is insertion order. Re-inserting an existing key replaces
/// the value without moving it. Equality is order-sensitive.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert a property, returning the previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Build a record from a JSON object, keeping its key order
    pub fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter()
            .map(|(key, value)| (key, Value::from_json(value)))
            .collect()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut record = Self::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// One step of an entity key path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    pub kind: String,
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// Datastore-style entity key: partition plus ancestor path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityKey {
    pub project: Option<String>,
    pub namespace: Option<String>,
    pub path: Vec<PathElement>,
}

impl EntityKey {
    /// Kind of the entity itself (last path element)
    pub fn kind(&self) -> Option<&str> {
        self.path.last().map(|p| p.kind.as_str())
    }

    /// Namespace, with the empty string folded into the default namespace
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position() {
        let mut r = Record::new();
        r.insert("b", 1);
        r.insert("a", 2);
        assert_eq!(r.insert("b", 3), Some(Value::Integer(1)));
        let keys: Vec<_> = r.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(r.get("b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn equality_respects_order() {
        let ab: Record = [("a", 1), ("b", 2)].into_iter().collect();
        let ba: Record = [("b", 2), ("a", 1)].into_iter().collect();
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn wide_record_from_json() {
        let map: serde_json::Map<String, serde_json::Value> = (0..100_000)
            .map(|i| (format!("p{i}"), serde_json::json!(i)))
            .collect();
        let r = Record::from_json(map);
        assert_eq!(r.len(), 100_000);
        assert_eq!(r.keys().next(), Some("p0"));
        assert_eq!(r.keys().last(), Some("p99999"));
        assert_eq!(r.get("p4242"), Some(&Value::Integer(4242)));
    }

    #[test]
    fn from_json_preserves_order() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"y": true, "x": null}}"#).unwrap();
        let serde_json::Value::Object(map) = json else {
            panic!("expected object");
        };
        let r = Record::from_json(map);
        let keys: Vec<_> = r.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let Some(Value::Entity(inner)) = r.get("alpha") else {
            panic!("expected nested record");
        };
        let inner_keys: Vec<_> = inner.keys().collect();
        assert_eq!(inner_keys, vec!["y", "x"]);
    }

    #[test]
    fn from_json_numbers() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Integer(7));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Double(1.5));
        assert_eq!(
            Value::from_json(serde_json::json!(u64::MAX)),
            Value::Double(u64::MAX as f64)
        );
    }

    #[test]
    fn option_into_value() {
        let none: Option<&str> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }

    #[test]
    fn key_kind_and_namespace() {
        let key = EntityKey {
            project: Some("p".into()),
            namespace: Some(String::new()),
            path: vec![
                PathElement {
                    kind: "Org".into(),
                    id: Some(1),
                    name: None,
                },
                PathElement {
                    kind: "User".into(),
                    id: None,
                    name: Some("alice".into()),
                },
            ],
        };
        assert_eq!(key.kind(), Some("User"));
        assert_eq!(key.namespace(), None);
    }
}
