//! Entity envelope and decoding of the Datastore JSON entity format
//!
//! Entities arrive in the REST v1 representation, where every property value
//! is an object tagged by its type:
//!
//! ```json
//! {"key": {"partitionId": {"projectId": "p"}, "path": [{"kind": "User", "name": "a"}]},
//!  "properties": {"age": {"integerValue": "42"}, "tags": {"arrayValue": {"values": []}}}}
//! ```

use chrono::{DateTime, Utc};
use kindxml_core::{EntityKey, PathElement, Record, Value};
use serde_json::{Map, Value as Json};

/// One entity as read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: Option<EntityKey>,
    pub properties: Record,
}

impl Entity {
    /// Drop the envelope and keep the property record
    pub fn into_properties(self) -> Record {
        self.properties
    }

    /// Decode a Datastore JSON entity
    pub fn from_datastore_json(json: Json) -> Result<Self, String> {
        let Json::Object(mut obj) = json else {
            return Err("entity must be a JSON object".to_string());
        };
        let key = match obj.remove("key") {
            None | Some(Json::Null) => None,
            Some(k) => Some(decode_key(k).map_err(|e| format!("key: {e}"))?),
        };
        let properties = match obj.remove("properties") {
            None | Some(Json::Null) => Record::new(),
            Some(Json::Object(props)) => decode_properties(props)?,
            Some(_) => return Err("`properties` must be an object".to_string()),
        };
        Ok(Self { key, properties })
    }

    /// Wrap a plain JSON object as a keyless entity
    pub fn from_plain_json(json: Json) -> Result<Self, String> {
        match json {
            Json::Object(map) => Ok(Self {
                key: None,
                properties: Record::from_json(map),
            }),
            other => Err(format!("expected a JSON object, got {}", json_type(&other))),
        }
    }
}

fn decode_properties(props: Map<String, Json>) -> Result<Record, String> {
    let mut record = Record::with_capacity(props.len());
    for (name, value) in props {
        let value = decode_value(value).map_err(|e| format!("property `{name}`: {e}"))?;
        record.insert(name, value);
    }
    Ok(record)
}

fn decode_value(json: Json) -> Result<Value, String> {
    let fields = match json {
        Json::Object(fields) => fields,
        other => {
            return Err(format!(
                "expected a typed value object, got {}",
                json_type(&other)
            ));
        }
    };

    // The first field that is not an index annotation names the type
    let Some((field, inner)) = fields
        .into_iter()
        .find(|(k, _)| !matches!(k.as_str(), "excludeFromIndexes" | "meaning"))
    else {
        return Err("value has no type field".to_string());
    };

    match field.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| "booleanValue must be a boolean".to_string()),
        "integerValue" => decode_integer(&inner).map(Value::Integer),
        "doubleValue" => decode_double(&inner).map(Value::Double),
        "stringValue" => into_string(inner, "stringValue").map(Value::String),
        "timestampValue" => {
            let raw = into_string(inner, "timestampValue")?;
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| format!("timestampValue `{raw}`: {e}"))
        }
        "blobValue" => into_string(inner, "blobValue").map(Value::Blob),
        "keyValue" => decode_key(inner).map(Value::Key),
        "geoPointValue" => decode_geo_point(inner).map(Value::Entity),
        "entityValue" => decode_embedded(inner).map(Value::Entity),
        "arrayValue" => decode_array(inner).map(Value::Array),
        other => Err(format!("unknown value type `{other}`")),
    }
}

/// Integers travel as decimal strings (int64 in proto3 JSON), numbers are accepted too
fn decode_integer(json: &Json) -> Result<i64, String> {
    match json {
        Json::String(s) => s
            .parse()
            .map_err(|e| format!("integerValue `{s}`: {e}")),
        Json::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("integerValue {n} out of range")),
        other => Err(format!("integerValue must be a string, got {}", json_type(other))),
    }
}

fn decode_double(json: &Json) -> Result<f64, String> {
    match json {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("doubleValue {n} is not representable")),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => s.parse().map_err(|e| format!("doubleValue `{s}`: {e}")),
        },
        other => Err(format!("doubleValue must be a number, got {}", json_type(other))),
    }
}

fn into_string(json: Json, field: &str) -> Result<String, String> {
    match json {
        Json::String(s) => Ok(s),
        other => Err(format!("{field} must be a string, got {}", json_type(&other))),
    }
}

fn decode_embedded(json: Json) -> Result<Record, String> {
    let Json::Object(mut obj) = json else {
        return Err("entityValue must be an object".to_string());
    };
    match obj.remove("properties") {
        None | Some(Json::Null) => Ok(Record::new()),
        Some(Json::Object(props)) => decode_properties(props),
        Some(_) => Err("entityValue.properties must be an object".to_string()),
    }
}

fn decode_array(json: Json) -> Result<Vec<Value>, String> {
    let Json::Object(mut obj) = json else {
        return Err("arrayValue must be an object".to_string());
    };
    match obj.remove("values") {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::Array(values)) => values
            .into_iter()
            .enumerate()
            .map(|(i, v)| decode_value(v).map_err(|e| format!("[{i}]: {e}")))
            .collect(),
        Some(_) => Err("arrayValue.values must be an array".to_string()),
    }
}

fn decode_geo_point(json: Json) -> Result<Record, String> {
    let coord = |name: &str| -> Result<f64, String> {
        json.get(name)
            .map_or(Ok(0.0), |v| {
                v.as_f64()
                    .ok_or_else(|| format!("geoPointValue.{name} must be a number"))
            })
    };
    let mut record = Record::with_capacity(2);
    record.insert("latitude", coord("latitude")?);
    record.insert("longitude", coord("longitude")?);
    Ok(record)
}

fn decode_key(json: Json) -> Result<EntityKey, String> {
    let Json::Object(mut obj) = json else {
        return Err("key must be an object".to_string());
    };

    let mut key = EntityKey::default();
    if let Some(Json::Object(partition)) = obj.remove("partitionId") {
        key.project = partition
            .get("projectId")
            .and_then(Json::as_str)
            .map(String::from);
        key.namespace = partition
            .get("namespaceId")
            .and_then(Json::as_str)
            .map(String::from);
    }

    if let Some(path) = obj.remove("path") {
        let Json::Array(elements) = path else {
            return Err("path must be an array".to_string());
        };
        for element in elements {
            key.path.push(decode_path_element(element)?);
        }
    }
    Ok(key)
}

fn decode_path_element(json: Json) -> Result<PathElement, String> {
    let Json::Object(obj) = json else {
        return Err("path element must be an object".to_string());
    };
    let kind = obj
        .get("kind")
        .and_then(Json::as_str)
        .ok_or("path element has no kind")?
        .to_string();
    let id = obj.get("id").map(decode_integer).transpose()?;
    let name = obj.get("name").and_then(Json::as_str).map(String::from);
    Ok(PathElement { kind, id, name })
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
