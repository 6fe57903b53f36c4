// Mapping between the domain model and the JSON shapes of the Olog REST API.
//
// Encoding builds `serde_json::Value`s directly. Decoding reads borrowed
// values without consuming them: every object is checked for all of its
// required keys up front, and an `OlogError::Decode` lists every key that
// is absent rather than stopping at the first one.
//
// Server-assigned fields (`id`, `createdDate`, `modifiedDate`) are read by
// `decode_log_entry` and never written by `encode_log_entry`.

use crate::error::{OlogError, Result};
use crate::model::{LogEntry, Logbook, Property, Tag, TAG_ACTIVE, TAG_INACTIVE};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// The only level the service accepts for entries made by this client.
pub const LEVEL: &str = "Info";

pub fn encode_logbook(logbook: &Logbook) -> Value {
    json!({ "name": logbook.name, "owner": logbook.owner })
}

pub fn encode_tag(tag: &Tag) -> Value {
    json!({ "name": tag.name, "state": tag.state })
}

pub fn encode_property(property: &Property) -> Value {
    json!({ "name": property.name, "attributes": property.attributes })
}

/// Encodes an entry as the one-element array the create endpoint expects.
pub fn encode_log_entry(entry: &LogEntry) -> Value {
    let logbooks: Vec<Value> = entry.logbooks.iter().map(encode_logbook).collect();
    let tags: Vec<Value> = entry.tags.iter().map(encode_tag).collect();
    let properties: Vec<Value> = entry.properties.iter().map(encode_property).collect();
    json!([{
        "description": entry.text,
        "owner": entry.owner,
        "level": LEVEL,
        "logbooks": logbooks,
        "tags": tags,
        "properties": properties,
    }])
}

/// `None` for `null` or `{}`; otherwise the object, if it is one.
fn object_or_empty<'a>(entity: &str, value: &'a Value) -> Result<Option<&'a Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(OlogError::malformed(
            entity,
            format!("expected an object, got {}", kind(other)),
        )),
    }
}

fn require(entity: &str, obj: &Map<String, Value>, keys: &[&str]) -> Result<()> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|k| !obj.contains_key(**k))
        .map(|k| k.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OlogError::Decode {
            entity: entity.to_string(),
            missing,
        })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn string(entity: &str, obj: &Map<String, Value>, key: &str) -> Result<String> {
    match &obj[key] {
        Value::String(s) => Ok(s.clone()),
        other => Err(OlogError::malformed(
            entity,
            format!("`{key}` must be a string, got {}", kind(other)),
        )),
    }
}

fn optional_string(entity: &str, obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match &obj[key] {
        Value::Null => Ok(None),
        _ => string(entity, obj, key).map(Some),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn id(entity: &str, value: &Value) -> Result<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| OlogError::malformed(entity, format!("`id` {n} is not a positive integer"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OlogError::malformed(entity, format!("`id` {s:?} is not numeric"))),
        other => Err(OlogError::malformed(
            entity,
            format!("`id` must be a number, got {}", kind(other)),
        )),
    }
}

/// Olog reports dates as epoch milliseconds; RFC 3339 strings are accepted too.
fn timestamp(entity: &str, key: &str, value: &Value) -> Result<Option<DateTime<Utc>>> {
    let bad = || OlogError::malformed(entity, format!("`{key}` is not a timestamp: {value}"));
    let from_millis = |ms: i64| DateTime::from_timestamp_millis(ms).ok_or_else(bad);
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).ok_or_else(bad)?;
            from_millis(ms).map(Some)
        }
        Value::String(s) => {
            if let Ok(ms) = s.trim().parse::<i64>() {
                return from_millis(ms).map(Some);
            }
            DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| bad())
        }
        _ => Err(bad()),
    }
}

fn list<'a>(entity: &str, key: &str, value: &'a Value) -> Result<&'a [Value]> {
    match value {
        Value::Null => Ok(&[]),
        Value::Array(items) => Ok(items),
        other => Err(OlogError::malformed(
            entity,
            format!("`{key}` must be an array, got {}", kind(other)),
        )),
    }
}

/// Re-labels an error from a nested element so it points at where it sits.
fn nested(err: OlogError, outer: &str, key: &str, index: usize) -> OlogError {
    let at = |inner: String| format!("{inner} at {outer}.{key}[{index}]");
    match err {
        OlogError::Decode { entity, missing } => OlogError::Decode {
            entity: at(entity),
            missing,
        },
        OlogError::Malformed { entity, detail } => OlogError::Malformed {
            entity: at(entity),
            detail,
        },
        other => other,
    }
}

fn decode_each<T>(
    outer: &str,
    key: &str,
    value: &Value,
    decode: impl Fn(&Value) -> Result<Option<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (i, item) in list(outer, key, value)?.iter().enumerate() {
        if let Some(v) = decode(item).map_err(|e| nested(e, outer, key, i))? {
            out.push(v);
        }
    }
    Ok(out)
}

pub fn decode_logbook(value: &Value) -> Result<Option<Logbook>> {
    const ENTITY: &str = "logbook";
    let Some(obj) = object_or_empty(ENTITY, value)? else {
        return Ok(None);
    };
    require(ENTITY, obj, &["name", "owner"])?;
    Ok(Some(Logbook {
        name: string(ENTITY, obj, "name")?,
        owner: optional_string(ENTITY, obj, "owner")?,
    }))
}

pub fn decode_tag(value: &Value) -> Result<Option<Tag>> {
    const ENTITY: &str = "tag";
    let Some(obj) = object_or_empty(ENTITY, value)? else {
        return Ok(None);
    };
    require(ENTITY, obj, &["name", "state"])?;
    let state = match &obj["state"] {
        Value::String(s) => s.clone(),
        Value::Bool(true) => TAG_ACTIVE.to_string(),
        Value::Bool(false) => TAG_INACTIVE.to_string(),
        other => {
            return Err(OlogError::malformed(
                ENTITY,
                format!("`state` must be a string or boolean, got {}", kind(other)),
            ))
        }
    };
    Ok(Some(Tag {
        name: string(ENTITY, obj, "name")?,
        state,
    }))
}

pub fn decode_property(value: &Value) -> Result<Option<Property>> {
    const ENTITY: &str = "property";
    let Some(obj) = object_or_empty(ENTITY, value)? else {
        return Ok(None);
    };
    require(ENTITY, obj, &["name", "attributes"])?;
    let mut attributes = BTreeMap::new();
    match &obj["attributes"] {
        Value::Null => {}
        Value::Object(map) => {
            for (k, v) in map {
                let v = scalar_to_string(v).ok_or_else(|| {
                    OlogError::malformed(ENTITY, format!("attribute `{k}` is {}", kind(v)))
                })?;
                attributes.insert(k.clone(), v);
            }
        }
        other => {
            return Err(OlogError::malformed(
                ENTITY,
                format!("`attributes` must be an object, got {}", kind(other)),
            ))
        }
    }
    Ok(Some(Property {
        name: string(ENTITY, obj, "name")?,
        attributes,
    }))
}

const LOG_ENTRY_KEYS: [&str; 8] = [
    "description",
    "owner",
    "logbooks",
    "tags",
    "properties",
    "id",
    "createdDate",
    "modifiedDate",
];

pub fn decode_log_entry(value: &Value) -> Result<LogEntry> {
    const ENTITY: &str = "log entry";
    let obj = match value {
        Value::Object(map) => map,
        other => {
            return Err(OlogError::malformed(
                ENTITY,
                format!("expected an object, got {}", kind(other)),
            ))
        }
    };
    require(ENTITY, obj, &LOG_ENTRY_KEYS)?;
    Ok(LogEntry {
        id: id(ENTITY, &obj["id"])?,
        create_time: timestamp(ENTITY, "createdDate", &obj["createdDate"])?,
        modify_time: timestamp(ENTITY, "modifiedDate", &obj["modifiedDate"])?,
        text: optional_string(ENTITY, obj, "description")?.unwrap_or_default(),
        owner: optional_string(ENTITY, obj, "owner")?,
        logbooks: decode_each(ENTITY, "logbooks", &obj["logbooks"], decode_logbook)?,
        tags: decode_each(ENTITY, "tags", &obj["tags"], decode_tag)?,
        properties: decode_each(ENTITY, "properties", &obj["properties"], decode_property)?,
        attachments: Vec::new(),
    })
}

/// The create endpoint answers with an array whose first element is the
/// stored entry.
pub fn decode_created_entry(value: &Value) -> Result<LogEntry> {
    let items = list("created log entry", "response", value)?;
    let first = items
        .first()
        .ok_or_else(|| OlogError::malformed("created log entry", "response array is empty"))?;
    decode_log_entry(first)
}

pub fn decode_log_entries(value: &Value) -> Result<Vec<LogEntry>> {
    decode_each("search result", "logs", value, |v| decode_log_entry(v).map(Some))
}

/// Unwraps a `{"<key>": [...]}` collection envelope. A lone object in place of
/// the array is treated as a one-element list.
fn envelope<'a>(entity: &str, key: &str, value: &'a Value) -> Result<Vec<&'a Value>> {
    let obj = match value {
        Value::Object(map) => map,
        other => {
            return Err(OlogError::malformed(
                entity,
                format!("expected an object, got {}", kind(other)),
            ))
        }
    };
    require(entity, obj, &[key])?;
    Ok(match &obj[key] {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    })
}

fn decode_envelope<T>(
    entity: &str,
    key: &str,
    value: &Value,
    decode: impl Fn(&Value) -> Result<Option<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (i, item) in envelope(entity, key, value)?.into_iter().enumerate() {
        if let Some(v) = decode(item).map_err(|e| nested(e, entity, key, i))? {
            out.push(v);
        }
    }
    Ok(out)
}

pub fn decode_logbooks(value: &Value) -> Result<Vec<Logbook>> {
    decode_envelope("logbook list", "logbook", value, decode_logbook)
}

pub fn decode_tags(value: &Value) -> Result<Vec<Tag>> {
    decode_envelope("tag list", "tag", value, decode_tag)
}

pub fn decode_properties(value: &Value) -> Result<Vec<Property>> {
    decode_envelope("property list", "property", value, decode_property)
}

/// File names from an attachment listing.
pub fn decode_attachment_names(value: &Value) -> Result<Vec<String>> {
    decode_envelope("attachment list", "attachment", value, |item| {
        const ENTITY: &str = "attachment";
        let Some(obj) = object_or_empty(ENTITY, item)? else {
            return Ok(None);
        };
        require(ENTITY, obj, &["fileName"])?;
        string(ENTITY, obj, "fileName").map(Some)
    })
}
