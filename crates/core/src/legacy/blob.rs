//! Turning a raw `identities` preference into [`LegacyIdentity`] records.
//!
//! The preference is normally PHP-serialized. A JSON array or object with the
//! same fields is accepted as well.

use tracing::debug;

use super::php::{self, PhpKey, PhpValue};
use crate::errors::DecodeError;
use crate::models::LegacyIdentity;

/// Decode the identity list stored in a preference value.
///
/// An empty value, `N;` and `null` all decode to an empty list. Records keep
/// the order they were stored in.
pub fn decode_identities(raw: &[u8]) -> Result<Vec<LegacyIdentity>, DecodeError> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value = match trimmed[0] {
        b'[' | b'{' => from_json(serde_json::from_slice(trimmed)?),
        _ => php::unserialize(trimmed)?,
    };

    let entries = match value {
        PhpValue::Null => return Ok(Vec::new()),
        PhpValue::Array(entries) => entries,
        other => {
            return Err(DecodeError::Shape(format!(
                "expected an array of identities, found {}",
                other.type_name()
            )))
        }
    };

    let identities = entries
        .iter()
        .map(|(key, entry)| identity_from_entry(key, entry))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(count = identities.len(), "decoded legacy identities");
    Ok(identities)
}

fn identity_from_entry(key: &PhpKey, entry: &PhpValue) -> Result<LegacyIdentity, DecodeError> {
    if !matches!(entry, PhpValue::Array(_)) {
        return Err(DecodeError::Shape(format!(
            "identity {} is a {}, not an array",
            key_label(key),
            entry.type_name()
        )));
    }

    let text = |field: &str| -> Result<Option<String>, DecodeError> {
        match entry.get(field) {
            None | Some(PhpValue::Null) => Ok(None),
            Some(PhpValue::Str(s)) => Ok(Some(s.clone())),
            Some(PhpValue::Int(i)) => Ok(Some(i.to_string())),
            Some(PhpValue::Float(f)) => Ok(Some(f.to_string())),
            Some(PhpValue::Bool(b)) => Ok(Some(if *b { "1".into() } else { String::new() })),
            Some(PhpValue::Array(_)) => Err(DecodeError::Shape(format!(
                "field '{}' of identity {} is an array",
                field,
                key_label(key)
            ))),
        }
    };

    Ok(LegacyIdentity {
        id: text("id")?.unwrap_or_default(),
        default_identity: entry
            .get("default_identity")
            .map(PhpValue::is_truthy)
            .unwrap_or(false),
        fullname: text("fullname")?.unwrap_or_default(),
        from_addr: text("from_addr")?,
        replyto_addr: text("replyto_addr")?,
        signature: text("signature")?.unwrap_or_default(),
    })
}

fn key_label(key: &PhpKey) -> String {
    match key {
        PhpKey::Int(i) => i.to_string(),
        PhpKey::Str(s) => format!("'{}'", s),
    }
}

/// Map a JSON document onto the PHP value model. Objects become
/// string-keyed arrays, JSON arrays become int-keyed arrays.
fn from_json(value: serde_json::Value) -> PhpValue {
    use serde_json::Value;

    match value {
        Value::Null => PhpValue::Null,
        Value::Bool(b) => PhpValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PhpValue::Int(i),
            None => PhpValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => PhpValue::Str(s),
        Value::Array(items) => PhpValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (PhpKey::Int(i as i64), from_json(v)))
                .collect(),
        ),
        Value::Object(map) => PhpValue::Array(
            map.into_iter()
                .map(|(k, v)| (PhpKey::Str(k), from_json(v)))
                .collect(),
        ),
    }
}
