//! Conversion between Firestore's typed JSON values and plain values.

use serde_json::{Map, Value, json};

use crate::services::document_store::FieldValue;

/// Encodes a field for a write. `ServerTimestamp` has no value encoding; it
/// is sent as a field transform instead, so this returns `None` for it.
pub fn encode_value(value: &FieldValue) -> Option<Value> {
    let encoded = match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) if d.is_finite() => json!({ "doubleValue": d }),
        FieldValue::Double(d) => {
            let text = if d.is_nan() {
                "NaN"
            } else if d.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            json!({ "doubleValue": text })
        }
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::ServerTimestamp => return None,
    };
    Some(encoded)
}

/// Decodes a Firestore value into plain JSON. Integers become numbers,
/// timestamps and references become strings, maps become objects.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // NaN / Infinity come through as strings and are not usable numbers.
            _ => Value::Null,
        },
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" => inner.clone(),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_else(|| Value::Object(Map::new())),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Decodes a document's `fields` map into a plain JSON object.
pub fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), decode_value(v)))
            .collect(),
    )
}
