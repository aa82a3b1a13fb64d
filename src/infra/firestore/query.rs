//! Request bodies for the Firestore REST API.

use serde_json::{Map, Value, json};

use crate::error::StoreError;
use crate::infra::firestore::value::encode_value;
use crate::services::document_store::{DocumentWrite, FieldValue};
use crate::services::pass_store::QueryStrategy;

/// Position after the last document of the previous page.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Full resource name of the last document.
    pub name: String,
    /// Its raw `eventTimeMs` value, needed when ordering by time.
    pub event_time: Option<Value>,
}

fn field_filter(field: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value
        }
    })
}

fn order(field: &str) -> Value {
    json!({ "field": { "fieldPath": field }, "direction": "ASCENDING" })
}

/// Builds a `runQuery` body for one page of passes.
pub fn pass_query(
    collection: &str,
    city_id: &str,
    strategy: QueryStrategy,
    cutoff_ms: f64,
    page_size: usize,
    cursor: Option<&Cursor>,
) -> Value {
    let city_filter = field_filter("cityId", "EQUAL", json!({ "stringValue": city_id }));

    let (filter, order_by, cursor_values) = match strategy {
        QueryStrategy::IndexedWindow => {
            let window = field_filter(
                "eventTimeMs",
                "GREATER_THAN_OR_EQUAL",
                json!({ "doubleValue": cutoff_ms }),
            );
            let filter = json!({
                "compositeFilter": { "op": "AND", "filters": [city_filter, window] }
            });
            let values = cursor.map(|c| {
                vec![
                    c.event_time.clone().unwrap_or(json!({ "nullValue": null })),
                    json!({ "referenceValue": c.name }),
                ]
            });
            (filter, vec![order("eventTimeMs"), order("__name__")], values)
        }
        QueryStrategy::CityScan => {
            let values = cursor.map(|c| vec![json!({ "referenceValue": c.name })]);
            (city_filter, vec![order("__name__")], values)
        }
    };

    let mut query = json!({
        "from": [{ "collectionId": collection }],
        "where": filter,
        "orderBy": order_by,
        "limit": page_size
    });
    if let Some(values) = cursor_values {
        query["startAt"] = json!({ "values": values, "before": false });
    }

    json!({ "structuredQuery": query })
}

/// Builds a `commit` body of merge-upserts.
///
/// Each write carries an `updateMask` of exactly its fields, so fields not
/// named are left alone; `ServerTimestamp` fields become `REQUEST_TIME`
/// transforms.
pub fn commit_body(documents_root: &str, writes: &[DocumentWrite]) -> Result<Value, StoreError> {
    let mut encoded = Vec::with_capacity(writes.len());

    for write in writes {
        validate_path(&write.path)?;

        let mut fields = Map::new();
        let mut mask = Vec::new();
        let mut transforms = Vec::new();

        for (key, value) in &write.fields {
            match encode_value(value) {
                Some(v) => {
                    fields.insert(key.clone(), v);
                    mask.push(Value::String(key.clone()));
                }
                None => {
                    debug_assert_eq!(value, &FieldValue::ServerTimestamp);
                    transforms.push(json!({
                        "fieldPath": key,
                        "setToServerValue": "REQUEST_TIME"
                    }));
                }
            }
        }

        let mut entry = json!({
            "update": {
                "name": format!("{documents_root}/{}", write.path_string()),
                "fields": fields
            },
            "updateMask": { "fieldPaths": mask }
        });
        if !transforms.is_empty() {
            entry["updateTransforms"] = Value::Array(transforms);
        }
        encoded.push(entry);
    }

    Ok(json!({ "writes": encoded }))
}

/// A document path alternates collection and document ids, so it has an
/// even number of non-empty segments without `/`.
fn validate_path(path: &[String]) -> Result<(), StoreError> {
    if path.is_empty() || path.len() % 2 != 0 {
        return Err(StoreError::InvalidRequest(format!(
            "'{}' is not a document path",
            path.join("/")
        )));
    }
    if let Some(bad) = path.iter().find(|s| s.is_empty() || s.contains('/')) {
        return Err(StoreError::InvalidRequest(format!(
            "invalid path segment '{bad}'"
        )));
    }
    Ok(())
}
