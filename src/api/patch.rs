//! Partial updates: fields present in the request replace stored values,
//! an explicit `null` clears an optional field, absent fields are kept.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::error::{ApiError, ResultExt};

/// Apply a JSON patch object to the editable fields of a resource.
/// Keys that are not fields of `T` are ignored.
pub fn apply_patch<T>(current: &T, patch: &Map<String, Value>) -> Result<T, ApiError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(current).db_err("Failed to serialize fields")?;
    let Some(object) = value.as_object_mut() else {
        return Err(ApiError::internal("Fields are not an object"));
    };

    for (key, new_value) in patch {
        if let Some(slot) = object.get_mut(key) {
            *slot = new_value.clone();
        }
    }

    serde_json::from_value(value)
        .map_err(|e| ApiError::unprocessable(format!("Invalid update: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Fields {
        name: String,
        note: Option<String>,
        count: i64,
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_present_fields_replace() {
        let current = Fields {
            name: "a".into(),
            note: Some("n".into()),
            count: 1,
        };
        let updated = apply_patch(&current, &patch(json!({ "count": 5 }))).unwrap();
        assert_eq!(
            updated,
            Fields {
                name: "a".into(),
                note: Some("n".into()),
                count: 5
            }
        );
    }

    #[test]
    fn test_null_clears_optional() {
        let current = Fields {
            name: "a".into(),
            note: Some("n".into()),
            count: 1,
        };
        let updated = apply_patch(&current, &patch(json!({ "note": null }))).unwrap();
        assert_eq!(updated.note, None);
    }

    #[test]
    fn test_unknown_keys_ignored_and_bad_types_rejected() {
        let current = Fields {
            name: "a".into(),
            note: None,
            count: 1,
        };
        let updated = apply_patch(&current, &patch(json!({ "id": "x", "owner": 3 }))).unwrap();
        assert_eq!(updated, current);

        let err = apply_patch(&current, &patch(json!({ "name": null }))).unwrap_err();
        assert!(matches!(err, ApiError::Unprocessable(_)));
    }
}
