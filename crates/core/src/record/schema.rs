//! The schema side of a bound record.
//!
//! Any serde type can act as a schema: serialization is the field export,
//! deserialization is validated construction, and assignment is an
//! export/replace/re-deserialize round trip so field types are enforced on
//! every write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{BindingError, Result};
use crate::store::Attributes;

/// A validated record type.
pub trait Schema: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// `(field, alias)` pairs. Aliases are used when exporting by alias and
    /// are accepted in place of field names when constructing from an item.
    fn aliases() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Default field values, compared against when exporting with
    /// `exclude_defaults`.
    fn field_defaults() -> Attributes {
        Attributes::new()
    }
}

/// Schemaless documents: every attribute is a field.
impl Schema for Map<String, Value> {}

/// Exports a record's fields.
pub fn to_fields<S: Schema>(record: &S) -> Result<Attributes> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(BindingError::Serialization(format!(
            "Record must serialize to an object, got: {}",
            other
        ))),
        Err(e) => Err(BindingError::Serialization(e.to_string())),
    }
}

/// Builds a record from field values, validating every field.
pub fn from_fields<S: Schema>(fields: Attributes) -> Result<S> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| BindingError::Validation {
        field: String::new(),
        message: e.to_string(),
    })
}

/// Builds a record from an arbitrary attribute map, accepting aliases and
/// ignoring attributes that are not fields.
pub fn from_object<S: Schema>(attributes: &Attributes) -> Result<S> {
    let mut fields = attributes.clone();
    for (field, alias) in S::aliases() {
        if !fields.contains_key(*field) {
            if let Some(value) = fields.remove(*alias) {
                fields.insert((*field).to_string(), value);
            }
        }
    }
    from_fields(fields)
}

/// Validated assignment of one field.
///
/// Returns the updated record and the field's value as the schema stored it
/// (after any coercion). Fails with `UnknownField` when the schema dropped the
/// assignment.
pub fn assign<S: Schema>(record: &S, name: &str, value: Value) -> Result<(S, Value)> {
    let mut fields = to_fields(record)?;
    let is_null = value.is_null();
    fields.insert(name.to_string(), value);

    let updated: S =
        serde_json::from_value(Value::Object(fields)).map_err(|e| BindingError::Validation {
            field: name.to_string(),
            message: e.to_string(),
        })?;

    let exported = to_fields(&updated)?;
    match exported.get(name) {
        Some(stored) => Ok((updated, stored.clone())),
        None if is_null => Ok((updated, Value::Null)),
        None => Err(BindingError::UnknownField(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: String,
        #[serde(default)]
        quantity: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(default)]
        price: f64,
    }

    impl Schema for Product {
        fn aliases() -> &'static [(&'static str, &'static str)] {
            &[("id", "productId")]
        }
    }

    fn product() -> Product {
        Product {
            id: "abc".to_string(),
            quantity: 1,
            note: None,
            price: 2.5,
        }
    }

    #[test]
    fn test_assign_valid_value() {
        let (updated, stored) = assign(&product(), "quantity", json!(5)).unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(stored, json!(5));
    }

    #[test]
    fn test_assign_coerces_through_schema() {
        let (updated, stored) = assign(&product(), "price", json!(3)).unwrap();
        assert_eq!(updated.price, 3.0);
        assert_eq!(stored, json!(3.0));
    }

    #[test]
    fn test_assign_rejects_wrong_type() {
        let err = assign(&product(), "quantity", json!("five")).unwrap_err();
        assert!(matches!(err, BindingError::Validation { field, .. } if field == "quantity"));
    }

    #[test]
    fn test_assign_rejects_unknown_field() {
        let err = assign(&product(), "colour", json!("red")).unwrap_err();
        assert_eq!(err, BindingError::UnknownField("colour".to_string()));
    }

    #[test]
    fn test_assign_null_to_skipped_optional() {
        let mut with_note = product();
        with_note.note = Some("fragile".to_string());
        let (updated, stored) = assign(&with_note, "note", Value::Null).unwrap();
        assert_eq!(updated.note, None);
        assert_eq!(stored, Value::Null);
    }

    #[test]
    fn test_from_object_accepts_alias_and_ignores_extra() {
        let attributes = json!({"productId": "xyz", "quantity": 3, "PK": "PRODUCT#xyz"});
        let product: Product = from_object(attributes.as_object().unwrap()).unwrap();
        assert_eq!(product.id, "xyz");
        assert_eq!(product.quantity, 3);
    }

    #[test]
    fn test_document_schema_accepts_any_field() {
        let doc: Map<String, Value> = Map::new();
        let (updated, stored) = assign(&doc, "anything", json!([1, 2])).unwrap();
        assert_eq!(updated.get("anything"), Some(&json!([1, 2])));
        assert_eq!(stored, json!([1, 2]));
    }
}
