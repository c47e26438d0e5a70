//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB `AttributeValue` maps and
//! JSON attribute maps. These are testable in isolation without DynamoDB access.
//!
//! JSON has no set or binary types, so string, number and binary sets read
//! back as arrays and binary values read back as base64 strings.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Number, Value};

use boundrecord_core::store::{Attributes, ItemKey, KeySchema, StoreError};

/// A DynamoDB item.
pub type Item = HashMap<String, AttributeValue>;

/// Convert a JSON value to a DynamoDB attribute value.
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

/// Convert a JSON array to a DynamoDB set, for `ADD` on set attributes.
///
/// Arrays of strings become string sets and arrays of numbers become number
/// sets; anything else is converted as a plain value.
pub fn to_set_value(value: &Value) -> AttributeValue {
    let Value::Array(values) = value else {
        return to_attribute_value(value);
    };
    if values.is_empty() {
        return to_attribute_value(value);
    }
    if let Some(strings) = values
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return AttributeValue::Ss(strings);
    }
    if let Some(numbers) = values
        .iter()
        .map(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        return AttributeValue::Ns(numbers);
    }
    to_attribute_value(value)
}

/// Convert a DynamoDB attribute value to a JSON value.
pub fn from_attribute_value(value: &AttributeValue) -> Result<Value, StoreError> {
    match value {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::B(blob) => Ok(Value::String(STANDARD.encode(blob.as_ref()))),
        AttributeValue::Ss(strings) => Ok(Value::Array(
            strings.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(numbers) => numbers
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::Bs(blobs) => Ok(Value::Array(
            blobs
                .iter()
                .map(|blob| Value::String(STANDARD.encode(blob.as_ref())))
                .collect(),
        )),
        AttributeValue::L(values) => values
            .iter()
            .map(from_attribute_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(map) => item_to_attributes(map).map(Value::Object),
        other => Err(StoreError::InvalidData(format!(
            "Unsupported attribute value: {:?}",
            other
        ))),
    }
}

fn parse_number(n: &str) -> Result<Value, StoreError> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::Number(u.into()));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StoreError::InvalidData(format!("Invalid number attribute: {}", n)))
}

/// Convert a DynamoDB item to an attribute map.
pub fn item_to_attributes(item: &Item) -> Result<Attributes, StoreError> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute_value(value)?)))
        .collect()
}

/// Convert an attribute map to a DynamoDB item.
pub fn attributes_to_item(attributes: &Attributes) -> Item {
    attributes
        .iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Build the DynamoDB key map for `key`.
pub fn key_to_item(schema: &KeySchema, key: &ItemKey) -> Item {
    attributes_to_item(&schema.key_attributes(key))
}
