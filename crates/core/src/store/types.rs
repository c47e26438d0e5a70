use std::fmt;

use serde_json::{Map, Value};

use super::{Condition, Result, StoreError};

/// Attribute map of a persisted item.
pub type Attributes = Map<String, Value>;

/// Names of the attributes that make up a table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub hash_key: String,
    pub range_key: Option<String>,
}

impl KeySchema {
    /// Creates a hash-only key schema.
    pub fn new(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
        }
    }

    /// Adds a range (sort) key attribute.
    pub fn with_range_key(mut self, range_key: impl Into<String>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    /// Extracts the primary key from an item's attributes.
    pub fn key_of(&self, attributes: &Attributes) -> Result<ItemKey> {
        let hash = attributes.get(&self.hash_key).cloned().ok_or_else(|| {
            StoreError::InvalidData(format!("Missing hash key attribute: {}", self.hash_key))
        })?;

        let range = match &self.range_key {
            Some(name) => Some(attributes.get(name).cloned().ok_or_else(|| {
                StoreError::InvalidData(format!("Missing range key attribute: {}", name))
            })?),
            None => None,
        };

        Ok(ItemKey { hash, range })
    }

    /// Renders a key as an attribute map under this schema's names.
    pub fn key_attributes(&self, key: &ItemKey) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(self.hash_key.clone(), key.hash.clone());
        if let (Some(name), Some(value)) = (&self.range_key, &key.range) {
            attributes.insert(name.clone(), value.clone());
        }
        attributes
    }

    /// Returns true if `name` is one of the key attributes.
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.hash_key == name || self.range_key.as_deref() == Some(name)
    }
}

/// Primary key values of a single item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemKey {
    pub hash: Value,
    pub range: Option<Value>,
}

impl ItemKey {
    /// Creates a hash-only key.
    pub fn new(hash: impl Into<Value>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    /// Adds a range key value.
    pub fn with_range(mut self, range: impl Into<Value>) -> Self {
        self.range = Some(range.into());
        self
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}, {}", display_value(&self.hash), display_value(range)),
            None => write!(f, "{}", display_value(&self.hash)),
        }
    }
}

/// Formats a value without JSON quoting for strings.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An item as held by the store: its fixed primary key plus its attributes.
///
/// The key is captured when the item is created or loaded and does not
/// follow later attribute changes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreItem {
    key: ItemKey,
    attributes: Attributes,
}

impl StoreItem {
    pub fn new(key: ItemKey, attributes: Attributes) -> Self {
        Self { key, attributes }
    }

    /// Builds an item from raw attributes, reading the key through `schema`.
    pub fn from_attributes(schema: &KeySchema, attributes: Attributes) -> Result<Self> {
        let key = schema.key_of(&attributes)?;
        Ok(Self { key, attributes })
    }

    pub fn key(&self) -> &ItemKey {
        &self.key
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Replaces every attribute, keeping the key.
    pub fn replace_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }

    /// Attributes to write, with the fixed key overlaid under the schema's names.
    pub fn to_persisted(&self, schema: &KeySchema) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.extend(schema.key_attributes(&self.key));
        attributes
    }
}

/// Options for a point lookup.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub consistent_read: bool,
    pub attributes_to_get: Option<Vec<String>>,
}

/// Options for a query against one hash key.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub range_key_condition: Option<Condition>,
    pub filter_condition: Option<Condition>,
    pub consistent_read: bool,
    pub index_name: Option<String>,
    pub scan_index_forward: Option<bool>,
    pub limit: Option<usize>,
    pub last_evaluated_key: Option<Attributes>,
    pub attributes_to_get: Option<Vec<String>>,
    pub page_size: Option<usize>,
    /// Consumed capacity units per second.
    pub rate_limit: Option<f64>,
}

/// Options for a full table (or index) scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub filter_condition: Option<Condition>,
    pub segment: Option<u32>,
    pub total_segments: Option<u32>,
    pub limit: Option<usize>,
    pub last_evaluated_key: Option<Attributes>,
    pub page_size: Option<usize>,
    pub consistent_read: bool,
    pub index_name: Option<String>,
    /// Consumed capacity units per second.
    pub rate_limit: Option<f64>,
    pub attributes_to_get: Option<Vec<String>>,
}

/// Options for a filtered count.
#[derive(Debug, Clone, Default)]
pub struct CountOptions {
    pub range_key_condition: Option<Condition>,
    pub filter_condition: Option<Condition>,
    pub consistent_read: bool,
    pub index_name: Option<String>,
    pub limit: Option<usize>,
    /// Consumed capacity units per second.
    pub rate_limit: Option<f64>,
}

/// Per-page request parameters produced by the pagination driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub exclusive_start_key: Option<Attributes>,
    pub limit: Option<usize>,
}

/// One page of results from a query, scan or count.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<StoreItem>,
    /// Number of matching items in this page (equals `items.len()` unless
    /// the page came from a count request).
    pub count: usize,
    pub last_evaluated_key: Option<Attributes>,
    pub consumed_capacity: f64,
}

impl Page {
    /// Creates a page holding `items`.
    pub fn of_items(items: Vec<StoreItem>, last_evaluated_key: Option<Attributes>) -> Self {
        Self {
            count: items.len(),
            items,
            last_evaluated_key,
            consumed_capacity: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_of_hash_only() {
        let schema = KeySchema::new("id");
        let key = schema.key_of(&attrs(json!({"id": "abc", "name": "x"}))).unwrap();
        assert_eq!(key, ItemKey::new("abc"));
    }

    #[test]
    fn test_key_of_with_range() {
        let schema = KeySchema::new("PK").with_range_key("SK");
        let key = schema
            .key_of(&attrs(json!({"PK": "USER#1", "SK": "PROFILE"})))
            .unwrap();
        assert_eq!(key, ItemKey::new("USER#1").with_range("PROFILE"));
    }

    #[test]
    fn test_key_of_missing_range_attribute() {
        let schema = KeySchema::new("PK").with_range_key("SK");
        let err = schema.key_of(&attrs(json!({"PK": "USER#1"}))).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidData("Missing range key attribute: SK".to_string())
        );
    }

    #[test]
    fn test_item_key_display() {
        assert_eq!(ItemKey::new("abc").to_string(), "abc");
        assert_eq!(ItemKey::new("abc").with_range(7).to_string(), "abc, 7");
    }

    #[test]
    fn test_to_persisted_overlays_fixed_key() {
        let schema = KeySchema::new("id");
        let mut item = StoreItem::new(ItemKey::new("abc"), attrs(json!({"id": "abc"})));
        item.set("id", json!("changed"));
        item.set("quantity", json!(5));

        let persisted = item.to_persisted(&schema);
        assert_eq!(persisted.get("id"), Some(&json!("abc")));
        assert_eq!(persisted.get("quantity"), Some(&json!(5)));
    }

    #[test]
    fn test_is_key_attribute() {
        let schema = KeySchema::new("PK").with_range_key("SK");
        assert!(schema.is_key_attribute("PK"));
        assert!(schema.is_key_attribute("SK"));
        assert!(!schema.is_key_attribute("name"));
    }
}
