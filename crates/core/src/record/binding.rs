use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Derives a key from a record: `(context_label, seed, record) -> (name, value)`.
pub type KeyFn<S> = Arc<dyn Fn(&str, &str, &S) -> (String, Value) + Send + Sync>;

/// Maps one field toward the store: `(field, value, record) -> (name, value)`.
pub type FieldFn<S> = Arc<dyn Fn(&str, &Value, &S) -> (String, Value) + Send + Sync>;

/// How a hash or range key is obtained from a record.
pub enum KeySpec<S> {
    /// The key is the value of this field.
    Field(String),
    /// The key is computed from the whole record.
    Derived(KeyFn<S>),
}

impl<S> KeySpec<S> {
    pub fn field(name: impl Into<String>) -> Self {
        KeySpec::Field(name.into())
    }

    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &S) -> (String, Value) + Send + Sync + 'static,
    {
        KeySpec::Derived(Arc::new(f))
    }
}

impl<S> Clone for KeySpec<S> {
    fn clone(&self) -> Self {
        match self {
            KeySpec::Field(name) => KeySpec::Field(name.clone()),
            KeySpec::Derived(f) => KeySpec::Derived(Arc::clone(f)),
        }
    }
}

impl<S> fmt::Debug for KeySpec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Field(name) => f.debug_tuple("Field").field(name).finish(),
            KeySpec::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl<S> From<&str> for KeySpec<S> {
    fn from(name: &str) -> Self {
        KeySpec::Field(name.to_string())
    }
}

impl<S> From<String> for KeySpec<S> {
    fn from(name: String) -> Self {
        KeySpec::Field(name)
    }
}

/// Store-side mapping of one record field.
pub enum KeyRemap<S> {
    /// Store the value under another attribute name.
    Rename(String),
    /// Compute the stored name and value.
    Transform(FieldFn<S>),
}

impl<S> KeyRemap<S> {
    /// Resolves the attribute name and value stored for `field`.
    pub fn apply(&self, field: &str, value: &Value, record: &S) -> (String, Value) {
        match self {
            KeyRemap::Rename(target) => (target.clone(), value.clone()),
            KeyRemap::Transform(f) => f(field, value, record),
        }
    }
}

impl<S> Clone for KeyRemap<S> {
    fn clone(&self) -> Self {
        match self {
            KeyRemap::Rename(target) => KeyRemap::Rename(target.clone()),
            KeyRemap::Transform(f) => KeyRemap::Transform(Arc::clone(f)),
        }
    }
}

impl<S> fmt::Debug for KeyRemap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRemap::Rename(target) => f.debug_tuple("Rename").field(target).finish(),
            KeyRemap::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// How a record type is bound to its store items.
pub struct Binding<S> {
    hash_key: KeySpec<S>,
    range_key: Option<KeySpec<S>>,
    key_remap: BTreeMap<String, KeyRemap<S>>,
    computed_keys: BTreeMap<String, FieldFn<S>>,
    auto_sync: bool,
}

impl<S> Binding<S> {
    /// Creates a binding keyed by `hash_key` only.
    pub fn new(hash_key: impl Into<KeySpec<S>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
            key_remap: BTreeMap::new(),
            computed_keys: BTreeMap::new(),
            auto_sync: false,
        }
    }

    pub fn with_range_key(mut self, range_key: impl Into<KeySpec<S>>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    /// Stores `field` under `target` instead.
    pub fn rename(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.key_remap
            .insert(field.into(), KeyRemap::Rename(target.into()));
        self
    }

    /// Stores `field` as whatever `f` returns.
    pub fn transform<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &Value, &S) -> (String, Value) + Send + Sync + 'static,
    {
        self.key_remap
            .insert(field.into(), KeyRemap::Transform(Arc::new(f)));
        self
    }

    /// Adds a store-only attribute computed whenever `trigger` is written.
    pub fn computed<F>(mut self, trigger: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &Value, &S) -> (String, Value) + Send + Sync + 'static,
    {
        self.computed_keys.insert(trigger.into(), Arc::new(f));
        self
    }

    /// Persist the backing item after every field write.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    pub fn hash_key(&self) -> &KeySpec<S> {
        &self.hash_key
    }

    pub fn range_key(&self) -> Option<&KeySpec<S>> {
        self.range_key.as_ref()
    }

    pub fn key_remap(&self) -> &BTreeMap<String, KeyRemap<S>> {
        &self.key_remap
    }

    pub fn computed_keys(&self) -> &BTreeMap<String, FieldFn<S>> {
        &self.computed_keys
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    /// Resolves the store attribute for a field write; unmapped fields pass through.
    pub fn remap_field(&self, field: &str, value: &Value, record: &S) -> (String, Value) {
        match self.key_remap.get(field) {
            Some(remap) => remap.apply(field, value, record),
            None => (field.to_string(), value.clone()),
        }
    }

    /// Computes the extra attribute triggered by `field`, if any.
    pub fn computed_field(&self, field: &str, value: &Value, record: &S) -> Option<(String, Value)> {
        self.computed_keys
            .get(field)
            .map(|compute| compute(field, value, record))
    }
}

impl<S> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("hash_key", &self.hash_key)
            .field("range_key", &self.range_key)
            .field("key_remap", &self.key_remap)
            .field(
                "computed_keys",
                &self.computed_keys.keys().collect::<Vec<_>>(),
            )
            .field("auto_sync", &self.auto_sync)
            .finish()
    }
}
