//! Key derivation.
//!
//! Pure functions: a key spec plus a record yields a `(name, value)` pair.

use serde_json::Value;

use super::schema::{self, Schema};
use super::{Binding, BindingError, KeySpec, Result};

/// Context label passed to derived hash-key functions.
pub const HASH_KEY_LABEL: &str = "hash_key";

/// Context label passed to derived range-key functions.
pub const RANGE_KEY_LABEL: &str = "";

/// A derived key: the attribute name it claims and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyVal {
    pub name: String,
    pub value: Value,
}

/// Derives a key from `record` according to `spec`.
pub fn derive_key<S: Schema>(spec: &KeySpec<S>, label: &str, record: &S) -> Result<KeyVal> {
    match spec {
        KeySpec::Field(name) => {
            let mut fields = schema::to_fields(record)?;
            let value = fields
                .remove(name)
                .ok_or_else(|| BindingError::MissingKeyField(name.clone()))?;
            Ok(KeyVal {
                name: name.clone(),
                value,
            })
        }
        KeySpec::Derived(f) => {
            let (name, value) = f(label, "", record);
            Ok(KeyVal { name, value })
        }
    }
}

/// Derives the hash key.
pub fn derive_hash_key<S: Schema>(binding: &Binding<S>, record: &S) -> Result<KeyVal> {
    derive_key(binding.hash_key(), HASH_KEY_LABEL, record)
}

/// Derives the range key, or `None` for hash-only bindings.
pub fn derive_range_key<S: Schema>(binding: &Binding<S>, record: &S) -> Result<Option<KeyVal>> {
    binding
        .range_key()
        .map(|spec| derive_key(spec, RANGE_KEY_LABEL, record))
        .transpose()
}
