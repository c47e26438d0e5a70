//! Field export, plain and store-bound.

use std::collections::BTreeSet;

use super::schema::{self, Schema};
use super::{Binding, BindingError, Result};
use crate::store::Attributes;

/// Filters applied to a field export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Only export these fields.
    pub include: Option<BTreeSet<String>>,
    /// Never export these fields.
    pub exclude: BTreeSet<String>,
    /// Use aliases as keys.
    pub by_alias: bool,
    /// Skip fields that were never explicitly set.
    pub exclude_unset: bool,
    /// Skip fields equal to their declared default.
    pub exclude_defaults: bool,
    /// Skip null fields.
    pub exclude_none: bool,
}

impl ExportOptions {
    pub fn include<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn by_alias(mut self) -> Self {
        self.by_alias = true;
        self
    }

    pub fn exclude_unset(mut self) -> Self {
        self.exclude_unset = true;
        self
    }

    pub fn exclude_defaults(mut self) -> Self {
        self.exclude_defaults = true;
        self
    }

    pub fn exclude_none(mut self) -> Self {
        self.exclude_none = true;
        self
    }
}

/// Exports a record's fields, applying `options`.
///
/// `fields_set` names the fields that were explicitly given a value.
pub fn export<S: Schema>(
    record: &S,
    fields_set: &BTreeSet<String>,
    options: &ExportOptions,
) -> Result<Attributes> {
    let defaults = if options.exclude_defaults {
        S::field_defaults()
    } else {
        Attributes::new()
    };

    let fields = schema::to_fields(record)?
        .into_iter()
        .filter(|(name, _)| options.include.as_ref().is_none_or(|inc| inc.contains(name)))
        .filter(|(name, _)| !options.exclude.contains(name))
        .filter(|(name, _)| !options.exclude_unset || fields_set.contains(name))
        .filter(|(name, value)| !options.exclude_defaults || defaults.get(name) != Some(value))
        .filter(|(_, value)| !options.exclude_none || !value.is_null());

    if !options.by_alias {
        return Ok(fields.collect());
    }

    Ok(fields
        .map(|(name, value)| {
            let key = S::aliases()
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, alias)| (*alias).to_string())
                .unwrap_or(name);
            (key, value)
        })
        .collect())
}

/// Exports a record toward the store.
///
/// With `remap`, every configured rename/transform is applied (a transform's
/// returned name and value both take effect) and then every computed key is
/// added. Remaps read from the plain export, so chained renames do not feed
/// into each other. A remap target that is already taken by another field or
/// remap fails with `RemapCollision`. A computed key whose trigger is missing
/// from the plain export fails with `MissingTriggerField`.
pub fn to_store_dict<S: Schema>(
    binding: &Binding<S>,
    record: &S,
    fields_set: &BTreeSet<String>,
    options: &ExportOptions,
    remap: bool,
) -> Result<Attributes> {
    let plain = export(record, fields_set, options)?;
    if !remap {
        return Ok(plain);
    }

    let remapped = binding.key_remap();
    let mut mapped: Attributes = plain
        .iter()
        .filter(|(name, _)| !remapped.contains_key(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    for (field, remap) in remapped {
        if let Some(value) = plain.get(field) {
            let (name, value) = remap.apply(field, value, record);
            if mapped.contains_key(&name) {
                return Err(BindingError::RemapCollision {
                    field: field.clone(),
                    target: name,
                });
            }
            mapped.insert(name, value);
        }
    }

    for trigger in binding.computed_keys().keys() {
        let value = plain
            .get(trigger)
            .ok_or_else(|| BindingError::MissingTriggerField(trigger.clone()))?;
        if let Some((name, computed)) = binding.computed_field(trigger, value, record) {
            mapped.insert(name, computed);
        }
    }

    Ok(mapped)
}
