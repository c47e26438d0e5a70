use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::export::{self, ExportOptions};
use super::keys::{self, KeyVal};
use super::schema::{self, Schema};
use super::table::{fields_from_attributes, Table};
use super::{BindingError, Result};
use crate::store::{display_value, Attributes, Condition, GetOptions, ItemKey, StoreItem, UpdateAction};

/// A record bound to a store item.
///
/// The backing item is materialized on first use: looked up by the record's
/// derived key, or created in memory from the record when the store has no
/// such item. Once materialized its key never changes.
pub struct BoundRecord<S: Schema> {
    fields: S,
    fields_set: BTreeSet<String>,
    table: Table<S>,
    auto_sync: bool,
    backing: Option<StoreItem>,
}

impl<S: Schema> BoundRecord<S> {
    pub(crate) fn new(
        table: Table<S>,
        fields: S,
        fields_set: BTreeSet<String>,
        backing: Option<StoreItem>,
    ) -> Self {
        let auto_sync = table.binding().auto_sync();
        Self {
            fields,
            fields_set,
            table,
            auto_sync,
            backing,
        }
    }

    pub fn fields(&self) -> &S {
        &self.fields
    }

    pub fn into_fields(self) -> S {
        self.fields
    }

    pub fn table(&self) -> &Table<S> {
        &self.table
    }

    /// Names of fields that were explicitly given a value.
    pub fn fields_set(&self) -> &BTreeSet<String> {
        &self.fields_set
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    /// Toggles auto-sync for this record only. Never touches the store.
    pub fn set_auto_sync(&mut self, auto_sync: bool) {
        self.auto_sync = auto_sync;
    }

    pub fn hash_key(&self) -> Result<KeyVal> {
        keys::derive_hash_key(self.table.binding(), &self.fields)
    }

    pub fn range_key(&self) -> Result<Option<KeyVal>> {
        keys::derive_range_key(self.table.binding(), &self.fields)
    }

    /// The store key this record derives from its current fields.
    pub fn item_key(&self) -> Result<ItemKey> {
        Ok(ItemKey {
            hash: self.hash_key()?.value,
            range: self.range_key()?.map(|key| key.value),
        })
    }

    /// Plain field export.
    pub fn export(&self, options: &ExportOptions) -> Result<Attributes> {
        export::export(&self.fields, &self.fields_set, options)
    }

    /// Field export, remapped toward the store when `remap` is set.
    pub fn to_store_dict(&self, options: &ExportOptions, remap: bool) -> Result<Attributes> {
        export::to_store_dict(
            self.table.binding(),
            &self.fields,
            &self.fields_set,
            options,
            remap,
        )
    }

    pub fn is_materialized(&self) -> bool {
        self.backing.is_some()
    }

    /// The backing item, if already materialized.
    pub fn cached_item(&self) -> Option<&StoreItem> {
        self.backing.as_ref()
    }

    /// The backing item, materializing it on first call.
    pub async fn backing_item(&mut self) -> Result<&StoreItem> {
        let item = self.materialize().await?;
        Ok(&*item)
    }

    async fn materialize(&mut self) -> Result<&mut StoreItem> {
        let item = match self.backing.take() {
            Some(item) => item,
            None => self.load_or_create().await?,
        };
        Ok(self.backing.insert(item))
    }

    async fn load_or_create(&self) -> Result<StoreItem> {
        let key = self.item_key()?;
        let store = self.table.store();

        match store.get_item(&key, &GetOptions::default()).await {
            Ok(item) => {
                debug!(table = store.table_name(), key = %key, "Loaded backing item");
                Ok(item)
            }
            Err(err) if err.is_not_found() => {
                let mut attributes = self.to_store_dict(&ExportOptions::default(), true)?;
                for (name, value) in store.key_schema().key_attributes(&key) {
                    attributes.entry(name).or_insert(value);
                }
                let item = StoreItem::new(key, attributes);
                debug!(
                    table = store.table_name(),
                    key = %item.key(),
                    auto_sync = self.auto_sync,
                    "Created backing item"
                );
                if self.auto_sync {
                    store.put_item(&item, None).await?;
                }
                Ok(item)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Validated assignment of one field, mirrored onto the backing item.
    ///
    /// The value is stored under its remapped name, the triggered computed
    /// key (if any) is refreshed, and with auto-sync the item is persisted.
    pub async fn set_field(&mut self, name: &str, value: impl Serialize) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|e| BindingError::Serialization(e.to_string()))?;
        let (fields, stored) = schema::assign(&self.fields, name, value)?;
        self.fields = fields;
        self.fields_set.insert(name.to_string());
        self.propagate(name, stored).await?;
        if self.auto_sync {
            self.persist(None).await?;
        }
        Ok(())
    }

    /// Edits the typed fields in place, then mirrors every changed field as
    /// [`set_field`](Self::set_field) would.
    pub async fn modify<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut S),
    {
        let before = schema::to_fields(&self.fields)?;
        let mut candidate = self.fields.clone();
        edit(&mut candidate);
        let after = schema::to_fields(&candidate)?;
        // Re-validate what the closure produced.
        self.fields = schema::from_fields(after.clone())?;

        // `None` marks a field that no longer serializes.
        let mut changed: Vec<(String, Option<Value>)> = after
            .iter()
            .filter(|(name, value)| before.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), Some(value.clone())))
            .collect();
        changed.extend(
            before
                .keys()
                .filter(|name| !after.contains_key(*name))
                .map(|name| (name.clone(), None)),
        );

        for (name, value) in changed {
            match value {
                Some(value) => {
                    self.fields_set.insert(name.clone());
                    self.propagate(&name, value).await?;
                }
                None => {
                    self.fields_set.remove(&name);
                    self.propagate_removal(&name).await?;
                }
            }
            if self.auto_sync {
                self.persist(None).await?;
            }
        }
        Ok(())
    }

    async fn propagate(&mut self, name: &str, value: Value) -> Result<()> {
        let binding = Arc::clone(self.table.binding());
        let (store_name, store_value) = binding.remap_field(name, &value, &self.fields);
        let computed = binding.computed_field(name, &value, &self.fields);

        let key_schema = self.table.store().key_schema().clone();
        let targets = std::iter::once(&store_name).chain(computed.as_ref().map(|(n, _)| n));
        for target in targets {
            if key_schema.is_key_attribute(target) {
                warn!(
                    field = name,
                    attribute = %target,
                    "Write to key attribute does not change the stored item's key"
                );
            }
        }

        let item = self.materialize().await?;
        debug!(field = name, attribute = %store_name, "Propagating field");
        item.set(store_name, store_value);
        if let Some((computed_name, computed_value)) = computed {
            item.set(computed_name, computed_value);
        }
        Ok(())
    }

    /// Drops the store attribute of a field that stopped serializing. Computed
    /// attributes derived from it are left as they are.
    async fn propagate_removal(&mut self, name: &str) -> Result<()> {
        let binding = Arc::clone(self.table.binding());
        let (store_name, _) = binding.remap_field(name, &Value::Null, &self.fields);
        let item = self.materialize().await?;
        debug!(field = name, attribute = %store_name, "Removing field");
        item.remove(&store_name);
        Ok(())
    }

    async fn persist(&mut self, condition: Option<&Condition>) -> Result<()> {
        let store = Arc::clone(self.table.store());
        let item = self.materialize().await?;
        store.put_item(item, condition).await?;
        Ok(())
    }

    /// Writes the backing item.
    pub async fn save(&mut self, condition: Option<&Condition>) -> Result<()> {
        self.persist(condition).await
    }

    /// Deletes the backing item from the store.
    pub async fn delete(&mut self, condition: Option<&Condition>) -> Result<()> {
        let store = Arc::clone(self.table.store());
        let item = self.materialize().await?;
        store.delete_item(item.key(), condition).await?;
        Ok(())
    }

    /// Applies update actions remotely and takes the returned attributes into
    /// the backing item.
    pub async fn update(
        &mut self,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
    ) -> Result<()> {
        let store = Arc::clone(self.table.store());
        let item = self.materialize().await?;
        let attributes = store.update_item(item.key(), actions, condition).await?;
        item.replace_attributes(attributes);
        Ok(())
    }

    /// Re-reads the backing item and replaces this record's fields with it.
    pub async fn refresh(&mut self, consistent_read: bool) -> Result<()> {
        let store = Arc::clone(self.table.store());
        let item = self.materialize().await?;
        let options = GetOptions {
            consistent_read,
            attributes_to_get: None,
        };
        let fresh = store.get_item(item.key(), &options).await?;
        item.replace_attributes(fresh.into_attributes());
        let attributes = item.attributes().clone();

        let (fields, fields_set) = fields_from_attributes::<S>(&attributes)?;
        self.fields = fields;
        self.fields_set = fields_set;
        Ok(())
    }
}

impl<S: Schema> fmt::Display for BoundRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = self
            .hash_key()
            .map(|key| display_value(&key.value))
            .unwrap_or_else(|_| "?".to_string());
        match self.range_key() {
            Ok(Some(range)) => write!(
                f,
                "{}<{}, {}>",
                self.table.table_name(),
                hash,
                display_value(&range.value)
            ),
            Ok(None) => write!(f, "{}<{}>", self.table.table_name(), hash),
            Err(_) => write!(f, "{}<{}, ?>", self.table.table_name(), hash),
        }
    }
}

impl<S: Schema + fmt::Debug> fmt::Debug for BoundRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundRecord")
            .field("table", &self.table.table_name())
            .field("fields", &self.fields)
            .field("auto_sync", &self.auto_sync)
            .field("backing", &self.backing)
            .finish()
    }
}
