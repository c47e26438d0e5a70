use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::bound::BoundRecord;
use super::schema::{self, Schema};
use super::{Binding, Result};
use crate::store::{
    collect_items, count_items, Attributes, CountOptions, GetOptions, ItemKey, ItemStore,
    Pagination, QueryOptions, ScanOptions, StoreItem,
};

/// A store handle paired with the binding of one record type.
///
/// Carries the table-level operations; every item it returns is wrapped as a
/// [`BoundRecord`] that already owns its backing item.
pub struct Table<S: Schema> {
    store: Arc<dyn ItemStore>,
    binding: Arc<Binding<S>>,
}

impl<S: Schema> Clone for Table<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            binding: Arc::clone(&self.binding),
        }
    }
}

impl<S: Schema> Table<S> {
    pub fn new(store: Arc<dyn ItemStore>, binding: Binding<S>) -> Self {
        Self {
            store,
            binding: Arc::new(binding),
        }
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    pub fn binding(&self) -> &Arc<Binding<S>> {
        &self.binding
    }

    pub fn table_name(&self) -> &str {
        self.store.table_name()
    }

    /// Binds an already-built record. Every field counts as explicitly set.
    pub fn record(&self, fields: S) -> Result<BoundRecord<S>> {
        let fields_set = schema::to_fields(&fields)?.into_iter().map(|(k, _)| k).collect();
        Ok(BoundRecord::new(self.clone(), fields, fields_set, None))
    }

    /// Validates `fields` into a record. Only the given fields count as set.
    pub fn record_from_map(&self, fields: Attributes) -> Result<BoundRecord<S>> {
        let fields_set = fields.keys().cloned().collect();
        let record = schema::from_fields(fields)?;
        Ok(BoundRecord::new(self.clone(), record, fields_set, None))
    }

    /// Rebuilds a record from a store item and attaches the item as its
    /// backing item.
    pub fn from_store(&self, item: StoreItem) -> Result<BoundRecord<S>> {
        let (record, fields_set) = fields_from_attributes::<S>(item.attributes())?;
        Ok(BoundRecord::new(self.clone(), record, fields_set, Some(item)))
    }

    /// Fetches one item by key.
    pub async fn get(
        &self,
        hash_key: impl Into<Value>,
        range_key: Option<Value>,
        options: &GetOptions,
    ) -> Result<BoundRecord<S>> {
        let key = ItemKey {
            hash: hash_key.into(),
            range: range_key,
        };
        debug!(table = self.table_name(), key = %key, "Fetching item");
        let item = self.store.get_item(&key, options).await?;
        self.from_store(item)
    }

    /// Queries every item under `hash_key`, following pages.
    pub async fn query(
        &self,
        hash_key: impl Into<Value>,
        options: &QueryOptions,
    ) -> Result<Vec<BoundRecord<S>>> {
        let hash_key = hash_key.into();
        let pagination = Pagination {
            limit: options.limit,
            page_size: options.page_size,
            rate_limit: options.rate_limit,
            start_key: options.last_evaluated_key.clone(),
        };
        let store = &self.store;
        let items = collect_items(pagination, |request| {
            store.query_page(&hash_key, options, request)
        })
        .await?;
        debug!(table = self.table_name(), count = items.len(), "Query complete");
        items.into_iter().map(|item| self.from_store(item)).collect()
    }

    /// Scans the table, following pages.
    pub async fn scan(&self, options: &ScanOptions) -> Result<Vec<BoundRecord<S>>> {
        let pagination = Pagination {
            limit: options.limit,
            page_size: options.page_size,
            rate_limit: options.rate_limit,
            start_key: options.last_evaluated_key.clone(),
        };
        let store = &self.store;
        let items = collect_items(pagination, |request| store.scan_page(options, request)).await?;
        debug!(table = self.table_name(), count = items.len(), "Scan complete");
        items.into_iter().map(|item| self.from_store(item)).collect()
    }

    /// Counts matching items; queries when `hash_key` is given, scans otherwise.
    pub async fn count(&self, hash_key: Option<Value>, options: &CountOptions) -> Result<usize> {
        let pagination = Pagination {
            limit: options.limit,
            page_size: None,
            rate_limit: options.rate_limit,
            start_key: None,
        };
        let store = &self.store;
        let hash_key = hash_key.as_ref();
        let count = count_items(pagination, |request| {
            store.count_page(hash_key, options, request)
        })
        .await?;
        Ok(count)
    }

    /// Returns true if the table exists.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.store.exists().await?)
    }

    /// Enables TTL on the table.
    pub async fn update_ttl(&self, ignore_errors: bool) -> Result<()> {
        Ok(self.store.update_ttl(ignore_errors).await?)
    }
}

/// Builds a record from item attributes, along with the set of fields the
/// item actually carried (directly or through an alias).
pub(crate) fn fields_from_attributes<S: Schema>(
    attributes: &Attributes,
) -> Result<(S, BTreeSet<String>)> {
    let record: S = schema::from_object(attributes)?;
    let fields_set = schema::to_fields(&record)?
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| {
            attributes.contains_key(name)
                || S::aliases()
                    .iter()
                    .any(|(field, alias)| field == name && attributes.contains_key(*alias))
        })
        .collect();
    Ok((record, fields_set))
}
